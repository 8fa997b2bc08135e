//! MP4 sample table resolution.
//!
//! Sample tables describe how samples (encoded chunks) are laid out:
//! - stts: sample durations (decoding time)
//! - stss: sync sample table (keyframes)
//! - stsc: sample-to-chunk mapping
//! - stsz: sample sizes
//! - stco/co64: chunk offsets
//! - ctts: composition time offsets (for B-frames)

use std::collections::HashSet;

/// A resolved sample in decode order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleEntry {
    /// Sample index in decode order (0-based).
    pub index: u32,
    /// Byte offset where sample data starts.
    pub offset: u64,
    /// Sample size in bytes.
    pub size: u32,
    /// Decode timestamp in media timescale.
    pub dts: u64,
    /// Sample duration in media timescale.
    pub duration: u32,
    /// Composition time offset (for PTS calculation).
    pub cts_offset: i32,
    /// Whether this sample is a keyframe (sync sample).
    pub is_keyframe: bool,
}

impl SampleEntry {
    /// Get the presentation timestamp.
    pub fn pts(&self) -> u64 {
        (self.dts as i64 + self.cts_offset as i64).max(0) as u64
    }
}

/// Sample table containing resolved sample information.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    /// Sample count.
    pub sample_count: u32,
    /// All resolved samples in decode order.
    pub samples: Vec<SampleEntry>,
}

impl SampleTable {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate over all samples.
    pub fn iter(&self) -> impl Iterator<Item = &SampleEntry> {
        self.samples.iter()
    }
}

/// Builder for constructing a sample table from raw atom data.
#[derive(Debug, Default)]
pub struct SampleTableBuilder {
    // (count, delta)
    stts_entries: Vec<(u32, u32)>,
    // 1-based sync sample numbers
    sync_samples: Vec<u32>,
    // (first_chunk, samples_per_chunk, sample_description_index)
    stsc_entries: Vec<(u32, u32, u32)>,
    // if uniform_size > 0, every sample has that size
    uniform_size: u32,
    sample_sizes: Vec<u32>,
    chunk_offsets: Vec<u64>,
    // (count, offset)
    ctts_entries: Vec<(u32, i32)>,
    // sample count declared by stsz, authoritative when present
    declared_count: Option<u32>,
}

impl SampleTableBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set stts (decoding time to sample) entries.
    pub fn set_stts(&mut self, entries: Vec<(u32, u32)>) {
        self.stts_entries = entries;
    }

    /// Set stss (sync sample) entries.
    pub fn set_sync_samples(&mut self, samples: Vec<u32>) {
        self.sync_samples = samples;
    }

    /// Set stsc (sample to chunk) entries.
    pub fn set_stsc(&mut self, entries: Vec<(u32, u32, u32)>) {
        self.stsc_entries = entries;
    }

    /// Set stsz (sample size) data.
    pub fn set_stsz(&mut self, uniform_size: u32, declared_count: u32, sizes: Vec<u32>) {
        self.uniform_size = uniform_size;
        self.declared_count = Some(declared_count);
        self.sample_sizes = sizes;
    }

    /// Set chunk offsets (from stco or co64).
    pub fn set_chunk_offsets(&mut self, offsets: Vec<u64>) {
        self.chunk_offsets = offsets;
    }

    /// Set ctts (composition time to sample) entries.
    pub fn set_ctts(&mut self, entries: Vec<(u32, i32)>) {
        self.ctts_entries = entries;
    }

    /// Build the sample table by resolving all sample information.
    pub fn build(self) -> SampleTable {
        let sample_count = match self.declared_count {
            Some(count) if self.uniform_size > 0 => count,
            _ => self.sample_sizes.len() as u32,
        };

        if sample_count == 0 {
            return SampleTable::default();
        }

        let count = sample_count as usize;
        let sizes: Vec<u32> = (0..count).map(|i| self.size_of(i)).collect();
        let offsets = self.resolve_offsets(&sizes);
        let durations = expand_runs(&self.stts_entries, count);
        let cts_offsets = expand_runs(&self.ctts_entries, count);
        let sync_set: HashSet<u32> = self.sync_samples.iter().copied().collect();

        let mut samples = Vec::with_capacity(count);
        let mut dts = 0u64;
        let mut last_duration = 1u32;

        for i in 0..count {
            // stts shorter than the sample count repeats its last delta
            let duration = durations.get(i).copied().unwrap_or(last_duration);
            last_duration = duration;

            samples.push(SampleEntry {
                index: i as u32,
                offset: offsets[i],
                size: sizes[i],
                dts,
                duration,
                cts_offset: cts_offsets.get(i).copied().unwrap_or(0),
                // No stss means every sample is a sync sample; stss is 1-based
                is_keyframe: self.sync_samples.is_empty() || sync_set.contains(&(i as u32 + 1)),
            });

            dts += duration as u64;
        }

        SampleTable {
            sample_count,
            samples,
        }
    }

    fn size_of(&self, index: usize) -> u32 {
        if self.uniform_size > 0 {
            self.uniform_size
        } else {
            self.sample_sizes.get(index).copied().unwrap_or(0)
        }
    }

    /// Map every sample to its 0-based chunk.
    fn resolve_sample_chunks(&self, sample_count: usize) -> Vec<u32> {
        if self.stsc_entries.is_empty() {
            return vec![0; sample_count];
        }

        let mut result = Vec::with_capacity(sample_count);
        let num_chunks = self.chunk_offsets.len() as u32;

        'entries: for (i, &(first_chunk, samples_per_chunk, _)) in
            self.stsc_entries.iter().enumerate()
        {
            let next_first = self
                .stsc_entries
                .get(i + 1)
                .map(|e| e.0)
                .unwrap_or(num_chunks + 1);

            for chunk in first_chunk.max(1)..next_first.min(num_chunks + 1) {
                for _ in 0..samples_per_chunk {
                    if result.len() >= sample_count {
                        break 'entries;
                    }
                    result.push(chunk - 1);
                }
            }
        }

        let pad = result.last().copied().unwrap_or(0);
        result.resize(sample_count, pad);
        result
    }

    fn resolve_offsets(&self, sizes: &[u32]) -> Vec<u64> {
        let chunks = self.resolve_sample_chunks(sizes.len());
        let mut within_chunk = vec![0u64; self.chunk_offsets.len()];

        chunks
            .iter()
            .zip(sizes)
            .map(|(&chunk, &size)| {
                let chunk = chunk as usize;
                let base = self.chunk_offsets.get(chunk).copied().unwrap_or(0);
                match within_chunk.get_mut(chunk) {
                    Some(acc) => {
                        let offset = base + *acc;
                        *acc += size as u64;
                        offset
                    }
                    None => base,
                }
            })
            .collect()
    }
}

/// Expand `(count, value)` run-length entries into at most `limit` values.
fn expand_runs<T: Copy>(entries: &[(u32, T)], limit: usize) -> Vec<T> {
    entries
        .iter()
        .flat_map(|&(count, value)| std::iter::repeat(value).take(count as usize))
        .take(limit)
        .collect()
}
