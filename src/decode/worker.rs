//! Per-track decode worker.
//!
//! The worker owns the decoder. It submits chunks in decode order and forwards
//! every decoded frame through a bounded channel, so a full look-ahead buffer
//! suspends decoding until the scheduler consumes frames. Seek commands are
//! always served before more output is produced.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use clipforge_media::TrackIndex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use super::{Decoder, Frame};

/// Commands from the scheduler.
#[derive(Debug)]
pub(crate) enum WorkerCommand {
    /// Reset the decoder and resume submission at chunk `from`.
    Seek { from: usize, epoch: u64 },
}

/// Output of the worker, tagged with the seek epoch that produced it.
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Frame { epoch: u64, frame: Frame },
    Eos { epoch: u64 },
    Failed { epoch: u64, message: String },
}

pub(crate) struct Worker {
    pub(crate) commands: mpsc::UnboundedSender<WorkerCommand>,
    pub(crate) events: mpsc::Receiver<WorkerEvent>,
    pub(crate) task: JoinHandle<()>,
}

impl Worker {
    /// Spawn a worker decoding `index` from chunk 0 at epoch 0.
    pub(crate) fn spawn(
        decoder: Box<dyn Decoder>,
        index: Arc<TrackIndex>,
        source: Bytes,
        capacity: usize,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(capacity.max(1));

        let task = tokio::spawn(run(decoder, index, source, command_rx, event_tx));

        Self {
            commands: command_tx,
            events: event_rx,
            task,
        }
    }
}

async fn run(
    mut decoder: Box<dyn Decoder>,
    index: Arc<TrackIndex>,
    source: Bytes,
    mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
    events: mpsc::Sender<WorkerEvent>,
) {
    let track = index.kind();
    let mut epoch = 0u64;

    if let Err(e) = decoder.configure(index.config()).await {
        error!(%track, error = %e, "Decoder configuration failed");
        let _ = events
            .send(WorkerEvent::Failed {
                epoch,
                message: e.to_string(),
            })
            .await;
        return;
    }

    debug!(%track, codec = %index.config().codec, samples = index.len(), "Decode worker started");

    let mut next = 0usize;
    let mut pending: VecDeque<Frame> = VecDeque::new();
    let mut flushed = false;
    // Eos or Failed sent for the current epoch; idle until the next seek
    let mut finished = false;

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(WorkerCommand::Seek { from, epoch: new_epoch }) => {
                    debug!(%track, from, epoch = new_epoch, "Worker seek");
                    decoder.reset();
                    pending.clear();
                    next = from;
                    epoch = new_epoch;
                    flushed = false;
                    finished = false;
                }
                None => break,
            },

            permit = events.reserve(), if !finished => {
                let Ok(permit) = permit else { break };

                if let Some(frame) = pending.pop_front() {
                    trace!(%track, epoch, timestamp = frame.timestamp, "Frame ready");
                    permit.send(WorkerEvent::Frame { epoch, frame });
                    continue;
                }

                let output = if next < index.len() {
                    match index.chunk(next, &source) {
                        Ok(chunk) => {
                            trace!(
                                %track,
                                index = next,
                                timestamp = chunk.timestamp,
                                "Submitting chunk"
                            );
                            next += 1;
                            decoder.decode(chunk).await
                        }
                        Err(e) => Err(e.into()),
                    }
                } else if !flushed {
                    flushed = true;
                    decoder.flush().await
                } else {
                    debug!(%track, epoch, "End of stream");
                    permit.send(WorkerEvent::Eos { epoch });
                    finished = true;
                    continue;
                };

                match output {
                    Ok(frames) => pending.extend(frames),
                    Err(e) => {
                        error!(%track, epoch, error = %e, "Decode failed");
                        permit.send(WorkerEvent::Failed {
                            epoch,
                            message: e.to_string(),
                        });
                        finished = true;
                    }
                }
            }
        }
    }

    debug!(%track, "Decode worker stopped");
}
