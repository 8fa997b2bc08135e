//! Tick results and the tick interceptor hook.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::decode::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TickState {
    /// The timestamp lies on the timeline; frames may or may not be due.
    Success,
    /// The timeline is exhausted.
    Done,
}

/// What one tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickResult {
    pub state: TickState,
    /// Video frame due at the requested time, if one has not been delivered yet.
    pub video: Option<Frame>,
    /// Audio frames due since the previous tick, in order. A first tick, or
    /// one after a seek, starts at the frame playing at the requested time.
    pub audio: Vec<Frame>,
}

impl TickResult {
    pub fn done() -> Self {
        Self {
            state: TickState::Done,
            video: None,
            audio: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == TickState::Done
    }
}

/// Post-processes every tick result before it is returned to the caller.
///
/// Any `Fn(u64, TickResult) -> impl Future<Output = TickResult>` closure is an
/// interceptor:
///
/// ```
/// use std::sync::Arc;
/// use clipforge::{TickInterceptor, TickResult};
///
/// let drop_audio: Arc<dyn TickInterceptor> =
///     Arc::new(|_t: u64, mut result: TickResult| async move {
///         result.audio.clear();
///         result
///     });
/// ```
#[async_trait]
pub trait TickInterceptor: Send + Sync {
    async fn intercept(&self, timestamp: u64, result: TickResult) -> TickResult;
}

#[async_trait]
impl<F, Fut> TickInterceptor for F
where
    F: Fn(u64, TickResult) -> Fut + Send + Sync,
    Fut: Future<Output = TickResult> + Send + 'static,
{
    async fn intercept(&self, timestamp: u64, result: TickResult) -> TickResult {
        (self)(timestamp, result).await
    }
}

/// The default interceptor: returns results unchanged.
pub fn identity() -> Arc<dyn TickInterceptor> {
    Arc::new(|_timestamp: u64, result: TickResult| async move { result })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{AudioFrame, Frame};

    #[tokio::test]
    async fn test_identity_passes_through() {
        let frame = Frame::audio(0, 10, AudioFrame::new(48_000, 1, vec![0.0; 4]));
        let result = TickResult {
            state: TickState::Success,
            video: None,
            audio: vec![frame],
        };
        let out = identity().intercept(5, result.clone()).await;
        assert_eq!(out, result);
    }

    #[tokio::test]
    async fn test_closure_interceptor() {
        let interceptor: Arc<dyn TickInterceptor> =
            Arc::new(|t: u64, mut result: TickResult| async move {
                if t > 100 {
                    result.state = TickState::Done;
                }
                result
            });

        let result = TickResult {
            state: TickState::Success,
            video: None,
            audio: Vec::new(),
        };
        assert!(interceptor.intercept(101, result.clone()).await.is_done());
        assert!(!interceptor.intercept(99, result).await.is_done());
    }
}
