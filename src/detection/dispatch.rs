//! Non-blocking wrappers around [`Detector::detect`]
//!
//! The pipeline itself stays synchronous. These helpers move it onto tokio's
//! blocking worker pool and hand the result back either as a future or through
//! a callback executed on an explicit [`CompletionContext`].

use super::orchestrator::Detector;
use super::types::{DetectionRequest, IpResult};
use std::sync::mpsc;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// A callback ready to run on the completion context
pub type CompletionJob = Box<dyn FnOnce() + Send + 'static>;

/// Where a detection callback runs
///
/// Models the caller's "completion thread": a UI loop, a runtime, or the
/// worker itself.
pub trait CompletionContext: Send + Sync + 'static {
    /// Run `job` on this context
    fn dispatch(&self, job: CompletionJob);
}

/// Runs the callback directly on the worker that finished detection
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl CompletionContext for Inline {
    fn dispatch(&self, job: CompletionJob) {
        job();
    }
}

/// Runs the callback as a task on a tokio runtime
impl CompletionContext for Handle {
    fn dispatch(&self, job: CompletionJob) {
        self.spawn(async move { job() });
    }
}

/// Queues the callback for a thread that drains the receiving end
///
/// ```no_run
/// use pubip::{CompletionJob, DetectionRequest, Detector, DetectorConfig};
/// use std::sync::{mpsc, Arc};
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// let detector = Arc::new(Detector::new(&DetectorConfig::default()));
/// let (tx, rx) = mpsc::channel::<CompletionJob>();
///
/// detector.detect_with_callback(runtime.handle(), DetectionRequest::default(), tx, |result| {
///     println!("{}", result.address());
/// });
///
/// // Main loop: run whatever completed
/// let job = rx.recv().unwrap();
/// job();
/// ```
impl CompletionContext for mpsc::Sender<CompletionJob> {
    fn dispatch(&self, job: CompletionJob) {
        if self.send(job).is_err() {
            error!("Completion queue closed; detection result dropped");
        }
    }
}

impl Detector {
    /// Run detection on the blocking worker pool and await the result
    ///
    /// Must be polled inside a tokio runtime.
    pub async fn detect_async(self: Arc<Self>, request: DetectionRequest) -> IpResult {
        match tokio::task::spawn_blocking(move || self.detect(request)).await {
            Ok(result) => result,
            Err(e) => {
                error!("Detection task failed: {}", e);
                IpResult::failed(format!("Detection task failed: {}", e))
            }
        }
    }

    /// Run detection in the background and deliver the result to
    /// `on_complete` on `context`
    ///
    /// `on_complete` is invoked exactly once, including when the worker task
    /// panics (it then receives a failed result).
    pub fn detect_with_callback<C, F>(
        self: Arc<Self>,
        runtime: &Handle,
        request: DetectionRequest,
        context: C,
        on_complete: F,
    ) -> JoinHandle<()>
    where
        C: CompletionContext,
        F: FnOnce(IpResult) + Send + 'static,
    {
        runtime.spawn(async move {
            let result = self.detect_async(request).await;
            debug!("Delivering detection result to completion context");
            context.dispatch(Box::new(move || on_complete(result)));
        })
    }
}
