pub mod capture;
pub mod channel;
pub mod frame_cell;
pub mod identity;
pub mod pacing;
pub mod parcel;
pub mod perception;

pub use capture::CaptureLoop;
pub use channel::LatestOnlyChannel;
pub use frame_cell::FrameCell;
pub use identity::{IdentityEngine, IdentityWorker};
pub use parcel::{DataParcel, PostureStatus, TrackState, TrackingCommand};
pub use perception::{HybridTracker, PerceptionHandle, PerceptionLoop};

use crate::camera::FrameSource;
use crate::common::{Config, PipelineError, Result};
use crate::core::{FaceAnalyzer, TrackerFactory};
use crate::storage::UserRepository;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// The replaceable pieces a pipeline is built from.
pub struct Collaborators {
    pub source: Box<dyn FrameSource>,
    pub analyzer: Box<dyn FaceAnalyzer>,
    pub tracker_factory: TrackerFactory,
    pub repository: Box<dyn UserRepository>,
}

/// Signals the owning [`LoopThread`] when the loop body returns or unwinds.
struct ExitSignal(crossbeam_channel::Sender<()>);

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}

struct LoopThread {
    name: &'static str,
    handle: JoinHandle<()>,
    exited: Receiver<()>,
}

fn spawn_loop<F>(name: &'static str, running: Arc<AtomicBool>, body: F) -> Result<LoopThread>
where
    F: FnOnce(&AtomicBool) + Send + 'static,
{
    let (tx, exited) = bounded(1);
    let handle = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let _signal = ExitSignal(tx);
            body(&running);
        })
        .map_err(|e| PipelineError::Other(anyhow::anyhow!("Failed to spawn {} thread: {}", name, e)))?;

    Ok(LoopThread { name, handle, exited })
}

/// Outcome of [`Pipeline::stop`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StopReport {
    pub joined: Vec<&'static str>,
    pub detached: Vec<&'static str>,
}

/// Capture, perception and identity loops on their own threads.
pub struct Pipeline {
    running: Arc<AtomicBool>,
    loops: Vec<LoopThread>,
    presentation: LatestOnlyChannel<DataParcel>,
    preview: Option<LatestOnlyChannel<Vec<u8>>>,
    perception: PerceptionHandle,
    stop_timeout: Duration,
}

impl Pipeline {
    pub fn start(config: &Config, collaborators: Collaborators) -> Result<Self> {
        let Collaborators { source, analyzer, tracker_factory, repository } = collaborators;

        let running = Arc::new(AtomicBool::new(true));
        let cell = FrameCell::new();
        let perception_out = LatestOnlyChannel::new();
        let presentation = LatestOnlyChannel::new();
        let preview = config.camera.preview_enabled.then(LatestOnlyChannel::new);

        let capture = CaptureLoop::new(source, cell.clone(), preview.clone(), config.camera.clone());
        let engine = HybridTracker::new(analyzer, tracker_factory, config.perception.clone());
        let (perception_loop, perception) = PerceptionLoop::new(
            engine,
            cell,
            perception_out.clone(),
            config.perception.processing_fps,
        );
        let identity = IdentityWorker::new(
            IdentityEngine::new(repository, config.identity.clone()),
            perception_out,
            presentation.clone(),
        );

        let mut pipeline = Self {
            running: running.clone(),
            loops: Vec::with_capacity(3),
            presentation,
            preview,
            perception,
            stop_timeout: Duration::from_millis(config.pipeline.stop_timeout_ms),
        };

        // Downstream first so nothing is produced without a consumer.
        pipeline.loops.push(spawn_loop("identity", running.clone(), move |r| identity.run(r))?);
        pipeline.loops.push(spawn_loop("perception", running.clone(), move |r| perception_loop.run(r))?);
        pipeline.loops.push(spawn_loop("capture", running, move |r| capture.run(r))?);

        tracing::info!("Pipeline started");
        Ok(pipeline)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared running flag, for wiring up signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Identity-enriched parcels, newest only.
    pub fn presentation(&self) -> LatestOnlyChannel<DataParcel> {
        self.presentation.clone()
    }

    /// JPEG preview frames, if enabled.
    pub fn preview(&self) -> Option<LatestOnlyChannel<Vec<u8>>> {
        self.preview.clone()
    }

    pub fn perception(&self) -> PerceptionHandle {
        self.perception.clone()
    }

    /// Clear the running flag and wait for each loop, up to the stop timeout
    /// per loop. Loops that do not exit in time are detached.
    pub fn stop(&mut self) -> StopReport {
        self.running.store(false, Ordering::SeqCst);
        let mut report = StopReport::default();

        for lp in self.loops.drain(..) {
            match lp.exited.recv_timeout(self.stop_timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if lp.handle.join().is_err() {
                        tracing::warn!("{} loop panicked", lp.name);
                    }
                    report.joined.push(lp.name);
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(
                        "{} loop did not stop within {:?}; detaching",
                        lp.name,
                        self.stop_timeout
                    );
                    report.detached.push(lp.name);
                }
            }
        }

        if !report.joined.is_empty() || !report.detached.is_empty() {
            tracing::info!("Pipeline stopped ({} joined, {} detached)", report.joined.len(), report.detached.len());
        }
        report
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if !self.loops.is_empty() {
            self.stop();
        }
    }
}
