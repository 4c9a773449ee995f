use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::detection::domain::cpu_usage::CpuUsage;
use crate::detection::domain::face_classifier::FaceClassifier;
use crate::detection::domain::face_region::{DetectionInfo, FaceRegion};
use crate::shared::constants::MIN_FACE_SIZE;
use crate::shared::frame::Frame;
use crate::shared::geometry::FrameSize;

const WORKER_THREAD_NAME: &str = "face-locator";

/// Result of a [`FaceLocator::submit_frame`] call. Only `Accepted` starts a
/// detection cycle; everything else means the frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    /// No classifier: the locator is permanently inert.
    Unavailable,
    /// Too soon after the previous accepted submission.
    Throttled,
    /// The previous result has not been retrieved yet.
    ResultPending,
    /// The worker is still scanning.
    Busy,
}

/// The classifier failed during a scan.
#[derive(Debug, thiserror::Error)]
#[error("face scan failed: {0}")]
pub struct ScanFailed(pub String);

struct ScanResult {
    outcome: Result<DetectionInfo, String>,
    /// The submitted buffer, handed back for reuse.
    frame: Frame,
}

struct SubmitState {
    cpu_usage: CpuUsage,
    last_submission: Option<Instant>,
    awaiting_retrieval: bool,
    spare: Option<Frame>,
}

struct Worker {
    frame_tx: Sender<Frame>,
    result_rx: Receiver<ScanResult>,
    processing: Arc<AtomicBool>,
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Disconnecting the shutdown channel wakes the worker if it waits.
        drop(self.shutdown_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Face locator worker panicked");
            }
        }
        log::info!("Face locator stopped");
    }
}

/// Asynchronous, rate-limited face search.
///
/// The frame thread hands frames over with [`submit_frame`] and picks
/// results up with [`retrieve_detection_info`]; neither call blocks. A
/// background worker scans at most one frame at a time. Frames offered
/// while a cycle is in flight, or sooner than the CPU-usage tier allows,
/// are dropped.
///
/// [`submit_frame`]: FaceLocator::submit_frame
/// [`retrieve_detection_info`]: FaceLocator::retrieve_detection_info
pub struct FaceLocator {
    state: Mutex<SubmitState>,
    worker: Option<Worker>,
}

impl FaceLocator {
    /// Starts a worker thread around `classifier`.
    ///
    /// If the thread cannot be spawned the locator is created inert.
    pub fn new(classifier: Box<dyn FaceClassifier>) -> Self {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Frame>(1);
        let (result_tx, result_rx) = crossbeam_channel::bounded::<ScanResult>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let processing = Arc::new(AtomicBool::new(false));

        let worker_processing = Arc::clone(&processing);
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || {
                run_worker(classifier, frame_rx, result_tx, shutdown_rx, worker_processing)
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("Face locator disabled, cannot spawn worker: {e}");
                return Self::unavailable();
            }
        };
        log::info!("Face locator started");

        Self {
            state: Mutex::new(SubmitState::new()),
            worker: Some(Worker {
                frame_tx,
                result_rx,
                processing,
                shutdown_tx: Some(shutdown_tx),
                handle: Some(handle),
            }),
        }
    }

    /// A locator without a model: submissions and retrievals are no-ops.
    pub fn unavailable() -> Self {
        Self {
            state: Mutex::new(SubmitState::new()),
            worker: None,
        }
    }

    /// Builds a locator from the outcome of a model load, degrading to
    /// [`FaceLocator::unavailable`] (logged once) on failure.
    pub fn from_model<C, E>(model: Result<C, E>) -> Self
    where
        C: FaceClassifier + 'static,
        E: Display,
    {
        match model {
            Ok(classifier) => Self::new(Box::new(classifier)),
            Err(e) => {
                log::warn!("Face detection unavailable: {e}");
                Self::unavailable()
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.worker.is_some()
    }

    pub fn cpu_usage(&self) -> CpuUsage {
        self.lock_state().cpu_usage
    }

    pub fn set_cpu_usage(&self, tier: CpuUsage) {
        self.lock_state().cpu_usage = tier;
    }

    /// Instant of the last accepted submission.
    pub fn last_submission(&self) -> Option<Instant> {
        self.lock_state().last_submission
    }

    /// Offers a frame for scanning. Never blocks.
    pub fn submit_frame(&self, frame: &Frame) -> SubmitOutcome {
        let Some(worker) = &self.worker else {
            return SubmitOutcome::Unavailable;
        };
        let mut state = self.lock_state();

        if let Some(last) = state.last_submission {
            if last.elapsed() < state.cpu_usage.throttle_period() {
                return SubmitOutcome::Throttled;
            }
        }
        if state.awaiting_retrieval {
            return SubmitOutcome::ResultPending;
        }
        if worker.processing.load(Ordering::Acquire) {
            return SubmitOutcome::Busy;
        }

        let mut slot = state.spare.take().unwrap_or_default();
        slot.copy_from(frame);

        worker.processing.store(true, Ordering::Release);
        match worker.frame_tx.try_send(slot) {
            Ok(()) => {
                state.last_submission = Some(Instant::now());
                state.awaiting_retrieval = true;
                SubmitOutcome::Accepted
            }
            Err(TrySendError::Full(slot)) => {
                worker.processing.store(false, Ordering::Release);
                state.spare = Some(slot);
                SubmitOutcome::Busy
            }
            Err(TrySendError::Disconnected(slot)) => {
                worker.processing.store(false, Ordering::Release);
                state.spare = Some(slot);
                SubmitOutcome::Unavailable
            }
        }
    }

    /// Takes the latest result, at most once per detection cycle. Never
    /// blocks; `Ok(None)` means nothing new.
    pub fn retrieve_detection_info(&self) -> Result<Option<DetectionInfo>, ScanFailed> {
        let Some(worker) = &self.worker else {
            return Ok(None);
        };
        if worker.processing.load(Ordering::Acquire) {
            return Ok(None);
        }

        let result = match worker.result_rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return Ok(None),
            Err(TryRecvError::Disconnected) => return Ok(None),
        };

        let mut state = self.lock_state();
        state.awaiting_retrieval = false;
        state.spare = Some(result.frame);
        result.outcome.map(Some).map_err(ScanFailed)
    }

    fn lock_state(&self) -> MutexGuard<'_, SubmitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SubmitState {
    fn new() -> Self {
        Self {
            cpu_usage: CpuUsage::default(),
            last_submission: None,
            awaiting_retrieval: false,
            spare: None,
        }
    }
}

fn shutdown_requested(shutdown_rx: &Receiver<()>) -> bool {
    !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty))
}

fn run_worker(
    mut classifier: Box<dyn FaceClassifier>,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<ScanResult>,
    shutdown_rx: Receiver<()>,
    processing: Arc<AtomicBool>,
) {
    lower_thread_priority();

    loop {
        if shutdown_requested(&shutdown_rx) {
            break;
        }

        let frame = crossbeam_channel::select! {
            recv(shutdown_rx) -> _ => break,
            recv(frame_rx) -> msg => match msg {
                Ok(frame) => frame,
                Err(_) => break,
            },
        };

        if shutdown_requested(&shutdown_rx) {
            break;
        }

        let frame_size = FrameSize::new(frame.width(), frame.height());
        let outcome = classifier
            .scan(&frame, MIN_FACE_SIZE)
            .map(|rects| DetectionInfo {
                face: rects.first().map(|&rect| FaceRegion { rect, frame_size }),
            })
            .map_err(|e| e.to_string());

        match &outcome {
            Ok(info) => log::debug!("Face scan done, found: {}", info.face_found()),
            Err(e) => log::debug!("Face scan failed: {e}"),
        }

        processing.store(false, Ordering::Release);
        if result_tx.send(ScanResult { outcome, frame }).is_err() {
            break;
        }
    }
}

#[cfg(target_os = "linux")]
fn lower_thread_priority() {
    // SAFETY: plain syscalls on the calling thread's own id.
    let rc = unsafe {
        let tid = libc::syscall(libc::SYS_gettid) as libc::id_t;
        libc::setpriority(libc::PRIO_PROCESS, tid, 1)
    };
    if rc != 0 {
        log::debug!("Could not lower face locator priority");
    }
}

#[cfg(not(target_os = "linux"))]
fn lower_thread_priority() {}
