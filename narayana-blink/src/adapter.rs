//! Async host loop around the blink tracker

use crate::config::BlinkConfig;
use crate::detector::{FaceDetector, Frame};
use crate::error::BlinkError;
use crate::events::BlinkEvent;
use crate::landmarks::FrameObservation;
use crate::tracker::{Admission, BlinkSnapshot, BlinkTracker, FrameOutcome};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Per-frame pipeline shared between the adapter and its processing task
#[derive(Clone)]
struct FramePipeline {
    detector: Arc<dyn FaceDetector>,
    tracker: Arc<Mutex<BlinkTracker>>,
    committed: Arc<RwLock<BlinkSnapshot>>,
    event_sender: Arc<RwLock<Option<broadcast::Sender<BlinkEvent>>>>,
}

impl FramePipeline {
    async fn run(&self, frame: &Frame) -> Result<Option<FrameOutcome>, BlinkError> {
        if !frame.timestamp.is_finite() {
            return Err(BlinkError::Adapter(format!(
                "Frame timestamp must be finite, got {}",
                frame.timestamp
            )));
        }

        // The tracker lock is never held across the detector call.
        let admission = {
            let mut tracker = self.tracker.lock();
            let admission = tracker.admit(frame.timestamp);
            if !admission.should_process() {
                *self.committed.write() = tracker.snapshot();
            }
            admission
        };

        if let Admission::Skip { .. } = admission {
            return Ok(None);
        }

        let observation = match self.detector.detect(frame).await {
            Ok(Some(landmarks)) => FrameObservation::detected(frame.timestamp, landmarks),
            Ok(None) => FrameObservation::not_detected(frame.timestamp),
            Err(e) if e.is_recoverable() => {
                warn!(
                    "Detector {} failed at {:.3}s: {}",
                    self.detector.name(),
                    frame.timestamp,
                    e
                );
                FrameObservation::not_detected(frame.timestamp)
            }
            Err(e) => return Err(e),
        };

        let outcome = {
            let mut tracker = self.tracker.lock();
            let outcome = tracker.process(&observation);
            *self.committed.write() = outcome.snapshot.clone();
            outcome
        };

        self.publish(&outcome);
        Ok(Some(outcome))
    }

    fn publish(&self, outcome: &FrameOutcome) {
        let sender_guard = self.event_sender.read();
        if let Some(ref sender) = *sender_guard {
            for event in BlinkEvent::from_outcome(outcome) {
                // No subscribers is not an error
                if sender.send(event).is_err() {
                    debug!("No event subscribers at {:.3}s", outcome.timestamp);
                    break;
                }
            }
        }
    }
}

/// Blink adapter: consumes frames, drives the tracker and publishes events
pub struct BlinkAdapter {
    config: Arc<BlinkConfig>,
    pipeline: FramePipeline,
    is_running: Arc<RwLock<bool>>,
    processing_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
    session_id: Uuid,
}

impl BlinkAdapter {
    /// Create a new blink adapter
    pub fn new(config: BlinkConfig, detector: Arc<dyn FaceDetector>) -> Result<Self, BlinkError> {
        let tracker = BlinkTracker::new(config.clone())?;
        let committed = tracker.snapshot();

        info!("Blink adapter created with detector {}", detector.name());

        Ok(Self {
            config: Arc::new(config),
            pipeline: FramePipeline {
                detector,
                tracker: Arc::new(Mutex::new(tracker)),
                committed: Arc::new(RwLock::new(committed)),
                event_sender: Arc::new(RwLock::new(None)),
            },
            is_running: Arc::new(RwLock::new(false)),
            processing_handle: Arc::new(RwLock::new(None)),
            session_id: Uuid::new_v4(),
        })
    }

    pub fn config(&self) -> &BlinkConfig {
        &self.config
    }

    /// Identifier attached to JSON event payloads
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn is_running(&self) -> bool {
        *self.is_running.read()
    }

    /// Start consuming frames from `frames`
    pub async fn start(&self, frames: mpsc::Receiver<Frame>) -> Result<(), BlinkError> {
        {
            let mut is_running = self.is_running.write();
            if *is_running {
                return Err(BlinkError::Adapter("Blink adapter already running".to_string()));
            }
            *is_running = true;
        }

        info!("Starting blink adapter (session {})", self.session_id);

        let (sender, _) = broadcast::channel(self.config.event_buffer_size);
        *self.pipeline.event_sender.write() = Some(sender);

        let pipeline = self.pipeline.clone();
        let is_running = self.is_running.clone();
        let mut rx = frames;

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {
                        if !*is_running.read() {
                            break;
                        }
                    }
                    frame_opt = rx.recv() => {
                        match frame_opt {
                            Some(frame) => {
                                if let Err(e) = pipeline.run(&frame).await {
                                    error!(
                                        "Failed to process frame at {:.3}s: {}",
                                        frame.timestamp, e
                                    );
                                }
                            }
                            None => {
                                info!("Frame channel closed");
                                break;
                            }
                        }
                    }
                }
            }
        });

        *self.processing_handle.write() = Some(handle);
        info!("Blink adapter started successfully");

        Ok(())
    }

    /// Stop the processing task. Safe to call when not running.
    pub async fn stop(&self) -> Result<(), BlinkError> {
        {
            let mut is_running = self.is_running.write();
            if !*is_running {
                return Ok(());
            }
            *is_running = false;
        }

        let handle_opt = {
            let mut guard = self.processing_handle.write();
            guard.take()
        };

        if let Some(handle) = handle_opt {
            handle.abort();
            let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
        }

        *self.pipeline.event_sender.write() = None;

        info!("Blink adapter stopped");
        Ok(())
    }

    /// Run one frame through the pipeline outside the processing task.
    ///
    /// Returns `None` when the idle gate skipped the frame.
    pub async fn process_frame(&self, frame: &Frame) -> Result<Option<FrameOutcome>, BlinkError> {
        self.pipeline.run(frame).await
    }

    /// Last committed snapshot
    pub fn snapshot(&self) -> BlinkSnapshot {
        self.pipeline.committed.read().clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BlinkEvent> {
        if let Some(ref sender) = *self.pipeline.event_sender.read() {
            sender.subscribe()
        } else {
            // Closed channel when not started
            let (_, receiver) = broadcast::channel(1);
            receiver
        }
    }

    /// Retune the closed-eye threshold on the live tracker
    pub fn set_ear_threshold(&self, threshold: f64) -> Result<(), BlinkError> {
        self.pipeline.tracker.lock().set_ear_threshold(threshold)
    }

    /// Discard all tracker state, including the blink counter
    pub fn reset(&self) {
        let mut tracker = self.pipeline.tracker.lock();
        tracker.reset();
        *self.pipeline.committed.write() = tracker.snapshot();
    }
}

impl Drop for BlinkAdapter {
    fn drop(&mut self) {
        *self.is_running.write() = false;
        if let Some(handle) = self.processing_handle.write().take() {
            handle.abort();
        }
    }
}
