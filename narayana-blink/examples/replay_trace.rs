//! Replay a recorded landmark trace through the blink adapter
//!
//! Usage: cargo run --example replay_trace [trace.jsonl]
//! Without an argument a synthetic 20 second session is used.

use async_trait::async_trait;
use narayana_blink::synthetic::SyntheticStream;
use narayana_blink::trace::read_trace_file;
use narayana_blink::{
    BlinkAdapter, BlinkConfig, BlinkError, BlinkEvent, FaceDetector, FaceLandmarks, Frame,
    FrameObservation,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Detector that answers from recorded observations keyed by frame timestamp
struct RecordedDetector {
    frames: HashMap<u64, Option<FaceLandmarks>>,
}

impl RecordedDetector {
    fn new(observations: &[FrameObservation]) -> Self {
        let frames = observations
            .iter()
            .map(|o| (o.timestamp().to_bits(), o.landmarks().cloned()))
            .collect();
        Self { frames }
    }
}

#[async_trait]
impl FaceDetector for RecordedDetector {
    fn name(&self) -> &'static str {
        "recorded"
    }

    async fn detect(&self, frame: &Frame) -> Result<Option<FaceLandmarks>, BlinkError> {
        Ok(self.frames.get(&frame.timestamp.to_bits()).cloned().flatten())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let observations = match std::env::args().nth(1) {
        Some(path) => read_trace_file(path)?,
        None => SyntheticStream::new(30.0, 20.0)
            .blink_every(2.7)
            .absent(9.0, 10.5)
            .observations(),
    };

    let detector = Arc::new(RecordedDetector::new(&observations));
    let adapter = BlinkAdapter::new(BlinkConfig::default(), detector)
        .map_err(|e| format!("Failed to create blink adapter: {}", e))?;

    let (tx, rx) = mpsc::channel(64);
    adapter.start(rx).await?;
    let mut events = adapter.subscribe_events();
    let session_id = adapter.session_id();

    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if !matches!(event, BlinkEvent::Snapshot(_)) {
                println!("{}", event.to_json(session_id));
            }
        }
    });

    for observation in &observations {
        tx.send(Frame::empty(observation.timestamp())).await?;
    }
    drop(tx);

    // Let the processing task drain the channel
    tokio::time::sleep(tokio::time::Duration::from_millis(300)).await;
    adapter.stop().await?;
    let _ = printer.await;

    let snapshot = adapter.snapshot();
    println!(
        "blinks: {}, peak detections/s: {}, frames processed: {}, skipped: {}",
        snapshot.blink_count,
        snapshot.max_detections_per_second,
        snapshot.frames_processed,
        snapshot.frames_skipped
    );

    Ok(())
}
