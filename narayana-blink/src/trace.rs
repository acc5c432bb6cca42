//! JSON-lines traces of recorded observations and offline replay

use crate::error::BlinkError;
use crate::landmarks::FrameObservation;
use crate::tracker::{AnomalyCounters, BlinkSnapshot, BlinkTracker};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Parse a trace from any buffered reader.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn read_trace<R: BufRead>(reader: R) -> Result<Vec<FrameObservation>, BlinkError> {
    let mut observations = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let observation: FrameObservation = serde_json::from_str(trimmed).map_err(|e| {
            BlinkError::Trace { line: index + 1, message: e.to_string() }
        })?;
        observations.push(observation);
    }

    debug!("Read {} observations from trace", observations.len());
    Ok(observations)
}

pub fn read_trace_file(path: impl AsRef<Path>) -> Result<Vec<FrameObservation>, BlinkError> {
    let file = File::open(path.as_ref())?;
    read_trace(BufReader::new(file))
}

/// Write one observation per line
pub fn write_trace<W: Write>(
    writer: W,
    observations: &[FrameObservation],
) -> Result<(), BlinkError> {
    let mut writer = BufWriter::new(writer);
    for observation in observations {
        serde_json::to_writer(&mut writer, observation)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_trace_file(
    path: impl AsRef<Path>,
    observations: &[FrameObservation],
) -> Result<(), BlinkError> {
    let file = File::create(path.as_ref())?;
    write_trace(file, observations)
}

/// Result of replaying a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub frames: u64,
    pub processed: u64,
    pub skipped: u64,
    pub blinks: u64,
    pub max_detections_per_second: u32,
    pub anomalies: AnomalyCounters,
    pub snapshot: BlinkSnapshot,
}

/// Drive `tracker` through recorded observations.
///
/// With `honor_gate` set, observations inside the idle window are dropped
/// the way a live host would skip the detector call.
pub fn replay<'a, I>(tracker: &mut BlinkTracker, observations: I, honor_gate: bool) -> ReplaySummary
where
    I: IntoIterator<Item = &'a FrameObservation>,
{
    let mut frames = 0u64;
    let mut processed = 0u64;
    let mut skipped = 0u64;

    for observation in observations {
        frames += 1;
        if honor_gate && !tracker.admit(observation.timestamp()).should_process() {
            skipped += 1;
            continue;
        }
        tracker.process(observation);
        processed += 1;
    }

    let snapshot = tracker.snapshot();
    info!(
        "Replayed {} frames ({} processed, {} skipped): {} blinks",
        frames, processed, skipped, snapshot.blink_count
    );

    ReplaySummary {
        frames,
        processed,
        skipped,
        blinks: snapshot.blink_count,
        max_detections_per_second: snapshot.max_detections_per_second,
        anomalies: snapshot.anomalies,
        snapshot,
    }
}
