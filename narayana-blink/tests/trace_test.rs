//! Trace file and replay tests for narayana-blink

use narayana_blink::config::BlinkConfig;
use narayana_blink::landmarks::FrameObservation;
use narayana_blink::synthetic::SyntheticStream;
use narayana_blink::trace::{read_trace_file, replay, write_trace_file};
use narayana_blink::tracker::BlinkTracker;
use narayana_blink::BlinkError;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

#[test]
fn test_trace_file_roundtrip_and_replay() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.jsonl");

    let stream = SyntheticStream::new(30.0, 12.0)
        .blink_every(2.5)
        .absent(6.0, 7.0);
    write_trace_file(&path, &stream.observations()).unwrap();

    let observations = read_trace_file(&path).unwrap();
    assert_eq!(observations.len(), stream.frame_count());

    let mut tracker = BlinkTracker::new(BlinkConfig::default()).unwrap();
    let summary = replay(&mut tracker, &observations, false);
    assert_eq!(summary.frames, 360);
    assert_eq!(summary.blinks, stream.blink_times().len() as u64);
    assert!(summary.max_detections_per_second >= 30);
    assert!(!summary.snapshot.is_eye_closed);
    assert_eq!(summary.anomalies.total(), 0);
}

#[test]
fn test_hand_written_trace() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "# two frames, face lost then found").unwrap();
    writeln!(file, "{{\"kind\":\"not_detected\",\"timestamp\":0.0}}").unwrap();
    writeln!(
        file,
        "{{\"kind\":\"detected\",\"timestamp\":0.1,\"landmarks\":{{\"left_eye\":[{{\"x\":0.0,\"y\":0.5}},{{\"x\":0.1,\"y\":0.5}}],\"right_eye\":[]}}}}"
    )
    .unwrap();

    let observations = read_trace_file(file.path()).unwrap();
    assert_eq!(observations.len(), 2);
    assert_eq!(observations[0], FrameObservation::not_detected(0.0));

    let mut tracker = BlinkTracker::new(BlinkConfig::default()).unwrap();
    let summary = replay(&mut tracker, &observations, true);
    // Two-point contour is malformed and counted, not fatal
    assert_eq!(summary.anomalies.malformed_contours, 1);
    assert_eq!(summary.blinks, 0);
}

#[test]
fn test_bad_trace_line() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{{\"kind\":\"not_detected\",\"timestamp\":0.0}}").unwrap();
    writeln!(file, "not json").unwrap();

    match read_trace_file(file.path()) {
        Err(BlinkError::Trace { line, .. }) => assert_eq!(line, 2),
        other => panic!("Expected trace error, got {:?}", other),
    }
}

#[test]
fn test_missing_trace_file() {
    let dir = tempdir().unwrap();
    let result = read_trace_file(dir.path().join("missing.jsonl"));
    assert!(matches!(result, Err(BlinkError::Io(_))));
}
