// narayana-blink command line interface
// Replays landmark traces, generates synthetic sessions and prints configuration

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use narayana_blink::synthetic::SyntheticStream;
use narayana_blink::trace::{read_trace, read_trace_file, replay, write_trace, ReplaySummary};
use narayana_blink::{BlinkConfig, BlinkTracker};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Upper bound on generated frames, about 3.8 days at 30 fps
const MAX_SIMULATED_FRAMES: usize = 10_000_000;

#[derive(Parser)]
#[command(name = "narayana-blink")]
#[command(
    about = "Blink counting and adaptive idle gating over facial landmark streams",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace), overridden by RUST_LOG
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a JSON-lines landmark trace through the tracker
    Replay {
        /// Trace file, or "-" for stdin
        trace: PathBuf,

        /// Configuration file (.toml or .json)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Feed every frame, ignoring the idle gate
        #[arg(long)]
        no_gate: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Generate a synthetic session
    Simulate {
        /// Frames per second
        #[arg(long, default_value = "30")]
        fps: f64,

        /// Session length in seconds
        #[arg(long, default_value = "60")]
        duration: f64,

        /// Seconds between blinks
        #[arg(long, default_value = "3")]
        blink_every: f64,

        /// How long each blink keeps the eyes closed
        #[arg(long, default_value = "0.15")]
        closed_for: f64,

        /// Face absent span as START:END, may be repeated
        #[arg(long, value_parser = parse_span)]
        absent: Vec<(f64, f64)>,

        /// Write the trace here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Replay the session and print a summary instead of the trace
        #[arg(long)]
        run: bool,

        /// Output format for --run
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the default configuration as TOML
    Config {
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Validate an existing configuration file instead
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Replay { trace, config, no_gate, format } => {
            replay_trace(&trace, config.as_deref(), !no_gate, format)?;
        }
        Commands::Simulate {
            fps,
            duration,
            blink_every,
            closed_for,
            absent,
            output,
            run,
            format,
        } => {
            let stream = build_stream(fps, duration, blink_every, closed_for, &absent)?;
            simulate(&stream, output.as_deref(), run, format)?;
        }
        Commands::Config { output, check } => {
            handle_config_command(output.as_deref(), check.as_deref())?;
        }
    }

    Ok(())
}

fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level '{}'", level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn parse_span(s: &str) -> Result<(f64, f64), String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got '{}'", s))?;
    let start: f64 = start.trim().parse().map_err(|e| format!("bad start: {}", e))?;
    let end: f64 = end.trim().parse().map_err(|e| format!("bad end: {}", e))?;
    if !(end > start) {
        return Err(format!("span end must be after start, got {}", s));
    }
    Ok((start, end))
}

fn build_stream(
    fps: f64,
    duration: f64,
    blink_every: f64,
    closed_for: f64,
    absent: &[(f64, f64)],
) -> anyhow::Result<SyntheticStream> {
    if !(fps > 0.0) || !(duration > 0.0) {
        bail!("--fps and --duration must be positive");
    }
    let mut stream = SyntheticStream::new(fps, duration)
        .blink_every(blink_every)
        .closed_for(closed_for);
    for &(start, end) in absent {
        stream = stream.absent(start, end);
    }

    let frames = stream.frame_count();
    if frames > MAX_SIMULATED_FRAMES {
        bail!(
            "Session would generate {} frames, the limit is {}; lower --fps or --duration",
            frames,
            MAX_SIMULATED_FRAMES
        );
    }
    Ok(stream)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<BlinkConfig> {
    match path {
        Some(path) => BlinkConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(BlinkConfig::default()),
    }
}

fn replay_trace(
    trace: &Path,
    config: Option<&Path>,
    honor_gate: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let config = load_config(config)?;

    let observations = if trace == Path::new("-") {
        read_trace(io::stdin().lock()).context("Failed to read trace from stdin")?
    } else {
        read_trace_file(trace)
            .with_context(|| format!("Failed to read trace {}", trace.display()))?
    };

    let mut tracker = BlinkTracker::new(config).context("Invalid configuration")?;
    let summary = replay(&mut tracker, &observations, honor_gate);
    print_summary(&summary, format)
}

fn simulate(
    stream: &SyntheticStream,
    output: Option<&Path>,
    run: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let observations = stream.observations();
    info!(
        "Generated {} frames with {} blinks",
        observations.len(),
        stream.blink_times().len()
    );

    if run {
        let mut tracker =
            BlinkTracker::new(BlinkConfig::default()).context("Invalid configuration")?;
        let summary = replay(&mut tracker, &observations, true);
        return print_summary(&summary, format);
    }

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_trace(file, &observations).context("Failed to write trace")?;
            println!("✅ Wrote {} frames to {}", observations.len(), path.display());
        }
        None => write_trace(io::stdout().lock(), &observations).context("Failed to write trace")?,
    }
    Ok(())
}

fn print_summary(summary: &ReplaySummary, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Text => {
            let snapshot = &summary.snapshot;
            println!("Frames:             {}", summary.frames);
            println!("  processed:        {}", summary.processed);
            println!("  skipped (idle):   {}", summary.skipped);
            println!("Blinks:             {}", summary.blinks);
            println!("Peak detections/s:  {}", summary.max_detections_per_second);
            println!("Eyes closed:        {}", snapshot.is_eye_closed);
            println!("Idle duration:      {:.3}s", snapshot.idle_duration);
            println!("Blink interval:     {:.3}s", snapshot.estimated_interval);
            if summary.anomalies.total() > 0 {
                println!(
                    "Anomalies:          {} malformed, {} degenerate, {} out-of-order",
                    summary.anomalies.malformed_contours,
                    summary.anomalies.degenerate_contours,
                    summary.anomalies.non_monotonic_timestamps
                );
            }
        }
    }
    Ok(())
}

fn handle_config_command(output: Option<&Path>, check: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = check {
        BlinkConfig::from_file(path).with_context(|| format!("Invalid config {}", path.display()))?;
        println!("✅ {} is valid", path.display());
        return Ok(());
    }

    let contents = BlinkConfig::default().to_toml_string()?;
    match output {
        Some(path) => {
            std::fs::write(path, &contents)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✅ Wrote default configuration to {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(contents.as_bytes())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_span() {
        assert_eq!(parse_span("1.5:3").unwrap(), (1.5, 3.0));
        assert!(parse_span("3:1").is_err());
        assert!(parse_span("oops").is_err());
    }

    #[test]
    fn test_build_stream_limits_frames() {
        let stream = build_stream(30.0, 60.0, 3.0, 0.15, &[(10.0, 12.0)]).unwrap();
        assert_eq!(stream.frame_count(), 1800);

        let err = build_stream(1e9, 1e9, 3.0, 0.15, &[]).unwrap_err();
        assert!(err.to_string().contains("limit"));
        assert!(build_stream(0.0, 60.0, 3.0, 0.15, &[]).is_err());
        assert!(build_stream(30.0, f64::NAN, 3.0, 0.15, &[]).is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "narayana-blink",
            "--log-level",
            "debug",
            "simulate",
            "--fps",
            "60",
            "--absent",
            "2:3",
            "--run",
        ])
        .unwrap();
        match cli.command {
            Commands::Simulate { fps, absent, run, .. } => {
                assert_eq!(fps, 60.0);
                assert_eq!(absent, vec![(2.0, 3.0)]);
                assert!(run);
            }
            _ => panic!("Expected simulate"),
        }
        assert_eq!(cli.log_level, "debug");
    }
}
