//! polymix - demo driver for the mixing synchronizer
//!
//! Synthesizes a few independent sine-wave streams on producer threads,
//! feeds them through the synchronizer with the summing capability, and
//! reports what came out. Diagnostics from the event bus are logged as they
//! arrive.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use polymix_common::{timing, EventBus};
use polymix_engine::audio::{StreamFormat, TimedBuffer};
use polymix_engine::sync::{CollectingSink, SumMixer, Synchronizer};
use polymix_engine::MixerConfig;

/// Command-line arguments for the polymix demo
#[derive(Parser, Debug)]
#[command(name = "polymix")]
#[command(about = "Multi-stream audio mixing synchronizer demo")]
#[command(version)]
struct Args {
    /// Path to a TOML mixer configuration file
    #[arg(short, long, env = "POLYMIX_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Seconds of audio to synthesize per stream
    #[arg(short, long, default_value = "2")]
    seconds: u64,

    /// Number of concurrent producer streams
    #[arg(long, default_value = "3")]
    streams: usize,
}

/// Milliseconds of audio per produced buffer.
const CHUNK_MS: i64 = 20;

/// How far ahead of real time producers date their buffers. Keeps the
/// output clock in the future, the way a primed playback pipeline would.
const LEAD_US: i64 = 500_000;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polymix=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => MixerConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MixerConfig::default(),
    };
    info!(
        output_rate = config.output_rate,
        block_frames = config.block_frames,
        streams = args.streams,
        "starting polymix demo"
    );

    let events = Arc::new(EventBus::new(1024));
    let sink = Arc::new(CollectingSink::new());
    let synchronizer = Arc::new(
        Synchronizer::new(
            config.clone(),
            Box::new(SumMixer::new()),
            sink.clone(),
            events.clone(),
        )
        .context("creating synchronizer")?,
    );

    // Log every diagnostic the mixer emits.
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            debug!(event = event.event_type(), "mixer event");
        }
    });

    let origin_us = timing::monotonic_us() + LEAD_US;
    let rate = config.output_rate;
    let chunks = args.seconds as i64 * 1000 / CHUNK_MS;

    let mut producers = Vec::new();
    for stream_index in 0..args.streams {
        let stream_id = synchronizer.add_stream(StreamFormat::stereo_f32(rate));
        let synchronizer = synchronizer.clone();
        // Spread the streams across the spectrum
        let frequency = 220.0 * (stream_index + 1) as f32;
        producers.push(thread::spawn(move || {
            for chunk in 0..chunks {
                let start_us = origin_us + chunk * CHUNK_MS * 1000;
                let end_us = start_us + CHUNK_MS * 1000;
                let buffer = sine_chunk(frequency, rate, start_us - origin_us, end_us - origin_us);
                let timed = TimedBuffer::new(buffer, start_us, end_us)
                    .expect("chunk interval is never empty");
                if synchronizer.append(stream_id, timed).is_err() {
                    break;
                }
                // Rough real-time pacing
                thread::sleep(Duration::from_millis(CHUNK_MS as u64 / 2));
            }
        }));
    }

    // Drive the synchronizer while the producers run.
    let mut total_blocks = 0usize;
    while producers.iter().any(|p| !p.is_finished()) {
        total_blocks += synchronizer.run_until_idle();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    for producer in producers {
        let _ = producer.join();
    }
    total_blocks += synchronizer.run_until_idle();

    let blocks = sink.take_all();
    let covered_us: i64 = blocks.iter().map(|b| b.duration_us()).sum();
    info!(
        blocks = total_blocks,
        covered_ms = covered_us / 1000,
        "demo finished"
    );

    Ok(())
}

/// One stereo f32 sine chunk covering `[start_us, end_us)` of stream time.
fn sine_chunk(frequency: f32, rate: u32, start_us: i64, end_us: i64) -> Vec<u8> {
    let frames = ((end_us - start_us) * rate as i64 / 1_000_000) as usize;
    let first_frame = (start_us * rate as i64 / 1_000_000) as usize;
    let mut payload = Vec::with_capacity(frames * 8);
    for frame in 0..frames {
        let t = (first_frame + frame) as f32 / rate as f32;
        let sample = 0.2 * (2.0 * std::f32::consts::PI * frequency * t).sin();
        payload.extend_from_slice(&sample.to_ne_bytes());
        payload.extend_from_slice(&sample.to_ne_bytes());
    }
    payload
}
