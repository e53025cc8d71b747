//! Headless frame loop and feed readers
//!
//! Drives an `Engine` from a tokio interval: each frame drains the feed
//! buffer, advances the engine clock to wall time, records frame timing and
//! optionally writes the frame snapshot to stdout as one JSON line.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::OverlayConfig;
use crate::feed::{FeedBuffer, FeedError, FeedSender};
use crate::metrics::Metrics;
use crate::overlay::audio::{AudioChannel, AudioError};
use crate::overlay::constants::sound::CHANNEL_COUNT;
use crate::overlay::surface::FixedSurface;
use crate::overlay::Engine;

/// Seconds between stats log lines
const STATS_INTERVAL_SECS: u64 = 30;

/// Audio channel for headless runs: records the play in the log
#[derive(Debug, Clone)]
pub struct LoggingChannel {
    index: usize,
    volume: f32,
}

impl LoggingChannel {
    pub fn new(index: usize) -> Self {
        Self { index, volume: 1.0 }
    }
}

impl AudioChannel for LoggingChannel {
    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn play(&mut self) -> Result<(), AudioError> {
        debug!("Sound channel {} played at volume {:.2}", self.index, self.volume);
        Ok(())
    }
}

/// Wall-clock epoch milliseconds, the time base of `motivateAt`
pub fn epoch_ms() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as u64,
        Err(e) => {
            warn!("System clock is before the epoch: {}", e);
            0
        }
    }
}

/// Build the headless engine: fixed viewport, logging audio channels and
/// a clock starting at `start_ms`
pub fn build_engine(
    config: &OverlayConfig,
    metrics: Arc<Metrics>,
    start_ms: u64,
) -> Result<Engine, AudioError> {
    let surface = FixedSurface::new(config.viewport_width, config.viewport_height);
    let mut engine =
        Engine::new(config.engine_config(), Box::new(surface), start_ms).with_metrics(metrics);
    for index in 0..CHANNEL_COUNT {
        engine.bind_audio(index, Box::new(LoggingChannel::new(index)))?;
    }
    Ok(engine)
}

/// Run the frame loop until the task is dropped
pub async fn run_frame_loop(
    mut engine: Engine,
    feed: FeedBuffer,
    metrics: Arc<Metrics>,
    config: OverlayConfig,
) -> anyhow::Result<()> {
    let mut ticker = interval(Duration::from_millis(config.frame_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Frame loop started at {} ms per frame", config.frame_ms);
    let start = Instant::now();
    let base_ms = engine.now_ms();
    let frames_per_stats = (STATS_INTERVAL_SECS * 1000 / config.frame_ms.max(1)).max(1);
    let mut frame_count: u64 = 0;
    let mut stdout = tokio::io::stdout();

    loop {
        ticker.tick().await;
        frame_count += 1;
        let frame_start = std::time::Instant::now();

        for message in feed.drain() {
            message.apply(&mut engine);
        }

        engine.advance_to(base_ms + start.elapsed().as_millis() as u64);
        metrics.record_frame_time(frame_start.elapsed());

        if config.emit_frames {
            let mut line = engine.frame().to_json()?;
            line.push('\n');
            stdout.write_all(line.as_bytes()).await?;
        }

        if frame_count % frames_per_stats == 0 {
            info!(
                "Overlay: {}s, tick {}, {} projectiles (target {}), {} captions, celebrating={}",
                start.elapsed().as_secs(),
                engine.tick(),
                engine.population(),
                engine.settings().loop_count,
                engine.captions().len(),
                engine.is_celebrating()
            );
        }
    }
}

/// Read JSON feed lines from stdin until EOF
///
/// Malformed lines are logged and skipped. Returns when stdin closes or the
/// frame loop has gone away.
pub async fn read_stdin_feed(sender: FeedSender) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match sender.submit_line(&line) {
            Ok(()) => {}
            Err(FeedError::Malformed(reason)) => {
                warn!("Skipping feed line: {}", reason);
            }
            Err(FeedError::Full) => {
                warn!("Feed buffer full, dropping line");
            }
            Err(FeedError::Disconnected) => {
                debug!("Frame loop stopped, closing stdin feed");
                break;
            }
        }
    }

    info!("Stdin feed closed");
    Ok(())
}
