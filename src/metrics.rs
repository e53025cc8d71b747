//! Prometheus-compatible metrics endpoint
//!
//! Exposes overlay engine metrics in Prometheus format.
//! Endpoint: http://localhost:$METRICS_PORT/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Metrics registry for the overlay engine
#[derive(Debug)]
pub struct Metrics {
    // Population
    pub projectiles_spawned: AtomicU64,
    pub projectiles_destroyed: AtomicU64,
    pub live_projectiles: AtomicU64,
    pub target_population: AtomicU64,

    // Captions
    pub captions_attached: AtomicU64,
    pub live_captions: AtomicU64,

    // Sound
    pub sounds_played: AtomicU64,
    pub sounds_rate_limited: AtomicU64,
    pub sound_failures: AtomicU64,

    // Feeds
    pub settings_updates: AtomicU64,
    pub commands_handled: AtomicU64,
    pub commands_skipped: AtomicU64,
    pub celebrations: AtomicU64,
    pub celebration_active: AtomicU64, // 0 or 1

    // Physics ticks and frame timing (microseconds)
    pub tick_count: AtomicU64,
    pub frame_time_us: AtomicU64,
    pub frame_time_p95_us: AtomicU64,
    pub frame_time_p99_us: AtomicU64,
    pub frame_time_max_us: AtomicU64,

    start_time: Instant,

    // Rolling frame times for percentile calculation
    frame_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            projectiles_spawned: AtomicU64::new(0),
            projectiles_destroyed: AtomicU64::new(0),
            live_projectiles: AtomicU64::new(0),
            target_population: AtomicU64::new(0),
            captions_attached: AtomicU64::new(0),
            live_captions: AtomicU64::new(0),
            sounds_played: AtomicU64::new(0),
            sounds_rate_limited: AtomicU64::new(0),
            sound_failures: AtomicU64::new(0),
            settings_updates: AtomicU64::new(0),
            commands_handled: AtomicU64::new(0),
            commands_skipped: AtomicU64::new(0),
            celebrations: AtomicU64::new(0),
            celebration_active: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            frame_time_us: AtomicU64::new(0),
            frame_time_p95_us: AtomicU64::new(0),
            frame_time_p99_us: AtomicU64::new(0),
            frame_time_max_us: AtomicU64::new(0),
            start_time: Instant::now(),
            frame_history: RwLock::new(VecDeque::with_capacity(1000)),
        }
    }

    /// Record how long one driver frame took and update percentiles
    pub fn record_frame_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.frame_time_us.store(us, Ordering::Relaxed);

        let mut history = self.frame_history.write();
        history.push_back(us);

        while history.len() > 1000 {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.frame_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.frame_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.frame_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("saturn_overlay_projectiles_spawned_total", "Projectiles spawned", "counter",
            self.projectiles_spawned.load(Ordering::Relaxed));
        metric!("saturn_overlay_projectiles_destroyed_total", "Projectiles destroyed", "counter",
            self.projectiles_destroyed.load(Ordering::Relaxed));
        metric!("saturn_overlay_projectiles", "Live projectiles", "gauge",
            self.live_projectiles.load(Ordering::Relaxed));
        metric!("saturn_overlay_target_population", "Configured loop count", "gauge",
            self.target_population.load(Ordering::Relaxed));

        metric!("saturn_overlay_captions_attached_total", "Captions attached", "counter",
            self.captions_attached.load(Ordering::Relaxed));
        metric!("saturn_overlay_captions", "Live captions", "gauge",
            self.live_captions.load(Ordering::Relaxed));

        metric!("saturn_overlay_sounds_played_total", "Sound effects played", "counter",
            self.sounds_played.load(Ordering::Relaxed));
        metric!("saturn_overlay_sounds_rate_limited_total", "Sound effects skipped by the rate limit", "counter",
            self.sounds_rate_limited.load(Ordering::Relaxed));
        metric!("saturn_overlay_sound_failures_total", "Sound playback failures", "counter",
            self.sound_failures.load(Ordering::Relaxed));

        metric!("saturn_overlay_settings_updates_total", "Settings snapshots applied", "counter",
            self.settings_updates.load(Ordering::Relaxed));
        metric!("saturn_overlay_commands_total", "Command events handled", "counter",
            self.commands_handled.load(Ordering::Relaxed));
        metric!("saturn_overlay_commands_skipped_total", "Command pushes skipped as replay", "counter",
            self.commands_skipped.load(Ordering::Relaxed));
        metric!("saturn_overlay_celebrations_total", "Celebration activations", "counter",
            self.celebrations.load(Ordering::Relaxed));
        metric!("saturn_overlay_celebration_active", "Celebration mode active (0/1)", "gauge",
            self.celebration_active.load(Ordering::Relaxed));

        metric!("saturn_overlay_tick_count", "Physics ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));
        metric!("saturn_overlay_frame_time_microseconds", "Last frame time in microseconds", "gauge",
            self.frame_time_us.load(Ordering::Relaxed));
        metric!("saturn_overlay_frame_time_p95_microseconds", "95th percentile frame time", "gauge",
            self.frame_time_p95_us.load(Ordering::Relaxed));
        metric!("saturn_overlay_frame_time_p99_microseconds", "99th percentile frame time", "gauge",
            self.frame_time_p99_us.load(Ordering::Relaxed));
        metric!("saturn_overlay_frame_time_max_microseconds", "Maximum frame time", "gauge",
            self.frame_time_max_us.load(Ordering::Relaxed));
        metric!("saturn_overlay_uptime_seconds", "Uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON view of the same metrics
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "population": {
                "spawned": self.projectiles_spawned.load(Ordering::Relaxed),
                "destroyed": self.projectiles_destroyed.load(Ordering::Relaxed),
                "live": self.live_projectiles.load(Ordering::Relaxed),
                "target": self.target_population.load(Ordering::Relaxed),
            },
            "captions": {
                "attached": self.captions_attached.load(Ordering::Relaxed),
                "live": self.live_captions.load(Ordering::Relaxed),
            },
            "sound": {
                "played": self.sounds_played.load(Ordering::Relaxed),
                "rate_limited": self.sounds_rate_limited.load(Ordering::Relaxed),
                "failures": self.sound_failures.load(Ordering::Relaxed),
            },
            "feeds": {
                "settings_updates": self.settings_updates.load(Ordering::Relaxed),
                "commands": self.commands_handled.load(Ordering::Relaxed),
                "commands_skipped": self.commands_skipped.load(Ordering::Relaxed),
                "celebrations": self.celebrations.load(Ordering::Relaxed),
            },
            "performance": {
                "tick_count": self.tick_count.load(Ordering::Relaxed),
                "frame_time_us": self.frame_time_us.load(Ordering::Relaxed),
                "frame_time_p95_us": self.frame_time_p95_us.load(Ordering::Relaxed),
                "frame_time_p99_us": self.frame_time_p99_us.load(Ordering::Relaxed),
                "uptime_seconds": self.uptime_seconds(),
            }
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = http_response(&metrics, &request);

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

fn http_response(metrics: &Metrics, request: &str) -> String {
    let (content_type, body) = if request.starts_with("GET /metrics/json") {
        ("application/json", metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        ("text/plain; version=0.0.4", metrics.to_prometheus())
    } else if request.starts_with("GET /health") {
        ("text/plain", "OK".to_string())
    } else {
        return "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string();
    };

    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}
