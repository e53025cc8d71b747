use crate::overlay::constants::{physics, startup};
use crate::overlay::EngineConfig;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Viewport must be positive, got {width}x{height}")]
    InvalidViewport { width: f64, height: f64 },
    #[error("frame_ms must be at least 1")]
    ZeroFrameInterval,
    #[error("step_interval_ms must be at least 1")]
    ZeroStepInterval,
    #[error("feed_capacity must be at least 1")]
    ZeroFeedCapacity,
}

/// Overlay process configuration
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Headless viewport width in pixels
    pub viewport_width: f64,
    /// Headless viewport height in pixels
    pub viewport_height: f64,
    /// Wall-clock milliseconds per frame
    pub frame_ms: u64,
    /// Engine milliseconds per physics tick
    pub step_interval_ms: u64,
    /// Captioned projectiles spawned at startup
    pub initial_spawns: usize,
    /// Fixed RNG seed for reproducible runs
    pub rng_seed: Option<u64>,
    /// Dark styling flag passed through to frames
    pub dark: bool,
    /// Write every frame to stdout as a JSON line
    pub emit_frames: bool,
    /// Pending feed messages held between frames
    pub feed_capacity: usize,
    /// Milliseconds a caption stays up in headless runs
    pub caption_ms: u64,
    /// Port for the metrics endpoint; disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1920.0,
            viewport_height: 1080.0,
            frame_ms: 16,
            step_interval_ms: physics::STEP_INTERVAL_MS,
            initial_spawns: startup::INITIAL_SPAWNS,
            rng_seed: None,
            dark: false,
            emit_frames: false,
            feed_capacity: 1024,
            caption_ms: 2000,
            metrics_port: None,
        }
    }
}

/// Read a positive number from the environment, warning on bad values
fn positive_var<T>(name: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default + std::fmt::Display,
{
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(parsed) if parsed > T::default() => Some(parsed),
        Ok(_) => {
            tracing::warn!("{} must be > 0, using default", name);
            None
        }
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
            None
        }
    }
}

fn flag_var(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
            None
        }
    }
}

impl OverlayConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(width) = positive_var::<f64>("OVERLAY_VIEWPORT_WIDTH") {
            config.viewport_width = width;
        }

        if let Some(height) = positive_var::<f64>("OVERLAY_VIEWPORT_HEIGHT") {
            config.viewport_height = height;
        }

        if let Some(frame_ms) = positive_var::<u64>("OVERLAY_FRAME_MS") {
            config.frame_ms = frame_ms;
        }

        if let Some(step) = positive_var::<u64>("OVERLAY_STEP_INTERVAL_MS") {
            config.step_interval_ms = step;
        }

        if let Ok(spawns) = std::env::var("OVERLAY_INITIAL_SPAWNS") {
            if let Ok(parsed) = spawns.trim().parse::<usize>() {
                config.initial_spawns = parsed;
            } else {
                tracing::warn!("Invalid OVERLAY_INITIAL_SPAWNS '{}', using default", spawns);
            }
        }

        if let Ok(seed) = std::env::var("OVERLAY_RNG_SEED") {
            if let Ok(parsed) = seed.trim().parse::<u64>() {
                config.rng_seed = Some(parsed);
            } else {
                tracing::warn!("Invalid OVERLAY_RNG_SEED '{}', ignoring", seed);
            }
        }

        if let Some(dark) = flag_var("OVERLAY_DARK") {
            config.dark = dark;
        }

        if let Some(emit) = flag_var("OVERLAY_EMIT_FRAMES") {
            config.emit_frames = emit;
        }

        if let Some(capacity) = positive_var::<usize>("OVERLAY_FEED_CAPACITY") {
            config.feed_capacity = capacity;
        }

        if let Some(caption_ms) = positive_var::<u64>("OVERLAY_CAPTION_MS") {
            config.caption_ms = caption_ms;
        }

        if let Some(port) = positive_var::<u16>("METRICS_PORT") {
            config.metrics_port = Some(port);
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if !usable(self.viewport_width) || !usable(self.viewport_height) {
            return Err(ConfigError::InvalidViewport {
                width: self.viewport_width,
                height: self.viewport_height,
            });
        }
        if self.frame_ms == 0 {
            return Err(ConfigError::ZeroFrameInterval);
        }
        if self.step_interval_ms == 0 {
            return Err(ConfigError::ZeroStepInterval);
        }
        if self.feed_capacity == 0 {
            return Err(ConfigError::ZeroFeedCapacity);
        }
        Ok(())
    }

    /// Engine parameters derived from this config
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            step_interval_ms: self.step_interval_ms,
            initial_spawns: self.initial_spawns,
            rng_seed: self.rng_seed,
            dark: self.dark,
            caption_lifetime_ms: Some(self.caption_ms),
        }
    }
}
