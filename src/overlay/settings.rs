//! Overlay settings pushed by the configuration feed
//!
//! Snapshots arrive as loosely typed JSON. Every field is normalized on its
//! own: a missing or falsy value becomes `0`, `false` or `normal`, so a
//! partial snapshot is never rejected as a whole.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::overlay::constants::motivation;

/// Upper bound accepted for the population target
pub const MAX_LOOP_COUNT: usize = 1000;

/// Caption font selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Font {
    #[serde(rename = "random")]
    Random,
    #[default]
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "boing")]
    Boing,
    #[serde(rename = "lumine hall")]
    LumineHall,
}

impl Font {
    pub fn as_str(&self) -> &'static str {
        match self {
            Font::Random => "random",
            Font::Normal => "normal",
            Font::Boing => "boing",
            Font::LumineHall => "lumine hall",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "random" => Some(Font::Random),
            "normal" => Some(Font::Normal),
            "boing" => Some(Font::Boing),
            "lumine hall" => Some(Font::LumineHall),
            _ => None,
        }
    }
}

/// Settings snapshot consumed read-only by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub font: Font,
    /// Relay short chat messages as captions
    pub allow_msgs_from_chat: bool,
    /// Playback volume (0.0 - 1.0)
    pub volume: f32,
    pub play_sounds: bool,
    /// Rate-limit sound effects
    pub limit_sounds: bool,
    pub motivation_minutes: i64,
    /// Start of the motivation window (epoch ms)
    pub motivate_at: i64,
    pub motivate_finished_at: i64,
    /// Target population size
    pub loop_count: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font: Font::Normal,
            allow_msgs_from_chat: false,
            volume: 0.0,
            play_sounds: false,
            limit_sounds: true,
            motivation_minutes: 0,
            motivate_at: 0,
            motivate_finished_at: 0,
            loop_count: 0,
        }
    }
}

impl Settings {
    /// Normalize a raw snapshot. Returns `None` for an empty document
    /// (null or not an object), which leaves the held settings untouched.
    pub fn from_snapshot(doc: &Value) -> Option<Self> {
        let fields = doc.as_object()?;
        let field = |name: &str| fields.get(name).unwrap_or(&Value::Null);

        let font = match field("font").as_str() {
            Some(s) if !s.is_empty() => Font::parse(s).unwrap_or_else(|| {
                warn!("Unknown font '{}', using normal", s);
                Font::Normal
            }),
            _ => Font::Normal,
        };

        let loop_count = number(field("loopCount")).max(0.0).floor();
        let loop_count = if loop_count > MAX_LOOP_COUNT as f64 {
            warn!("loopCount {} exceeds {}, clamping", loop_count, MAX_LOOP_COUNT);
            MAX_LOOP_COUNT
        } else {
            loop_count as usize
        };

        Some(Self {
            font,
            allow_msgs_from_chat: truthy(field("allowMsgsFromChat")),
            volume: number(field("volume")).clamp(0.0, 1.0) as f32,
            play_sounds: truthy(field("playSounds")),
            limit_sounds: truthy(field("limitSounds")),
            motivation_minutes: number(field("motivationMinutes")).trunc() as i64,
            motivate_at: number(field("motivateAt")).trunc() as i64,
            motivate_finished_at: number(field("motivateFinishedAt")).trunc() as i64,
            loop_count,
        })
    }

    /// True while `now_ms` falls inside `[motivate_at, motivate_at + 20s]`
    /// and motivation is configured at all
    pub fn in_motivation_window(&self, now_ms: i64) -> bool {
        if self.motivation_minutes == 0 {
            return false;
        }
        now_ms >= self.motivate_at && now_ms <= self.motivate_at.saturating_add(motivation::WINDOW_MS)
    }
}

/// JS-style truthiness for loosely typed flags
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
        Value::Null => false,
    }
}

/// Finite number or 0
fn number(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite()).unwrap_or(0.0)
}
