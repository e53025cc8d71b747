/// Trajectory constants - CRITICAL: the plan is solved in ticks, not seconds
pub mod physics {
    /// Vertical velocity decrement applied every tick
    pub const GRAVITY: f64 = 0.1;
    /// Number of ticks the trajectory plan is solved over
    pub const PLAN_TICKS: f64 = 120.0;
    /// Horizontal velocity substituted when the planned one is zero/NaN
    pub const FALLBACK_VX: f64 = 2.0;
    /// Spawn point (above the top edge)
    pub const SPAWN_X: f64 = 0.0;
    pub const SPAWN_Y: f64 = -20.0;
    /// Projectiles at or above this height are destroyed
    pub const DESPAWN_Y: f64 = -60.0;
    /// Fraction ranges for the randomized travel distances
    pub const MIN_WIDTH_FRACTION: f64 = 0.3;
    pub const MIN_HEIGHT_FRACTION: f64 = 0.5;
    /// Nominal spacing between ticks of one projectile
    pub const STEP_INTERVAL_MS: u64 = 1;
}

/// Render surface constants
pub mod surface {
    /// Fallback viewport size when the surface reports nothing
    pub const DEFAULT_WIDTH: f64 = 100.0;
    pub const DEFAULT_HEIGHT: f64 = 100.0;
    /// Sprite height subtracted from the floor
    pub const SPRITE_SIZE: f64 = 40.0;
}

/// Caption constants
pub mod caption {
    /// Caption attaches after `DELAY_MIN_MS + rand[0, DELAY_JITTER_MS)`
    pub const DELAY_MIN_MS: u64 = 500;
    pub const DELAY_JITTER_MS: u64 = 200;
    /// Caption used for startup spawns and the random roll
    pub const DEFAULT_TEXT: &str = "BOING!";
    /// 1-in-N chance that an uncaptioned spawn gets the default caption
    pub const DEFAULT_ODDS: u32 = 10;
}

/// Sound arbitration constants
pub mod sound {
    /// Number of interchangeable playback channels
    pub const CHANNEL_COUNT: usize = 3;
    /// Minimum gap between plays when limiting is on
    pub const BASE_COOLDOWN_MS: u64 = 1000;
    /// Extra gap per live caption
    pub const PER_CAPTION_COOLDOWN_MS: u64 = 100;
}

/// Celebration mode constants
pub mod celebration {
    /// Time the celebration flag stays set after the latest activation
    pub const WINDOW_MS: u64 = 2000;
}

/// Command feed constants
pub mod command {
    /// One extra blank spawn per this many characters of message text
    pub const CHARS_PER_EXTRA_SPAWN: usize = 20;
    /// Messages must be shorter than this to be relayed as a caption
    pub const MAX_RELAY_CHARS: usize = 40;
}

/// Motivation window constants
pub mod motivation {
    /// Window after `motivate_at` during which commands trigger motivation
    pub const WINDOW_MS: i64 = 20_000;
    /// Extra projectiles spawned per motivated command
    pub const EXTRA_SPAWNS: usize = 2;
    /// 1-in-N chance the chosen phrase is upper-cased
    pub const UPPERCASE_ODDS: u32 = 4;
    pub const PHRASES: [&str; 8] = [
        "Go Samtron5000",
        "Go Samtron",
        "You can do it",
        "Believe!",
        "We are... us",
        "Motivation!",
        "woo",
        "yay",
    ];
}

/// Engine startup constants
pub mod startup {
    /// Captioned projectiles spawned when the overlay starts
    pub const INITIAL_SPAWNS: usize = 3;
}
