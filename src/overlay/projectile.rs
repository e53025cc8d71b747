//! Projectile physics
//!
//! A projectile spawns above the top edge, follows a discrete ballistic plan
//! solved over `PLAN_TICKS` ticks and is destroyed once it climbs back past
//! `DESPAWN_Y`. Destruction is announced on an event channel so the owner can
//! remove it without the projectile knowing anything about its owner.

use crossbeam_channel::Sender;
use rand::Rng;
use tracing::debug;

use crate::overlay::constants::physics::*;
use crate::util::vec2::Vec2;

/// Entity identifier for projectiles and captions
pub type EntityId = u64;

/// Lifecycle events emitted by projectiles
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectileEvent {
    /// Projectile left the surface; `position` is where it was last seen
    Destroyed { id: EntityId, position: Vec2 },
}

/// Result of a single `step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Not moving, nothing happened
    Idle,
    /// Position and velocity advanced
    Moved,
    /// Crossed the despawn threshold on this step
    Destroyed,
}

/// Randomized travel distances for a new trajectory plan
///
/// `width` is uniform in `[0.3 * max_width, max_width)` and `height` in
/// `[0.5 * max_height, max_height)`.
pub fn random_travel<R: Rng + ?Sized>(max_width: f64, max_height: f64, rng: &mut R) -> (f64, f64) {
    let width = max_width * (MIN_WIDTH_FRACTION + (1.0 - MIN_WIDTH_FRACTION) * rng.gen::<f64>());
    let height = max_height * (MIN_HEIGHT_FRACTION + (1.0 - MIN_HEIGHT_FRACTION) * rng.gen::<f64>());
    (width, height)
}

/// Solve the discrete plan for the given travel distances
///
/// After `PLAN_TICKS` ticks of `y += vy; vy -= GRAVITY` the net vertical
/// travel approximates `height`. Horizontal speed covers half of `width`
/// over the same ticks and falls back to `FALLBACK_VX` when it comes out as
/// zero or NaN.
pub fn plan_velocity(width: f64, height: f64) -> Vec2 {
    let vy = height / PLAN_TICKS - (-GRAVITY * PLAN_TICKS / 2.0);

    let vx = width / PLAN_TICKS / 2.0;
    let vx = if vx == 0.0 || vx.is_nan() { FALLBACK_VX } else { vx };

    Vec2::new(vx, vy)
}

/// A bouncing sprite entity
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Bounding box the projectile was spawned against
    pub max_width: f64,
    pub max_height: f64,
    moving: bool,
    destroyed: bool,
    notifier: Option<Sender<ProjectileEvent>>,
}

impl Projectile {
    pub fn new(id: EntityId, max_width: f64, max_height: f64) -> Self {
        Self {
            id,
            position: Vec2::new(SPAWN_X, SPAWN_Y),
            velocity: Vec2::ZERO,
            max_width,
            max_height,
            moving: false,
            destroyed: false,
            notifier: None,
        }
    }

    /// Attach the channel that receives this projectile's destruction event
    pub fn with_notifier(mut self, notifier: Sender<ProjectileEvent>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Assign a randomized trajectory against the spawn bounds
    pub fn initialize_trajectory<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let (width, height) = random_travel(self.max_width, self.max_height, rng);
        self.velocity = plan_velocity(width, height);
    }

    /// Start motion. A destroyed projectile never moves again.
    pub fn start(&mut self) {
        if !self.destroyed {
            self.moving = true;
        }
    }

    /// Advance one tick
    pub fn step(&mut self) -> StepOutcome {
        if !self.moving {
            return StepOutcome::Idle;
        }

        if self.position.y <= DESPAWN_Y {
            self.destroy();
            return StepOutcome::Destroyed;
        }

        self.position += self.velocity;
        self.velocity.y -= GRAVITY;

        // Floor clamp only: vertical velocity is left alone
        if self.position.y > self.max_height {
            self.position.y = self.max_height;
        }

        if self.position.x > self.max_width {
            self.position.x = self.max_width;
            if self.velocity.x > 0.0 {
                self.velocity.x = -self.velocity.x;
            }
        }

        StepOutcome::Moved
    }

    /// Stop and announce destruction. Returns false if already destroyed.
    pub fn destroy(&mut self) -> bool {
        if self.destroyed {
            return false;
        }

        self.destroyed = true;
        self.moving = false;

        if let Some(notifier) = self.notifier.take() {
            let event = ProjectileEvent::Destroyed {
                id: self.id,
                position: self.position,
            };
            if notifier.send(event).is_err() {
                debug!("Projectile {} destroyed after its owner went away", self.id);
            }
        }

        true
    }
}
