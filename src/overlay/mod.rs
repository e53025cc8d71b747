//! Overlay domain: projectiles, captions, settings, sound and the engine
//! that drives them on one timeline

pub mod audio;
pub mod caption;
pub mod celebration;
pub mod command;
pub mod constants;
pub mod engine;
pub mod projectile;
pub mod scheduler;
pub mod settings;
pub mod snapshot;
pub mod surface;

pub use engine::{Engine, EngineConfig};
