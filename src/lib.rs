//! Saturn Overlay Engine Library
//!
//! A physics-animated stream overlay: projectiles arc across a render
//! surface under gravity, captions and sound effects trigger on spawns,
//! and two feeds (settings snapshots and chat/celebration commands) drive
//! population and behavior.
//!
//! # Layout
//!
//! - `overlay` - projectiles, captions, settings, sound arbitration and the engine
//! - `feed` - buffered settings/command delivery and the JSON line format
//! - `runtime` - headless tokio frame loop and stdin feed reader
//! - `metrics` - Prometheus/JSON metrics endpoint

pub mod config;
pub mod feed;
pub mod metrics;
pub mod overlay;
pub mod runtime;
pub mod util;
