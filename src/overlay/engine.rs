//! Overlay engine: population manager and single-timeline driver
//!
//! Owns every live projectile and caption, the held settings, the sound
//! arbiter and the celebration flag. All mutation happens through `&mut
//! Engine`, so feed events, deferred tasks and physics ticks are serialized
//! on one timeline.
//!
//! Time only moves through `advance`/`advance_to`. Each elapsed millisecond
//! fires due deferred tasks, and every `step_interval_ms` one physics tick
//! (`advance_all(1)`) steps all live projectiles.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::metrics::Metrics;
use crate::overlay::audio::{AudioChannel, AudioError, SoundArbiter, SoundOutcome};
use crate::overlay::caption::Caption;
use crate::overlay::celebration::Celebration;
use crate::overlay::command::{plan_command, CommandEvent, CommandPlan, CommandSubscription};
use crate::overlay::constants::{caption, physics, startup};
use crate::overlay::projectile::{EntityId, Projectile, ProjectileEvent};
use crate::overlay::scheduler::Scheduler;
use crate::overlay::settings::Settings;
use crate::overlay::snapshot::{OverlayFrame, ProjectileView};
use crate::overlay::surface::{Bounds, RenderSurface};
use crate::util::vec2::Vec2;

/// Largest clock jump simulated in full; anything beyond is skipped
pub const MAX_CATCH_UP_MS: u64 = 1000;

/// Engine construction parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Milliseconds between physics ticks
    pub step_interval_ms: u64,
    /// Captioned projectiles spawned by `start`
    pub initial_spawns: usize,
    /// Seed for reproducible runs; entropy when `None`
    pub rng_seed: Option<u64>,
    /// Dark styling flag passed through to frames
    pub dark: bool,
    /// Remove captions after this long; `None` leaves removal to the
    /// render surface
    pub caption_lifetime_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_interval_ms: physics::STEP_INTERVAL_MS,
            initial_spawns: startup::INITIAL_SPAWNS,
            rng_seed: None,
            dark: false,
            caption_lifetime_ms: None,
        }
    }
}

/// Work deferred on the engine clock
#[derive(Debug, Clone)]
enum DeferredTask {
    /// Attach a caption to a projectile. `last_seen` is refreshed when the
    /// projectile leaves the live set before the caption fires.
    AttachCaption {
        projectile: EntityId,
        text: String,
        last_seen: Vec2,
    },
    ExpireCaption(EntityId),
    EndCelebration,
}

pub struct Engine {
    config: EngineConfig,
    now_ms: u64,
    last_step_ms: u64,
    tick: u64,
    settings: Settings,
    projectiles: Vec<Projectile>,
    captions: Vec<Caption>,
    next_entity_id: EntityId,
    sound: SoundArbiter,
    celebration: Celebration,
    scheduler: Scheduler<DeferredTask>,
    commands: CommandSubscription,
    surface: Box<dyn RenderSurface>,
    rng: StdRng,
    events_tx: Sender<ProjectileEvent>,
    events_rx: Receiver<ProjectileEvent>,
    metrics: Option<Arc<Metrics>>,
}

impl Engine {
    /// Create an engine whose clock starts at `start_ms`
    pub fn new(config: EngineConfig, surface: Box<dyn RenderSurface>, start_ms: u64) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (events_tx, events_rx) = unbounded();

        Self {
            config,
            now_ms: start_ms,
            last_step_ms: start_ms,
            tick: 0,
            settings: Settings::default(),
            projectiles: Vec::new(),
            captions: Vec::new(),
            next_entity_id: 0,
            sound: SoundArbiter::new(),
            celebration: Celebration::new(),
            scheduler: Scheduler::new(),
            commands: CommandSubscription::new(),
            surface,
            rng,
            events_tx,
            events_rx,
            metrics: None,
        }
    }

    /// Report counters into a shared metrics registry
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Bind a playback device to sound channel `index`
    pub fn bind_audio(&mut self, index: usize, channel: Box<dyn AudioChannel>) -> Result<(), AudioError> {
        self.sound.bind(index, channel)
    }

    /// Spawn the startup burst of captioned projectiles
    pub fn start(&mut self) {
        info!("Overlay engine starting with {} projectiles", self.config.initial_spawns);
        for _ in 0..self.config.initial_spawns {
            self.spawn(Some(caption::DEFAULT_TEXT));
        }
    }

    // === Accessors ===

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn captions(&self) -> &[Caption] {
        &self.captions
    }

    pub fn population(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_celebrating(&self) -> bool {
        self.celebration.is_active()
    }

    pub fn celebration(&self) -> &Celebration {
        &self.celebration
    }

    /// Deferred tasks (caption attachments, celebration expiry) still pending
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    /// Snapshot for the render surface
    pub fn frame(&self) -> OverlayFrame {
        OverlayFrame {
            time_ms: self.now_ms,
            tick: self.tick,
            celebrating: self.celebration.is_active(),
            dark: self.config.dark,
            projectiles: self.projectiles.iter().map(ProjectileView::from).collect(),
            captions: self.captions.clone(),
        }
    }

    // === Population ===

    /// Spawn one projectile against the current surface bounds
    ///
    /// Without caption text a 1-in-10 roll picks the default caption. Any
    /// caption attaches 500-700 ms later.
    pub fn spawn(&mut self, caption_text: Option<&str>) -> EntityId {
        let bounds = Bounds::from_viewport(self.surface.viewport());

        let id = self.next_entity_id();
        let mut projectile = Projectile::new(id, bounds.max_width, bounds.max_height)
            .with_notifier(self.events_tx.clone());
        projectile.initialize_trajectory(&mut self.rng);
        projectile.start();

        let spawn_position = projectile.position;
        self.projectiles.push(projectile);
        self.count(|m| &m.projectiles_spawned);

        let text = match caption_text.filter(|t| !t.is_empty()) {
            Some(text) => Some(text.to_string()),
            None if self.rng.gen_range(0..caption::DEFAULT_ODDS) == 0 => {
                Some(caption::DEFAULT_TEXT.to_string())
            }
            None => None,
        };

        if let Some(text) = text {
            let delay = caption::DELAY_MIN_MS + self.rng.gen_range(0..caption::DELAY_JITTER_MS);
            debug!("Projectile {} gets caption '{}' in {} ms", id, text, delay);
            self.scheduler.schedule_at(
                self.now_ms + delay,
                DeferredTask::AttachCaption {
                    projectile: id,
                    text,
                    last_seen: spawn_position,
                },
            );
        }

        debug!(
            "Spawned projectile {} in {}x{}",
            id, bounds.max_width, bounds.max_height
        );
        id
    }

    /// Spawn `count` uncaptioned projectiles
    pub fn spawn_many(&mut self, count: usize) {
        for _ in 0..count {
            self.spawn(None);
        }
    }

    /// Remove a projectile from the live set by identity
    pub fn remove(&mut self, id: EntityId) -> Option<Projectile> {
        let index = self.projectiles.iter().position(|p| p.id == id)?;
        let projectile = self.projectiles.remove(index);
        self.remember_last_position(id, projectile.position);
        Some(projectile)
    }

    /// Remove a caption the render surface is done with
    pub fn remove_caption(&mut self, id: EntityId) -> Option<Caption> {
        let index = self.captions.iter().position(|c| c.id == id)?;
        let mut caption = self.captions.remove(index);
        caption.destroyed = true;
        Some(caption)
    }

    /// Attach a caption at a live projectile's current position
    pub fn attach_caption(&mut self, projectile: EntityId, text: impl Into<String>) -> Option<EntityId> {
        let position = self.projectiles.iter().find(|p| p.id == projectile)?.position;
        Some(self.attach_caption_at(text.into(), position))
    }

    /// Spawn whatever the target population is missing
    fn top_up(&mut self) {
        let target = self.settings.loop_count;
        if self.projectiles.len() < target {
            let shortfall = target - self.projectiles.len();
            debug!("Population {} below target {}, spawning {}", self.projectiles.len(), target, shortfall);
            self.spawn_many(shortfall);
        }
    }

    fn attach_caption_at(&mut self, text: String, position: Vec2) -> EntityId {
        let outcome = self
            .sound
            .maybe_play(&self.settings, self.captions.len(), self.now_ms, &mut self.rng);
        match outcome {
            SoundOutcome::Played { .. } => self.count(|m| &m.sounds_played),
            SoundOutcome::RateLimited { .. } => self.count(|m| &m.sounds_rate_limited),
            SoundOutcome::Failed { .. } => self.count(|m| &m.sound_failures),
            SoundOutcome::Disabled | SoundOutcome::Unbound { .. } => {}
        }

        let id = self.next_entity_id();
        self.captions
            .push(Caption::new(id, text, position, self.settings.font));
        self.count(|m| &m.captions_attached);

        if let Some(lifetime) = self.config.caption_lifetime_ms {
            self.scheduler
                .schedule_at(self.now_ms + lifetime, DeferredTask::ExpireCaption(id));
        }
        id
    }

    fn remember_last_position(&mut self, id: EntityId, position: Vec2) {
        for task in self.scheduler.pending_mut() {
            if let DeferredTask::AttachCaption { projectile, last_seen, .. } = task {
                if *projectile == id {
                    *last_seen = position;
                }
            }
        }
    }

    // === Feeds ===

    /// Apply a settings snapshot from the configuration feed
    pub fn apply_settings(&mut self, doc: &Value) {
        let Some(settings) = Settings::from_snapshot(doc) else {
            debug!("Ignoring empty settings document");
            return;
        };

        info!(
            "Settings updated: loop_count={}, sounds={}, chat_relay={}, font={}",
            settings.loop_count,
            settings.play_sounds,
            settings.allow_msgs_from_chat,
            settings.font.as_str()
        );

        self.settings = settings;
        self.count(|m| &m.settings_updates);
        self.top_up();
        self.publish_gauges();
    }

    /// Handle one push from the command feed. The first push after
    /// subscribing is a replay and returns `None`.
    pub fn handle_command(&mut self, event: &CommandEvent) -> Option<CommandPlan> {
        if !self.commands.accept() {
            debug!("Skipping replayed command document");
            self.count(|m| &m.commands_skipped);
            return None;
        }

        let plan = plan_command(event, &self.settings, self.now_ms as i64, &mut self.rng);
        debug!("Command {:?} -> {:?}", event, plan);

        if plan.celebrate {
            self.activate_celebration();
        }

        self.spawn_many(plan.blank_spawns);
        self.spawn_many(plan.motivation_spawns);
        self.spawn(Some(&plan.caption));

        self.count(|m| &m.commands_handled);
        self.publish_gauges();
        Some(plan)
    }

    /// Treat the next command push as a replay again
    pub fn reset_command_subscription(&mut self) {
        self.commands.reset();
    }

    /// Turn on celebration mode, restarting its window
    pub fn activate_celebration(&mut self) {
        self.celebration
            .activate(self.now_ms, &mut self.scheduler, DeferredTask::EndCelebration);
        self.count(|m| &m.celebrations);
    }

    // === Time ===

    /// Step every live projectile `delta_ticks` times, removing destroyed
    /// ones and topping the population back up after each removal
    pub fn advance_all(&mut self, delta_ticks: u32) {
        for _ in 0..delta_ticks {
            for projectile in &mut self.projectiles {
                projectile.step();
            }
            self.tick += 1;
            self.count(|m| &m.tick_count);
            self.process_lifecycle_events();
        }
    }

    /// Move the clock forward `delta_ms`, one millisecond at a time
    pub fn advance(&mut self, delta_ms: u64) {
        let interval = self.config.step_interval_ms.max(1);

        for _ in 0..delta_ms {
            self.now_ms += 1;
            self.run_due_tasks();

            if self.now_ms - self.last_step_ms >= interval {
                self.last_step_ms = self.now_ms;
                self.advance_all(1);
            }
        }

        self.publish_gauges();
    }

    /// Move the clock to `now_ms`. Gaps longer than `MAX_CATCH_UP_MS` are
    /// skipped rather than replayed.
    pub fn advance_to(&mut self, now_ms: u64) {
        let delta = now_ms.saturating_sub(self.now_ms);
        if delta > MAX_CATCH_UP_MS {
            let skipped = delta - MAX_CATCH_UP_MS;
            warn!("Clock jumped {} ms, skipping {} ms", delta, skipped);
            self.now_ms += skipped;
            self.last_step_ms = self.now_ms;
        }
        self.advance(now_ms.saturating_sub(self.now_ms));
    }

    fn run_due_tasks(&mut self) {
        while let Some((timer, task)) = self.scheduler.pop_due(self.now_ms) {
            match task {
                DeferredTask::AttachCaption {
                    projectile,
                    text,
                    last_seen,
                } => {
                    // The projectile may already have left the live set
                    let position = self
                        .projectiles
                        .iter()
                        .find(|p| p.id == projectile)
                        .map(|p| p.position)
                        .unwrap_or(last_seen);
                    self.attach_caption_at(text, position);
                }
                DeferredTask::ExpireCaption(id) => {
                    self.remove_caption(id);
                }
                DeferredTask::EndCelebration => {
                    self.celebration.expire(timer);
                }
            }
        }
    }

    fn process_lifecycle_events(&mut self) {
        let events: SmallVec<[ProjectileEvent; 8]> = self.events_rx.try_iter().collect();

        for event in events {
            match event {
                ProjectileEvent::Destroyed { id, position } => {
                    if self.remove(id).is_none() {
                        self.remember_last_position(id, position);
                    }
                    self.count(|m| &m.projectiles_destroyed);
                    debug!("Projectile {} destroyed at ({:.1}, {:.1})", id, position.x, position.y);
                    self.top_up();
                }
            }
        }
    }

    fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    fn count(&self, counter: impl Fn(&Metrics) -> &std::sync::atomic::AtomicU64) {
        if let Some(metrics) = &self.metrics {
            Metrics::incr(counter(metrics));
        }
    }

    fn publish_gauges(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.live_projectiles.store(self.projectiles.len() as u64, Ordering::Relaxed);
            metrics.live_captions.store(self.captions.len() as u64, Ordering::Relaxed);
            metrics.target_population.store(self.settings.loop_count as u64, Ordering::Relaxed);
            metrics
                .celebration_active
                .store(self.celebration.is_active() as u64, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::audio::tests::RecordingChannel;
    use crate::overlay::constants::sound::CHANNEL_COUNT;
    use crate::overlay::surface::{DetachedSurface, FixedSurface};
    use serde_json::json;

    fn test_engine(seed: u64) -> Engine {
        let config = EngineConfig {
            rng_seed: Some(seed),
            ..EngineConfig::default()
        };
        Engine::new(config, Box::new(FixedSurface::new(800.0, 600.0)), 0)
    }

    fn primed_engine(seed: u64) -> Engine {
        let mut engine = test_engine(seed);
        assert!(engine.handle_command(&CommandEvent::default()).is_none());
        engine
    }

    fn bind_recorders(engine: &mut Engine) -> Arc<parking_lot::Mutex<Vec<(usize, f32)>>> {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for index in 0..CHANNEL_COUNT {
            let channel = RecordingChannel {
                index,
                log: log.clone(),
                volume: 0.0,
                fail: false,
            };
            engine.bind_audio(index, Box::new(channel)).unwrap();
        }
        log
    }

    fn chat_settings(loop_count: usize) -> Value {
        json!({ "allowMsgsFromChat": true, "loopCount": loop_count })
    }

    #[test]
    fn test_spawn_uses_surface_bounds() {
        let mut engine = test_engine(1);
        let id = engine.spawn(None);

        let projectile = &engine.projectiles()[0];
        assert_eq!(projectile.id, id);
        assert_eq!(projectile.max_width, 800.0);
        assert_eq!(projectile.max_height, 560.0);
        assert!(projectile.is_moving());
        assert!(projectile.velocity.x > 0.0);
    }

    #[test]
    fn test_spawn_without_surface_uses_fallback_box() {
        let config = EngineConfig {
            rng_seed: Some(1),
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config, Box::new(DetachedSurface), 0);
        engine.spawn(None);

        assert_eq!(engine.projectiles()[0].max_width, 100.0);
        assert_eq!(engine.projectiles()[0].max_height, 60.0);
    }

    #[test]
    fn test_spawn_many() {
        let mut engine = test_engine(2);
        engine.spawn_many(5);
        assert_eq!(engine.population(), 5);

        let ids: std::collections::HashSet<_> = engine.projectiles().iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_default_caption_roll_rate() {
        let mut engine = test_engine(3);
        engine.spawn_many(2000);
        let pending = engine.pending_tasks();
        assert!((120..300).contains(&pending), "{} default captions out of 2000", pending);
    }

    #[test]
    fn test_caption_attaches_after_jittered_delay() {
        let mut engine = test_engine(4);
        engine.spawn(Some("hello"));

        engine.advance(499);
        assert!(engine.captions().is_empty());

        engine.advance(201);
        assert_eq!(engine.captions().len(), 1);
        assert_eq!(engine.captions()[0].text, "hello");
    }

    #[test]
    fn test_caption_snapshots_current_position_and_font() {
        let config = EngineConfig {
            rng_seed: Some(5),
            step_interval_ms: 10,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config, Box::new(FixedSurface::new(800.0, 600.0)), 0);
        engine.apply_settings(&json!({ "font": "boing" }));
        let id = engine.spawn(Some("hi"));

        // Tasks fire before the tick in the same millisecond
        let mut position_before = engine.projectiles()[0].position;
        while engine.captions().is_empty() {
            position_before = engine.projectiles()[0].position;
            engine.advance(1);
        }

        assert!(engine.projectiles().iter().any(|p| p.id == id));
        let caption = &engine.captions()[0];
        assert_eq!(caption.position, position_before);
        assert_ne!(caption.position, Vec2::new(physics::SPAWN_X, physics::SPAWN_Y));
        assert_eq!(caption.font, crate::overlay::settings::Font::Boing);
    }

    #[test]
    fn test_caption_for_destroyed_projectile_uses_final_position() {
        let mut engine = test_engine(6);
        let id = engine.spawn(Some("bye"));

        // Push it past the despawn line so the next tick destroys it
        let final_position = Vec2::new(42.0, -75.0);
        let projectile = engine.projectiles.iter_mut().find(|p| p.id == id).unwrap();
        projectile.position = final_position;

        engine.advance(1);
        assert!(engine.projectiles().iter().all(|p| p.id != id));

        engine.advance(700);
        assert_eq!(engine.captions().len(), 1);
        assert_eq!(engine.captions()[0].position, final_position);
    }

    #[test]
    fn test_caption_lifetime() {
        let config = EngineConfig {
            rng_seed: Some(26),
            caption_lifetime_ms: Some(1_000),
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config, Box::new(FixedSurface::new(800.0, 600.0)), 0);
        let projectile = engine.spawn(None);
        engine.attach_caption(projectile, "brief");

        engine.advance(999);
        assert!(engine.captions().iter().any(|c| c.text == "brief"));
        engine.advance(1);
        assert!(engine.captions().iter().all(|c| c.text != "brief"));
    }

    #[test]
    fn test_attach_caption_requires_live_projectile() {
        let mut engine = test_engine(7);
        let id = engine.spawn(None);
        assert!(engine.attach_caption(id, "now").is_some());
        assert!(engine.attach_caption(999, "ghost").is_none());
        assert_eq!(engine.captions().len(), 1);
    }

    #[test]
    fn test_remove_by_identity() {
        let mut engine = test_engine(8);
        engine.spawn_many(3);
        let middle = engine.projectiles()[1].id;

        assert_eq!(engine.remove(middle).map(|p| p.id), Some(middle));
        assert!(engine.remove(middle).is_none());
        assert_eq!(engine.population(), 2);
    }

    #[test]
    fn test_remove_caption() {
        let mut engine = test_engine(9);
        let projectile = engine.spawn(None);
        let caption = engine.attach_caption(projectile, "x").unwrap();

        let removed = engine.remove_caption(caption).unwrap();
        assert!(removed.destroyed);
        assert!(engine.captions().is_empty());
        assert!(engine.remove_caption(caption).is_none());
    }

    #[test]
    fn test_settings_update_tops_up() {
        let mut engine = test_engine(10);
        engine.spawn(None);

        engine.apply_settings(&json!({ "loopCount": 4 }));
        assert_eq!(engine.population(), 4);

        // Lowering the target never removes anything
        engine.apply_settings(&json!({ "loopCount": 1 }));
        assert_eq!(engine.population(), 4);
    }

    #[test]
    fn test_empty_settings_document_keeps_current() {
        let mut engine = test_engine(11);
        engine.apply_settings(&json!({ "loopCount": 2 }));
        engine.apply_settings(&Value::Null);
        assert_eq!(engine.settings().loop_count, 2);
    }

    #[test]
    fn test_population_floor_holds_across_removals() {
        let mut engine = test_engine(12);
        engine.apply_settings(&json!({ "loopCount": 6 }));

        let mut destroyed_seen = 0;
        for _ in 0..5_000 {
            let before: Vec<_> = engine.projectiles().iter().map(|p| p.id).collect();
            engine.advance_all(1);
            destroyed_seen += before
                .iter()
                .filter(|id| engine.projectiles().iter().all(|p| p.id != **id))
                .count();
            assert!(engine.population() >= 6);
        }

        assert!(destroyed_seen > 0, "no projectile ever left the surface");
        assert!(engine.projectiles().iter().all(|p| !p.is_destroyed()));
    }

    #[test]
    fn test_destroyed_projectiles_never_return() {
        let mut engine = test_engine(13);
        engine.spawn(None);
        let first = engine.projectiles()[0].id;

        engine.advance_all(5_000);
        assert!(engine.projectiles().iter().all(|p| p.id != first));
        assert_eq!(engine.population(), 0);
    }

    #[test]
    fn test_priming_skip() {
        let mut engine = test_engine(14);

        assert!(engine.handle_command(&CommandEvent::chat("snapshot A")).is_none());
        assert_eq!(engine.population(), 0);
        assert_eq!(engine.pending_tasks(), 0);

        assert!(engine.handle_command(&CommandEvent::chat("B")).is_some());
        let after_b = engine.population();
        assert!(after_b >= 1);

        assert!(engine.handle_command(&CommandEvent::chat("C")).is_some());
        assert!(engine.population() > after_b);
    }

    #[test]
    fn test_resubscribe_primes_again() {
        let mut engine = primed_engine(15);
        engine.reset_command_subscription();
        assert!(engine.handle_command(&CommandEvent::chat("replay")).is_none());
        assert_eq!(engine.population(), 0);
    }

    #[test]
    fn test_short_chat_message_scenario() {
        let mut engine = primed_engine(16);
        engine.apply_settings(&chat_settings(3));
        assert_eq!(engine.population(), 3);

        let plan = engine.handle_command(&CommandEvent::chat("short")).unwrap();
        assert_eq!(plan.blank_spawns, 0);
        assert_eq!(plan.caption, "short");
        assert_eq!(engine.population(), 4);

        engine.advance(700);
        assert!(engine.captions().iter().any(|c| c.text == "short"));
    }

    #[test]
    fn test_long_chat_message_scenario() {
        let mut engine = primed_engine(17);
        engine.apply_settings(&chat_settings(0));

        let plan = engine.handle_command(&CommandEvent::chat("x".repeat(45))).unwrap();
        assert_eq!(plan.blank_spawns, 2);
        assert!(plan.caption.is_empty());
        assert_eq!(engine.population(), 3);

        engine.advance(700);
        assert!(engine.captions().iter().all(|c| c.text == caption::DEFAULT_TEXT));
    }

    #[test]
    fn test_celebration_window_restarts() {
        let mut engine = primed_engine(18);

        engine.handle_command(&CommandEvent::celebration());
        assert!(engine.is_celebrating());

        engine.advance(1000);
        engine.handle_command(&CommandEvent::celebration());

        engine.advance(1999);
        assert_eq!(engine.now_ms(), 2999);
        assert!(engine.is_celebrating());

        engine.advance(1);
        assert!(!engine.is_celebrating());
        assert!(!engine.frame().celebrating);
    }

    #[test]
    fn test_motivation_window_spawns() {
        let mut engine = primed_engine(19);
        engine.apply_settings(&json!({ "motivationMinutes": 5, "motivateAt": 0 }));

        engine.advance(5_000);
        let plan = engine.handle_command(&CommandEvent::default()).unwrap();
        assert_eq!(plan.motivation_spawns, 2);
        assert!(!plan.caption.is_empty());
        assert_eq!(engine.population(), 3);
    }

    #[test]
    fn test_caption_triggers_sound() {
        let mut engine = test_engine(20);
        let log = bind_recorders(&mut engine);
        engine.apply_settings(&json!({ "playSounds": true, "volume": 0.25 }));

        engine.spawn(Some("ding"));
        engine.advance(700);

        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].1, 0.25);
    }

    #[test]
    fn test_start_spawns_captioned_burst() {
        let mut engine = test_engine(21);
        engine.start();
        assert_eq!(engine.population(), startup::INITIAL_SPAWNS);

        engine.advance(700);
        let boings = engine
            .captions()
            .iter()
            .filter(|c| c.text == caption::DEFAULT_TEXT)
            .count();
        assert!(boings >= startup::INITIAL_SPAWNS);
    }

    #[test]
    fn test_step_interval() {
        let config = EngineConfig {
            rng_seed: Some(22),
            step_interval_ms: 4,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config, Box::new(FixedSurface::new(800.0, 600.0)), 0);
        engine.advance(40);
        assert_eq!(engine.tick(), 10);
    }

    #[test]
    fn test_advance_to_skips_long_gaps() {
        let mut engine = test_engine(23);
        engine.advance_to(10);
        assert_eq!(engine.tick(), 10);

        engine.advance_to(60_000);
        assert_eq!(engine.now_ms(), 60_000);
        assert_eq!(engine.tick(), 10 + MAX_CATCH_UP_MS);

        // Going backwards is a no-op
        engine.advance_to(5);
        assert_eq!(engine.now_ms(), 60_000);
    }

    #[test]
    fn test_metrics_reporting() {
        let metrics = Arc::new(Metrics::new());
        let mut engine = test_engine(24).with_metrics(metrics.clone());

        engine.apply_settings(&json!({ "loopCount": 2 }));
        engine.handle_command(&CommandEvent::default());
        engine.handle_command(&CommandEvent::chat("hey"));
        engine.advance(10);

        assert_eq!(metrics.settings_updates.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.commands_skipped.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.commands_handled.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.projectiles_spawned.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.live_projectiles.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.target_population.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn test_frame_lists_live_entities() {
        let mut engine = test_engine(25);
        engine.spawn_many(2);
        let frame = engine.frame();
        assert_eq!(frame.projectiles.len(), 2);
        assert_eq!(frame.time_ms, 0);
        assert!(!frame.dark);
    }
}
