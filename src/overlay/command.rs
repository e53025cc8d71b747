//! Command feed events (chat messages, celebration triggers)
//!
//! The feed replays its current document as the first push after
//! subscribing. `CommandSubscription` swallows that replay; every later
//! push is turned into a `CommandPlan` the engine executes.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::overlay::constants::{command, motivation};
use crate::overlay::settings::Settings;

/// Ad-hoc event pushed by the command feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandEvent {
    /// Chat message text
    #[serde(default, alias = "msg")]
    pub text: Option<String>,
    /// Celebration trigger
    #[serde(default, alias = "milkMan")]
    pub celebrate: Option<bool>,
}

impl CommandEvent {
    pub fn chat(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            celebrate: None,
        }
    }

    pub fn celebration() -> Self {
        Self {
            text: None,
            celebrate: Some(true),
        }
    }

    pub fn is_celebration(&self) -> bool {
        self.celebrate.unwrap_or(false)
    }

    /// Message text, if any non-empty text was sent
    pub fn message(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}

/// Priming state of one command feed subscription
#[derive(Debug, Clone, Default)]
pub struct CommandSubscription {
    primed: bool,
}

impl CommandSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false for the replayed snapshot, true for live events
    pub fn accept(&mut self) -> bool {
        if self.primed {
            return true;
        }
        self.primed = true;
        false
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Treat the next push as a replay again (after resubscribing)
    pub fn reset(&mut self) {
        self.primed = false;
    }
}

/// Spawns and side effects derived from one live command event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandPlan {
    pub celebrate: bool,
    /// Uncaptioned spawns, one per 20 characters of text
    pub blank_spawns: usize,
    /// Extra spawns from an active motivation window
    pub motivation_spawns: usize,
    /// Caption for the final spawn; empty means none
    pub caption: String,
}

impl CommandPlan {
    pub fn total_spawns(&self) -> usize {
        self.blank_spawns + self.motivation_spawns + 1
    }
}

/// Work out what a live command event should do
pub fn plan_command<R: Rng + ?Sized>(
    event: &CommandEvent,
    settings: &Settings,
    now_ms: i64,
    rng: &mut R,
) -> CommandPlan {
    let mut plan = CommandPlan {
        celebrate: event.is_celebration(),
        ..CommandPlan::default()
    };

    if let Some(text) = event.message() {
        let len = text.chars().count();
        plan.blank_spawns = len / command::CHARS_PER_EXTRA_SPAWN;

        if !plan.celebrate && settings.allow_msgs_from_chat && len < command::MAX_RELAY_CHARS {
            plan.caption = text.to_string();
        }
    }

    if settings.motivation_minutes != 0 {
        if settings.in_motivation_window(now_ms) {
            debug!("Motivation window active");
            plan.motivation_spawns = motivation::EXTRA_SPAWNS;
            if plan.caption.is_empty() {
                plan.caption = motivation_phrase(rng);
            }
        } else {
            debug!("Outside motivation window ({} ms from start)", now_ms.saturating_sub(settings.motivate_at));
        }
    }

    plan
}

/// Random phrase from the motivation list, upper-cased 1 time in 4
pub fn motivation_phrase<R: Rng + ?Sized>(rng: &mut R) -> String {
    let phrase = motivation::PHRASES[rng.gen_range(0..motivation::PHRASES.len())];
    if rng.gen_range(0..motivation::UPPERCASE_ODDS) == 0 {
        phrase.to_uppercase()
    } else {
        phrase.to_string()
    }
}
