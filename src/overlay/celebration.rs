//! Celebration mode: a timed flag re-armed by every activation

use tracing::debug;

use crate::overlay::constants::celebration::WINDOW_MS;
use crate::overlay::scheduler::{Scheduler, TimerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CelebrationState {
    Inactive,
    Active,
}

#[derive(Debug, Default)]
pub struct Celebration {
    active: bool,
    expiry: Option<TimerId>,
    expires_at: Option<u64>,
}

impl Celebration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CelebrationState {
        if self.active {
            CelebrationState::Active
        } else {
            CelebrationState::Inactive
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// When the pending deactivation fires, if any
    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    /// Activate (or re-activate) and restart the deactivation window.
    /// `expire_task` is what the scheduler hands back when the window ends.
    pub fn activate<T>(&mut self, now_ms: u64, scheduler: &mut Scheduler<T>, expire_task: T) {
        if let Some(previous) = self.expiry.take() {
            scheduler.cancel(previous);
        }

        let due = now_ms + WINDOW_MS;
        self.active = true;
        self.expiry = Some(scheduler.schedule_at(due, expire_task));
        self.expires_at = Some(due);
        debug!("Celebration active until {}", due);
    }

    /// Handle a fired deactivation timer. Stale timers are ignored.
    pub fn expire(&mut self, timer: TimerId) -> bool {
        if self.expiry != Some(timer) {
            return false;
        }
        self.active = false;
        self.expiry = None;
        self.expires_at = None;
        debug!("Celebration ended");
        true
    }
}
