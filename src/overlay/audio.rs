//! Sound effect arbitration across interchangeable playback channels
//!
//! Picks one of `CHANNEL_COUNT` channels per play, never the same channel
//! twice in a row, and optionally rate-limits plays based on how many
//! captions are on screen. Playback itself belongs to the host.

use rand::Rng;
use tracing::{debug, warn};

use crate::overlay::constants::sound::*;
use crate::overlay::settings::Settings;

/// Errors raised by playback channels
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AudioError {
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),
    #[error("Audio device unavailable")]
    Unavailable,
    #[error("No audio channel at index {0}")]
    UnknownChannel(usize),
}

/// A playback device the arbiter can command
pub trait AudioChannel: Send {
    /// Set playback volume (0.0 - 1.0)
    fn set_volume(&mut self, volume: f32);
    /// Start playing the channel's sound effect
    fn play(&mut self) -> Result<(), AudioError>;
}

/// What a call to `maybe_play` decided
#[derive(Debug, Clone, PartialEq)]
pub enum SoundOutcome {
    /// Sounds are turned off in settings
    Disabled,
    /// Too soon after the previous play
    RateLimited { remaining_ms: u64 },
    /// Channel selected and played
    Played { channel: usize },
    /// Channel selected but nothing is bound to it
    Unbound { channel: usize },
    /// Channel selected but playback failed
    Failed { channel: usize, error: AudioError },
}

impl SoundOutcome {
    /// Channel index if one was selected
    pub fn channel(&self) -> Option<usize> {
        match self {
            SoundOutcome::Played { channel }
            | SoundOutcome::Unbound { channel }
            | SoundOutcome::Failed { channel, .. } => Some(*channel),
            SoundOutcome::Disabled | SoundOutcome::RateLimited { .. } => None,
        }
    }
}

/// Minimum gap between plays for the given caption count
pub fn cooldown_ms(caption_count: usize) -> u64 {
    BASE_COOLDOWN_MS + PER_CAPTION_COOLDOWN_MS * caption_count as u64
}

pub struct SoundArbiter {
    channels: [Option<Box<dyn AudioChannel>>; CHANNEL_COUNT],
    last_channel: Option<usize>,
    last_played_at: Option<u64>,
}

impl SoundArbiter {
    /// Channel 0 counts as the previous pick, so the first play always
    /// lands on channel 1 or 2
    pub fn new() -> Self {
        Self {
            channels: Default::default(),
            last_channel: Some(0),
            last_played_at: None,
        }
    }

    /// Bind a playback device to channel `index`
    pub fn bind(&mut self, index: usize, channel: Box<dyn AudioChannel>) -> Result<(), AudioError> {
        let slot = self
            .channels
            .get_mut(index)
            .ok_or(AudioError::UnknownChannel(index))?;
        *slot = Some(channel);
        Ok(())
    }

    pub fn last_channel(&self) -> Option<usize> {
        self.last_channel
    }

    pub fn last_played_at(&self) -> Option<u64> {
        self.last_played_at
    }

    /// Pick the next channel: uniform over all channels, bumped by one if it
    /// would repeat the previous pick
    pub fn select_channel<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let channel = rng.gen_range(0..CHANNEL_COUNT);
        if Some(channel) == self.last_channel {
            (channel + 1) % CHANNEL_COUNT
        } else {
            channel
        }
    }

    /// Play a sound effect if settings and the rate limit allow it
    pub fn maybe_play<R: Rng + ?Sized>(
        &mut self,
        settings: &Settings,
        caption_count: usize,
        now_ms: u64,
        rng: &mut R,
    ) -> SoundOutcome {
        if !settings.play_sounds {
            return SoundOutcome::Disabled;
        }

        if settings.limit_sounds {
            if let Some(last) = self.last_played_at {
                let elapsed = now_ms.saturating_sub(last);
                let cooldown = cooldown_ms(caption_count);
                if elapsed < cooldown {
                    return SoundOutcome::RateLimited {
                        remaining_ms: cooldown - elapsed,
                    };
                }
            }
        }

        let channel = self.select_channel(rng);

        // Bookkeeping happens whether or not a device is bound
        self.last_channel = Some(channel);
        self.last_played_at = Some(now_ms);

        let Some(device) = self.channels[channel].as_mut() else {
            debug!("No device bound to sound channel {}", channel);
            return SoundOutcome::Unbound { channel };
        };

        device.set_volume(settings.volume);
        match device.play() {
            Ok(()) => SoundOutcome::Played { channel },
            Err(error) => {
                warn!("Sound channel {} failed to play: {}", channel, error);
                SoundOutcome::Failed { channel, error }
            }
        }
    }
}

impl Default for SoundArbiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    /// Test channel recording volumes and plays into a shared log
    pub(crate) struct RecordingChannel {
        pub index: usize,
        pub log: Arc<Mutex<Vec<(usize, f32)>>>,
        pub volume: f32,
        pub fail: bool,
    }

    impl AudioChannel for RecordingChannel {
        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }

        fn play(&mut self) -> Result<(), AudioError> {
            if self.fail {
                return Err(AudioError::PlaybackFailed("blocked by autoplay policy".to_string()));
            }
            self.log.lock().push((self.index, self.volume));
            Ok(())
        }
    }

    pub(crate) fn recording_arbiter(fail: bool) -> (SoundArbiter, Arc<Mutex<Vec<(usize, f32)>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut arbiter = SoundArbiter::new();
        for index in 0..CHANNEL_COUNT {
            let channel = RecordingChannel {
                index,
                log: log.clone(),
                volume: 0.0,
                fail,
            };
            arbiter.bind(index, Box::new(channel)).unwrap();
        }
        (arbiter, log)
    }

    fn sound_settings(limit_sounds: bool) -> Settings {
        Settings {
            play_sounds: true,
            limit_sounds,
            volume: 0.7,
            ..Settings::default()
        }
    }

    #[test]
    fn test_disabled_is_noop() {
        let (mut arbiter, log) = recording_arbiter(false);
        let mut rng = StdRng::seed_from_u64(1);

        let outcome = arbiter.maybe_play(&Settings::default(), 0, 0, &mut rng);
        assert_eq!(outcome, SoundOutcome::Disabled);
        assert!(log.lock().is_empty());
        assert_eq!(arbiter.last_played_at(), None);
    }

    #[test]
    fn test_plays_with_settings_volume() {
        let (mut arbiter, log) = recording_arbiter(false);
        let mut rng = StdRng::seed_from_u64(1);

        let outcome = arbiter.maybe_play(&sound_settings(false), 0, 0, &mut rng);
        let channel = outcome.channel().unwrap();
        assert_eq!(outcome, SoundOutcome::Played { channel });
        assert_eq!(*log.lock(), vec![(channel, 0.7)]);
    }

    #[test]
    fn test_no_immediate_repeat() {
        let (mut arbiter, log) = recording_arbiter(false);
        let mut rng = StdRng::seed_from_u64(99);
        let settings = sound_settings(false);

        for i in 0..500 {
            arbiter.maybe_play(&settings, 0, i, &mut rng);
        }

        let log = log.lock();
        assert_eq!(log.len(), 500);
        for pair in log.windows(2) {
            assert_ne!(pair[0].0, pair[1].0);
        }
    }

    #[test]
    fn test_first_pick_skips_channel_zero() {
        for seed in 0..200 {
            let (mut arbiter, log) = recording_arbiter(false);
            let mut rng = StdRng::seed_from_u64(seed);

            assert_eq!(arbiter.last_channel(), Some(0));
            arbiter.maybe_play(&sound_settings(false), 0, 0, &mut rng);
            assert_ne!(log.lock()[0].0, 0);
        }
    }

    #[test]
    fn test_rate_limit_scales_with_captions() {
        let (mut arbiter, log) = recording_arbiter(false);
        let mut rng = StdRng::seed_from_u64(5);
        let settings = sound_settings(true);

        assert!(arbiter.maybe_play(&settings, 3, 10_000, &mut rng).channel().is_some());

        // 3 captions -> 1300 ms cooldown
        assert_eq!(
            arbiter.maybe_play(&settings, 3, 11_000, &mut rng),
            SoundOutcome::RateLimited { remaining_ms: 300 }
        );
        assert!(arbiter.maybe_play(&settings, 3, 11_300, &mut rng).channel().is_some());
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_unlimited_ignores_cooldown() {
        let (mut arbiter, log) = recording_arbiter(false);
        let mut rng = StdRng::seed_from_u64(5);
        let settings = sound_settings(false);

        arbiter.maybe_play(&settings, 10, 0, &mut rng);
        arbiter.maybe_play(&settings, 10, 1, &mut rng);
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_failure_still_records_selection() {
        let (mut arbiter, log) = recording_arbiter(true);
        let mut rng = StdRng::seed_from_u64(3);

        let outcome = arbiter.maybe_play(&sound_settings(true), 0, 500, &mut rng);
        assert!(matches!(outcome, SoundOutcome::Failed { .. }));
        assert_eq!(arbiter.last_channel(), outcome.channel());
        assert_eq!(arbiter.last_played_at(), Some(500));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_unbound_channel_tolerated() {
        let mut arbiter = SoundArbiter::new();
        let mut rng = StdRng::seed_from_u64(3);

        let outcome = arbiter.maybe_play(&sound_settings(false), 0, 42, &mut rng);
        assert!(matches!(outcome, SoundOutcome::Unbound { .. }));
        assert_eq!(arbiter.last_played_at(), Some(42));
    }

    #[test]
    fn test_bind_out_of_range() {
        let (_, log) = recording_arbiter(false);
        let mut arbiter = SoundArbiter::new();
        let channel = RecordingChannel {
            index: 9,
            log,
            volume: 0.0,
            fail: false,
        };
        assert_eq!(
            arbiter.bind(CHANNEL_COUNT, Box::new(channel)),
            Err(AudioError::UnknownChannel(CHANNEL_COUNT))
        );
    }

    #[test]
    fn test_cooldown() {
        assert_eq!(cooldown_ms(0), 1000);
        assert_eq!(cooldown_ms(4), 1400);
    }
}
