use std::{
    fmt,
    time::{Duration, Instant},
};

use crate::{PosterError, Result};

/// Default tick rate of the frame loop, in ticks per second.
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Playback state of the frame loop. Transitions only via `play`/`pause`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Paused,
    Playing,
}

/// Named callback slots invoked by [`FrameLoop`].
///
/// Invocation contract: `on_init` fires exactly once at construction;
/// `on_play`/`on_pause` fire only on an actual state transition; `on_update`
/// fires at most once per due tick while playing, never re-entrantly. Hook
/// errors are never swallowed; see [`FrameLoop::advance`] for the policy.
pub trait LoopHooks {
    fn on_init(&mut self) {}

    fn on_play(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_pause(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_update(&mut self) -> Result<()>;
}

/// Cooperative single-threaded frame scheduler.
///
/// The loop owns no thread; the caller drives it by feeding the current
/// instant into [`FrameLoop::advance`]. Ticks are serialized by construction
/// (one callback per `advance` call) and missed ticks are skipped, never run
/// back to back.
pub struct FrameLoop<H> {
    hooks: H,
    state: LoopState,
    frame_interval: Duration,
    next_tick: Option<Instant>,
}

impl<H: LoopHooks> FrameLoop<H> {
    /// Builds a loop at the default frame rate and fires `on_init`.
    pub fn new(hooks: H) -> Self {
        let mut frame_loop = Self {
            hooks,
            state: LoopState::Paused,
            frame_interval: Duration::from_secs(1) / DEFAULT_FRAME_RATE,
            next_tick: None,
        };
        frame_loop.hooks.on_init();
        frame_loop
    }

    /// Builds a loop ticking `frame_rate` times per second.
    pub fn with_frame_rate(hooks: H, frame_rate: u32) -> Result<Self> {
        if frame_rate == 0 {
            return Err(PosterError::InvalidInput("frame_rate must be at least 1"));
        }
        let mut frame_loop = Self::new(hooks);
        frame_loop.frame_interval = Duration::from_secs(1) / frame_rate;
        Ok(frame_loop)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Starts ticking. A no-op when already playing. `on_play` runs before the
    /// transition: if it fails the loop stays paused, so a rejected start
    /// leaves no partial state behind.
    pub fn play(&mut self) -> Result<()> {
        if self.state == LoopState::Playing {
            return Ok(());
        }
        self.hooks.on_play()?;
        self.state = LoopState::Playing;
        // First tick is due on the next advance call.
        self.next_tick = None;
        Ok(())
    }

    /// Stops ticking. A no-op when already paused; safe to call at any time,
    /// including before the first play. The transition happens before
    /// `on_pause` runs, so the loop is paused even if the hook fails.
    pub fn pause(&mut self) -> Result<()> {
        if self.state == LoopState::Paused {
            return Ok(());
        }
        self.state = LoopState::Paused;
        self.next_tick = None;
        self.hooks.on_pause()
    }

    /// Runs `on_update` if a tick is due at `now` and returns the number of
    /// updates run (0 or 1). Ticks missed while the caller was away are
    /// skipped. A failed update pauses the loop, runs `on_pause` so
    /// collaborators stop, and returns the update's error.
    pub fn advance(&mut self, now: Instant) -> Result<u32> {
        if self.state == LoopState::Paused {
            return Ok(0);
        }
        let due = self.next_tick.map_or(true, |tick| now >= tick);
        if !due {
            return Ok(0);
        }

        if let Err(err) = self.hooks.on_update() {
            self.state = LoopState::Paused;
            self.next_tick = None;
            // The update error is the one reported.
            let _ = self.hooks.on_pause();
            return Err(err);
        }

        self.next_tick = Some(now + self.frame_interval);
        Ok(1)
    }
}

impl<H> fmt::Debug for FrameLoop<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameLoop")
            .field("state", &self.state)
            .field("frame_interval", &self.frame_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingHooks {
        inits: u32,
        plays: u32,
        pauses: u32,
        updates: u32,
        fail_play: bool,
        fail_update: bool,
    }

    impl LoopHooks for CountingHooks {
        fn on_init(&mut self) {
            self.inits += 1;
        }

        fn on_play(&mut self) -> Result<()> {
            if self.fail_play {
                return Err(PosterError::NotReady);
            }
            self.plays += 1;
            Ok(())
        }

        fn on_pause(&mut self) -> Result<()> {
            self.pauses += 1;
            Ok(())
        }

        fn on_update(&mut self) -> Result<()> {
            if self.fail_update {
                return Err(PosterError::msg("update exploded"));
            }
            self.updates += 1;
            Ok(())
        }
    }

    #[test]
    fn init_fires_once_at_construction() {
        let frame_loop = FrameLoop::new(CountingHooks::default());
        assert_eq!(frame_loop.hooks().inits, 1);
        assert_eq!(frame_loop.state(), LoopState::Paused);
    }

    #[test]
    fn repeated_play_fires_the_hook_once() {
        let mut frame_loop = FrameLoop::new(CountingHooks::default());
        frame_loop.play().unwrap();
        frame_loop.play().unwrap();
        assert_eq!(frame_loop.hooks().plays, 1);
        assert_eq!(frame_loop.state(), LoopState::Playing);
    }

    #[test]
    fn pause_before_any_play_is_a_noop() {
        let mut frame_loop = FrameLoop::new(CountingHooks::default());
        frame_loop.pause().unwrap();
        assert_eq!(frame_loop.hooks().pauses, 0);
        assert_eq!(frame_loop.state(), LoopState::Paused);
    }

    #[test]
    fn ticks_follow_the_frame_interval() {
        let mut frame_loop =
            FrameLoop::with_frame_rate(CountingHooks::default(), 10).unwrap();
        let start = Instant::now();
        frame_loop.play().unwrap();

        assert_eq!(frame_loop.advance(start).unwrap(), 1);
        assert_eq!(
            frame_loop.advance(start + Duration::from_millis(10)).unwrap(),
            0
        );
        assert_eq!(
            frame_loop.advance(start + Duration::from_millis(100)).unwrap(),
            1
        );
        // A late tick reschedules from now instead of bursting.
        assert_eq!(
            frame_loop.advance(start + Duration::from_millis(450)).unwrap(),
            1
        );
        assert_eq!(
            frame_loop.advance(start + Duration::from_millis(500)).unwrap(),
            0
        );
        assert_eq!(frame_loop.hooks().updates, 3);
    }

    #[test]
    fn no_updates_after_pause() {
        let mut frame_loop = FrameLoop::with_frame_rate(CountingHooks::default(), 10).unwrap();
        let start = Instant::now();
        frame_loop.play().unwrap();
        frame_loop.advance(start).unwrap();
        frame_loop.pause().unwrap();

        assert_eq!(
            frame_loop.advance(start + Duration::from_secs(1)).unwrap(),
            0
        );
        assert_eq!(frame_loop.hooks().updates, 1);
        assert_eq!(frame_loop.hooks().pauses, 1);
    }

    #[test]
    fn failed_play_hook_leaves_the_loop_paused() {
        let mut frame_loop = FrameLoop::new(CountingHooks {
            fail_play: true,
            ..Default::default()
        });
        assert!(frame_loop.play().is_err());
        assert_eq!(frame_loop.state(), LoopState::Paused);
        assert_eq!(frame_loop.advance(Instant::now()).unwrap(), 0);
    }

    #[test]
    fn failed_update_pauses_the_loop_and_surfaces_the_error() {
        let mut frame_loop = FrameLoop::new(CountingHooks {
            fail_update: true,
            ..Default::default()
        });
        frame_loop.play().unwrap();

        let err = frame_loop.advance(Instant::now()).unwrap_err();
        assert!(matches!(err, PosterError::Message(_)));
        assert_eq!(frame_loop.state(), LoopState::Paused);
        assert_eq!(frame_loop.hooks().pauses, 1);
    }
}
