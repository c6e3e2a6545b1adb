use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::shared::constants::PAUSE_POLL_MS;

/// What the frame loop should do after passing the control gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    Run,
    Stop,
}

#[derive(Default)]
struct ControlState {
    paused: bool,
    stopped: bool,
}

#[derive(Default)]
struct Inner {
    state: Mutex<ControlState>,
    changed: Condvar,
}

/// Pause/resume/stop flags shared between the frame loop and its caller.
///
/// Clones share the same register, so a handle can be moved to another
/// thread while the engine keeps its own. `stop` is terminal: once set it
/// is never cleared.
#[derive(Clone, Default)]
pub struct ControlHandle {
    inner: Arc<Inner>,
}

impl ControlHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.lock().paused = true;
    }

    pub fn resume(&self) {
        self.lock().paused = false;
        self.inner.changed.notify_all();
    }

    pub fn stop(&self) {
        self.lock().stopped = true;
        self.inner.changed.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Blocks while paused, re-checking at least every `PAUSE_POLL_MS`.
    ///
    /// Returns `Gate::Stop` as soon as the register is stopped, whether or
    /// not it is also paused.
    pub fn wait_while_paused(&self) -> Gate {
        let poll = Duration::from_millis(PAUSE_POLL_MS);
        let mut state = self.lock();
        loop {
            if state.stopped {
                return Gate::Stop;
            }
            if !state.paused {
                return Gate::Run;
            }
            state = match self.inner.changed.wait_timeout(state, poll) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    // A panicking holder cannot leave two bools inconsistent.
    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_new_register_runs() {
        let control = ControlHandle::new();
        assert!(!control.is_paused());
        assert!(!control.is_stopped());
        assert_eq!(control.wait_while_paused(), Gate::Run);
    }

    #[test]
    fn test_pause_and_resume_toggle_flag() {
        let control = ControlHandle::new();
        control.pause();
        assert!(control.is_paused());
        control.resume();
        assert!(!control.is_paused());
    }

    #[test]
    fn test_stop_is_terminal() {
        let control = ControlHandle::new();
        control.stop();
        control.resume();
        assert!(control.is_stopped());
        assert_eq!(control.wait_while_paused(), Gate::Stop);
    }

    #[test]
    fn test_stop_wins_over_pause() {
        let control = ControlHandle::new();
        control.pause();
        control.stop();
        assert_eq!(control.wait_while_paused(), Gate::Stop);
    }

    #[test]
    fn test_clones_share_state() {
        let control = ControlHandle::new();
        let remote = control.clone();
        remote.pause();
        assert!(control.is_paused());
    }

    #[test]
    fn test_wait_blocks_until_resume() {
        let control = ControlHandle::new();
        control.pause();
        let remote = control.clone();
        let resumer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            remote.resume();
        });

        let start = Instant::now();
        assert_eq!(control.wait_while_paused(), Gate::Run);
        assert!(start.elapsed() >= Duration::from_millis(100));
        resumer.join().unwrap();
    }

    #[test]
    fn test_wait_wakes_on_stop() {
        let control = ControlHandle::new();
        control.pause();
        let remote = control.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.stop();
        });

        assert_eq!(control.wait_while_paused(), Gate::Stop);
        stopper.join().unwrap();
    }
}
