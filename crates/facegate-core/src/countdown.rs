//! Session confirmation countdown.
//!
//! Pure state machine; the daemon owns the timer and feeds it ticks.

use crate::login::LoginResult;

/// Default number of ticks a SUCCESS streak must survive.
pub const DEFAULT_COUNTDOWN_FROM: u32 = 5;

/// What the timer owner must do after a result change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownCommand {
    /// Entered SUCCESS: start the tick timer.
    Start,
    /// Left SUCCESS: cancel the tick timer (counter already reset).
    Stop,
    /// Nothing changed.
    Keep,
}

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Remaining(u32),
    Confirmed,
    /// Tick arrived while not counting (stale timer).
    Idle,
}

#[derive(Debug, Clone)]
pub struct SessionConfirmer {
    from: u32,
    counter: u32,
    running: bool,
}

impl SessionConfirmer {
    pub fn new(from: u32) -> Self {
        Self {
            from,
            counter: from,
            running: false,
        }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Feed the latest login result.
    pub fn on_result(&mut self, result: LoginResult) -> CountdownCommand {
        match (result, self.running) {
            (LoginResult::Success, false) => {
                self.running = true;
                CountdownCommand::Start
            }
            (LoginResult::Success, true) => CountdownCommand::Keep,
            (_, true) => {
                self.reset();
                CountdownCommand::Stop
            }
            (_, false) => {
                self.counter = self.from;
                CountdownCommand::Keep
            }
        }
    }

    /// Advance by one tick.
    pub fn tick(&mut self) -> Tick {
        if !self.running {
            return Tick::Idle;
        }
        self.counter = self.counter.saturating_sub(1);
        if self.counter == 0 {
            self.running = false;
            Tick::Confirmed
        } else {
            Tick::Remaining(self.counter)
        }
    }

    pub fn reset(&mut self) {
        self.running = false;
        self.counter = self.from;
    }
}

impl Default for SessionConfirmer {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTDOWN_FROM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_starts_once() {
        let mut c = SessionConfirmer::default();
        assert_eq!(c.on_result(LoginResult::Success), CountdownCommand::Start);
        assert_eq!(c.on_result(LoginResult::Success), CountdownCommand::Keep);
        assert!(c.is_running());
    }

    #[test]
    fn test_five_ticks_confirm() {
        let mut c = SessionConfirmer::default();
        c.on_result(LoginResult::Success);
        for expected in (1..5).rev() {
            assert_eq!(c.tick(), Tick::Remaining(expected));
        }
        assert_eq!(c.tick(), Tick::Confirmed);
        assert_eq!(c.counter(), 0);
        assert!(!c.is_running());
    }

    #[test]
    fn test_losing_streak_resets_counter() {
        let mut c = SessionConfirmer::default();
        c.on_result(LoginResult::Success);
        c.tick();
        c.tick();
        assert_eq!(c.counter(), 3);
        assert_eq!(c.on_result(LoginResult::Failed), CountdownCommand::Stop);
        assert_eq!(c.counter(), 5);
        assert_eq!(c.tick(), Tick::Idle);
        assert_eq!(c.counter(), 5);
    }

    #[test]
    fn test_failed_while_idle_keeps() {
        let mut c = SessionConfirmer::new(3);
        assert_eq!(c.on_result(LoginResult::Failed), CountdownCommand::Keep);
        assert_eq!(c.on_result(LoginResult::Pending), CountdownCommand::Keep);
        assert_eq!(c.counter(), 3);
    }

    #[test]
    fn test_restart_after_reset_counts_from_top() {
        let mut c = SessionConfirmer::new(2);
        c.on_result(LoginResult::Success);
        c.tick();
        c.on_result(LoginResult::Failed);
        assert_eq!(c.on_result(LoginResult::Success), CountdownCommand::Start);
        assert_eq!(c.tick(), Tick::Remaining(1));
        assert_eq!(c.tick(), Tick::Confirmed);
    }
}
