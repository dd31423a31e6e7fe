//! Reconnect budget for dropped transports
//!
//! A session may reconnect a bounded number of times per sliding window. The
//! delay grows with every attempt since the last authenticated link, so a
//! bridge that keeps crashing does not spin.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Default ceiling on reconnect attempts per window
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default window over which attempts are counted
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Delay before the `step`-th reconnect since the last link
fn backoff(step: u32) -> Duration {
    match step {
        0 => Duration::ZERO,
        1 => Duration::from_secs(1),
        2 => Duration::from_secs(5),
        3 => Duration::from_secs(15),
        _ => Duration::from_secs(30),
    }
}

/// Per-session reconnect budget
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    /// Attempts still inside the window, oldest first
    recent: VecDeque<Instant>,
    max_attempts: u32,
    window: Duration,
    step: u32,
    gave_up: bool,
}

impl RestartPolicy {
    /// Allow `max_attempts` reconnects within any `window`
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            recent: VecDeque::new(),
            max_attempts,
            window,
            step: 0,
            gave_up: false,
        }
    }

    /// Claim the next reconnect
    ///
    /// Returns the delay to wait first, or `None` once the window's budget is
    /// spent. Giving up sticks until [`rearm`](Self::rearm) or
    /// [`connected`](Self::connected).
    pub fn next_attempt(&mut self) -> Option<Duration> {
        let now = Instant::now();
        while self
            .recent
            .front()
            .is_some_and(|at| now.duration_since(*at) >= self.window)
        {
            self.recent.pop_front();
        }

        if self.gave_up || self.recent.len() >= self.max_attempts as usize {
            self.gave_up = true;
            return None;
        }

        self.recent.push_back(now);
        let delay = backoff(self.step);
        self.step = self.step.saturating_add(1);
        Some(delay)
    }

    /// A link authenticated; earlier drops no longer count
    pub fn connected(&mut self) {
        self.recent.clear();
        self.step = 0;
        self.gave_up = false;
    }

    /// A caller started the session by hand; automatic reconnects may resume
    /// once the window has room again
    pub fn rearm(&mut self) {
        self.gave_up = false;
    }

    /// Whether automatic reconnects stopped
    pub fn gave_up(&self) -> bool {
        self.gave_up
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW)
    }
}
