//! # Backoff Policy
//!
//! Fixed table of delays consumed attempt by attempt. The schedule is
//! stateless: callers keep their own attempt counter and ask for the delay
//! before each attempt. Attempt 0 always runs immediately; attempt `k` waits
//! `delays[k - 1]`; once the table is used up the fetch is exhausted.
//!
//! A table of length `n` therefore allows `n + 1` attempts in total.

use std::time::Duration;

/// Decision for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Sleep this long, then attempt
    Wait(Duration),
    /// No attempts left for this fetch
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
}

impl BackoffSchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Table used by the cache warmer: 30s, 1m, 2m, 5m
    pub fn warming() -> Self {
        Self::new(vec![
            Duration::from_secs(30),
            Duration::from_secs(60),
            Duration::from_secs(120),
            Duration::from_secs(300),
        ])
    }

    /// Table used by cache-first refills of single entities: 30s, 1m, 2m
    pub fn background_refill() -> Self {
        Self::new(vec![
            Duration::from_secs(30),
            Duration::from_secs(60),
            Duration::from_secs(120),
        ])
    }

    pub fn next_delay(&self, attempt: u32) -> Backoff {
        if attempt == 0 {
            return Backoff::Wait(Duration::ZERO);
        }

        match self.delays.get(attempt as usize - 1) {
            Some(delay) => Backoff::Wait(*delay),
            None => Backoff::Exhausted,
        }
    }

    /// Total number of attempts this schedule allows
    pub fn max_attempts(&self) -> u32 {
        self.delays.len() as u32 + 1
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::warming()
    }
}
