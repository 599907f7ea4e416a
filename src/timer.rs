use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock source. The session reads current time through this seam so
/// tests can drive timers deterministically.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Session timer with optional countdown deadline.
///
/// Pausing shifts reference epochs instead of stopping a clock: on resume the
/// start epoch and any active deadline move forward by the exact pause
/// duration, so paused time never counts against elapsed time or the
/// countdown. Expiry checks read current wall-clock time and are idempotent.
#[derive(Debug, Clone)]
pub struct SessionTimer {
    start_ms: u64,
    deadline_ms: Option<u64>,
    paused_at: Option<u64>,
}

impl SessionTimer {
    pub fn start(now: u64) -> Self {
        Self {
            start_ms: now,
            deadline_ms: None,
            paused_at: None,
        }
    }

    pub fn set_deadline(&mut self, deadline_ms: u64) {
        self.deadline_ms = Some(deadline_ms);
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline_ms
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn pause(&mut self, now: u64) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub fn resume(&mut self, now: u64) {
        if let Some(paused_at) = self.paused_at.take() {
            let pause_duration = now.saturating_sub(paused_at);
            self.start_ms += pause_duration;
            if let Some(d) = self.deadline_ms {
                self.deadline_ms = Some(d + pause_duration);
            }
        }
    }

    pub fn elapsed_ms(&self, now: u64) -> u64 {
        let effective_now = self.paused_at.unwrap_or(now);
        effective_now.saturating_sub(self.start_ms)
    }

    pub fn elapsed_secs(&self, now: u64) -> f64 {
        self.elapsed_ms(now) as f64 / 1000.0
    }

    /// A paused timer never reports expiry; the deadline shifts on resume.
    pub fn is_expired(&self, now: u64) -> bool {
        !self.is_paused() && self.deadline_ms.is_some_and(|d| now >= d)
    }

    pub fn remaining_ms(&self, now: u64) -> Option<u64> {
        let deadline = self.deadline_ms?;
        let effective_now = self.paused_at.unwrap_or(now);
        Some(deadline.saturating_sub(effective_now))
    }
}
