//! Reminder countdown state machine.
//!
//! Pure in-memory counter with whole-minute granularity. A seconds sub-counter
//! rolls into a minute every 60 calls to [`ReminderClock::tick_second`]; the
//! background ticker makes those calls once per wall-clock second.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockPhase {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Emitted when the elapsed time reaches the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderFired {
    pub interval_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderClock {
    phase: ClockPhase,
    elapsed_minutes: u32,
    interval_minutes: u32,
    seconds_into_minute: u32,
}

impl ReminderClock {
    pub const SECONDS_PER_MINUTE: u32 = 60;

    pub fn new(interval_minutes: u32) -> Self {
        Self {
            phase: ClockPhase::Stopped,
            elapsed_minutes: 0,
            interval_minutes: interval_minutes.max(1),
            seconds_into_minute: 0,
        }
    }

    pub fn phase(&self) -> ClockPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == ClockPhase::Running
    }

    pub fn elapsed_minutes(&self) -> u32 {
        self.elapsed_minutes
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    /// Begin a fresh countdown. Restarts from zero from any phase.
    pub fn start(&mut self, interval_minutes: u32) {
        self.interval_minutes = interval_minutes.max(1);
        self.reset_counters();
        self.phase = ClockPhase::Running;
    }

    /// Halt ticking but keep the elapsed count. No-op unless running.
    pub fn pause(&mut self) {
        if self.phase == ClockPhase::Running {
            self.phase = ClockPhase::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.phase = ClockPhase::Stopped;
        self.reset_counters();
    }

    /// While running, the countdown restarts against the new interval; remaining
    /// time is never prorated.
    pub fn change_interval(&mut self, interval_minutes: u32) {
        self.interval_minutes = interval_minutes.max(1);
        if self.phase == ClockPhase::Running {
            self.reset_counters();
        }
    }

    pub fn tick_second(&mut self) -> Option<ReminderFired> {
        if self.phase != ClockPhase::Running {
            return None;
        }
        self.seconds_into_minute += 1;
        if self.seconds_into_minute < Self::SECONDS_PER_MINUTE {
            return None;
        }
        self.seconds_into_minute = 0;
        self.tick_minute()
    }

    pub fn tick_minute(&mut self) -> Option<ReminderFired> {
        if self.phase != ClockPhase::Running {
            return None;
        }
        self.elapsed_minutes += 1;
        if self.elapsed_minutes >= self.interval_minutes {
            self.elapsed_minutes = 0;
            return Some(ReminderFired {
                interval_minutes: self.interval_minutes,
            });
        }
        None
    }

    /// Minutes until the next reminder; `None` unless running.
    pub fn time_remaining(&self) -> Option<u32> {
        self.is_running()
            .then(|| self.interval_minutes.saturating_sub(self.elapsed_minutes))
    }

    fn reset_counters(&mut self) {
        self.elapsed_minutes = 0;
        self.seconds_into_minute = 0;
    }
}
