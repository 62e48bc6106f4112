use chrono::{DateTime, Local};

/// Source of "now" for freshness checks and expiration stamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Unix seconds.
    fn timestamp(&self) -> i64 {
        self.now().timestamp()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl FixedClock {
    /// Freezes the clock at a local wall-clock time.
    pub fn at(naive: chrono::NaiveDateTime) -> Self {
        FixedClock(crate::calendar::to_local(naive))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}
