#![forbid(unsafe_code)]

//! Clock abstraction for certificate validity checks.
//!
//! Validation contexts read `now()` through this trait so tests can pin
//! the instant; the default implementation binds to the system clock.

use der::DateTime;
use sigill_core::Error;

/// A source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Result<DateTime, Error>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<DateTime, Error> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| Error::Certificate(format!("system time error: {e}")))?;
        DateTime::from_unix_duration(now)
            .map_err(|e| Error::Certificate(format!("time conversion error: {e}")))
    }
}

/// A clock frozen at a fixed instant, for deterministic tests of
/// certificate validity windows.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime);

impl FixedClock {
    pub fn new(instant: DateTime) -> Self {
        Self(instant)
    }

    /// Build a fixed clock from calendar components (UTC).
    pub fn at(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self, Error> {
        DateTime::new(year, month, day, hour, minute, second)
            .map(Self)
            .map_err(|e| Error::Certificate(format!("invalid fixed clock instant: {e}")))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Result<DateTime, Error> {
        Ok(self.0)
    }
}
