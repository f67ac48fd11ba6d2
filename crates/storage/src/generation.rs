use crate::error::Error;
use chrono::Utc;
use faststr::FastStr;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicI64, Ordering},
};

// Last generation handed out by this process.
static LAST_ISSUED: AtomicI64 = AtomicI64::new(i64::MIN);

/// Version of a tag: wall-clock microseconds at the moment it was created or
/// last bumped.
///
/// Kept as integer microseconds so a generation read back from the store
/// compares exactly equal to the one that was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(i64);

impl Generation {
    /// Current wall clock, nudged forward so that two calls in one process
    /// never return the same generation. A bump issued in the same
    /// microsecond as the tag's creation must still change it.
    pub fn now() -> Self {
        let wall = Utc::now().timestamp_micros();
        let mut prev = LAST_ISSUED.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev.saturating_add(1));
            match LAST_ISSUED.compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return Self(next),
                Err(actual) => prev = actual,
            }
        }
    }

    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// Wire form stored under a tag key.
    pub fn encode(self) -> FastStr {
        self.0.to_string().into()
    }
}

impl FromStr for Generation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| Error::InvalidGeneration(FastStr::new(s)))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.div_euclid(1_000_000);
        let micros = self.0.rem_euclid(1_000_000);
        write!(f, "{secs}.{micros:06}")
    }
}
