//! Expiry arithmetic
//!
//! Turns a [`Ttl`] into an absolute expiry instant in epoch milliseconds.
//!
//! ## Rules
//! - Nothing supplied: now + 2 hours.
//! - Absolute instant supplied: that instant, as-is.
//! - Day/hour/minute counts supplied: `now + 1000 * minutes * hours * day_factor`
//!   where a missing count is `1` and `day_factor` is `day * 24` (or `1`).
//!
//! The counts multiply rather than add: `Ttl::new().hours(3).minutes(5)` expires
//! in 15 seconds, not 3h05m. Stored data depends on this, so it is kept.
//!
//! A count or timestamp of zero counts as not supplied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::error::{Result, StoreError};

/// Default lifetime of an entry written without any TTL input
pub const DEFAULT_TTL_MS: u64 = 2 * 60 * 60 * 1000;

/// Expiry sentinel for entries that never expire
pub const NEVER_EXPIRES: u64 = 0;

// =============================================================================
// Absolute Instants
// =============================================================================

/// An absolute expiry instant in one of the accepted input forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireAt {
    /// Epoch milliseconds, used verbatim
    Millis(u64),

    /// A system clock instant
    Time(SystemTime),

    /// A UTC date/time
    DateTime(DateTime<Utc>),
}

impl ExpireAt {
    /// Parse text input: RFC 3339 first, then raw epoch milliseconds.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if let Ok(datetime) = DateTime::parse_from_rfc3339(input) {
            return Ok(ExpireAt::DateTime(datetime.with_timezone(&Utc)));
        }

        input.parse::<u64>().map(ExpireAt::Millis).map_err(|_| {
            StoreError::InvalidExpiry(format!(
                "'{}' is neither an RFC 3339 date nor epoch milliseconds",
                input
            ))
        })
    }

    /// Epoch milliseconds for this instant.
    ///
    /// Converted instants at or before the epoch clamp to `1` so they read as
    /// expired rather than as the never-expires sentinel.
    pub fn as_millis(&self) -> u64 {
        match self {
            ExpireAt::Millis(ms) => *ms,
            ExpireAt::Time(time) => time
                .duration_since(UNIX_EPOCH)
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
                .unwrap_or(0)
                .max(1),
            ExpireAt::DateTime(datetime) => datetime.timestamp_millis().max(1) as u64,
        }
    }

    fn is_unset(&self) -> bool {
        matches!(self, ExpireAt::Millis(0))
    }
}

impl From<u64> for ExpireAt {
    fn from(ms: u64) -> Self {
        ExpireAt::Millis(ms)
    }
}

impl From<SystemTime> for ExpireAt {
    fn from(time: SystemTime) -> Self {
        ExpireAt::Time(time)
    }
}

impl From<DateTime<Utc>> for ExpireAt {
    fn from(datetime: DateTime<Utc>) -> Self {
        ExpireAt::DateTime(datetime)
    }
}

// =============================================================================
// TTL Input
// =============================================================================

/// Lifetime requested for a write
///
/// ```
/// use timestore::Ttl;
///
/// let ttl = Ttl::new().days(2).hours(3).minutes(5);
/// assert_eq!(ttl, Ttl::new().minutes(5).hours(3).days(2));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ttl {
    pub time: Option<ExpireAt>,
    pub day: Option<u64>,
    pub hours: Option<u64>,
    pub minutes: Option<u64>,
    /// Write the never-expires sentinel, ignoring every other field
    pub never: bool,
}

impl Ttl {
    /// No TTL input: the default two hours applies
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire at an absolute instant
    pub fn at(time: impl Into<ExpireAt>) -> Self {
        Self {
            time: Some(time.into()),
            ..Self::default()
        }
    }

    /// Never expire
    pub fn never() -> Self {
        Self {
            never: true,
            ..Self::default()
        }
    }

    pub fn days(mut self, day: u64) -> Self {
        self.day = Some(day);
        self
    }

    pub fn hours(mut self, hours: u64) -> Self {
        self.hours = Some(hours);
        self
    }

    pub fn minutes(mut self, minutes: u64) -> Self {
        self.minutes = Some(minutes);
        self
    }
}

/// Compute the absolute expiry instant for `ttl` relative to `now_ms`.
pub fn compute_expiry(now_ms: u64, ttl: &Ttl) -> u64 {
    if ttl.never {
        return NEVER_EXPIRES;
    }

    let time = ttl.time.filter(|t| !t.is_unset());
    let day = ttl.day.filter(|&d| d != 0);
    let hours = ttl.hours.filter(|&h| h != 0);
    let minutes = ttl.minutes.filter(|&m| m != 0);

    if time.is_none() && day.is_none() && hours.is_none() && minutes.is_none() {
        return now_ms.saturating_add(DEFAULT_TTL_MS);
    }

    if let Some(time) = time {
        return time.as_millis();
    }

    let day_factor = day.map_or(1, |d| d.saturating_mul(24));
    let offset = 1000u64
        .saturating_mul(minutes.unwrap_or(1))
        .saturating_mul(hours.unwrap_or(1))
        .saturating_mul(day_factor);

    now_ms.saturating_add(offset)
}

/// Whether an envelope with `expires_at` is still live at `now_ms`
pub fn is_live(expires_at: u64, now_ms: u64) -> bool {
    expires_at == NEVER_EXPIRES || expires_at > now_ms
}

// =============================================================================
// Clocks
// =============================================================================

/// Source of the current time in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
