use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Time source injected into the engine.
///
/// Reward accrual and transfer hashes are time-driven, so the engine never
/// reads the wall clock directly. Production uses [`SystemClock`]; tests
/// drive a [`ManualClock`].
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Current time as unix seconds (the unit the farm math works in).
    fn unix_now(&self) -> u64 {
        self.now().timestamp().max(0) as u64
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Clones share the same underlying instant, so a test can keep a handle
/// while the engine owns its own copy.
///
/// # Examples
///
/// ```
/// use defi_engine::core::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::starting_at(1_700_000_000);
/// clock.advance(3_600);
/// assert_eq!(clock.unix_now(), 1_700_003_600);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    unix_seconds: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn starting_at(unix_seconds: i64) -> Self {
        Self {
            unix_seconds: Arc::new(AtomicI64::new(unix_seconds)),
        }
    }

    pub fn set(&self, unix_seconds: i64) {
        self.unix_seconds.store(unix_seconds, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.unix_seconds.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let secs = self.unix_seconds.load(Ordering::SeqCst);
        Utc.timestamp_opt(secs, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}
