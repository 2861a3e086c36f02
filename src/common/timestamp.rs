use std::sync::atomic::{AtomicU64, Ordering};

/// Global monotonic modification timestamp.
///
/// Every dirty unfix stamps the block header with a value from this source;
/// recovery orders replay by comparing them. The counter is process-wide and
/// never reused, so two distinct modifications always compare unequal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeStamp(pub u64);

static CLOCK: AtomicU64 = AtomicU64::new(1);

impl TimeStamp {
    /// A timestamp smaller than any assigned one.
    pub const ZERO: TimeStamp = TimeStamp(0);

    /// An illegal value stamped into freshly allocated blocks.
    pub const ILLEGAL: TimeStamp = TimeStamp(u64::MAX);

    /// Take the next timestamp.
    pub fn assign() -> TimeStamp {
        TimeStamp(CLOCK.fetch_add(1, Ordering::SeqCst))
    }

    /// Advance the clock past `value`, for recovery replay.
    pub fn catch_up(value: u64) {
        let mut current = CLOCK.load(Ordering::SeqCst);
        while current <= value {
            match CLOCK.compare_exchange(
                current,
                value + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn is_illegal(self) -> bool {
        self == Self::ILLEGAL
    }
}
