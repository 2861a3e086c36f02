// Object-cache pressure: a counter of catalog objects held in memory,
// checked against the configured ceiling so outer code can trim older
// snapshots.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::common::ParameterInt;

static OBJECT_CACHE_SIZE: ParameterInt =
    ParameterInt::new("Schema_ObjectCacheSize", i64::MAX);

#[derive(Debug, Default)]
pub struct ObjectCachePressure {
    current: AtomicUsize,
}

impl ObjectCachePressure {
    pub fn new() -> ObjectCachePressure {
        ObjectCachePressure::default()
    }

    pub fn add(&self, count: usize) {
        self.current.fetch_add(count, Ordering::AcqRel);
    }

    pub fn sub(&self, count: usize) {
        let mut observed = self.current.load(Ordering::Acquire);
        loop {
            let next = observed.saturating_sub(count);
            match self.current.compare_exchange(
                observed,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(value) => observed = value,
            }
        }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// True when older snapshots should be trimmed.
    pub fn exceeds_limit(&self) -> bool {
        self.current() as i64 > OBJECT_CACHE_SIZE.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_saturates_at_zero() {
        let pressure = ObjectCachePressure::new();
        pressure.add(3);
        pressure.sub(5);
        assert_eq!(pressure.current(), 0);
    }
}
