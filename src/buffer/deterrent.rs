// Flush deterrent. While any holder keeps the deterrent started,
// asynchronous write-through requests are deferred; synchronous requests
// and the per-file drains ignore it.

use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct Deterrent {
    count: AtomicU32,
}

impl Deterrent {
    pub fn new() -> Deterrent {
        Deterrent::default()
    }

    /// Start inhibiting flushes. Nestable.
    pub fn start(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// End one inhibition.
    pub fn end(&self) {
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "deterrent end without start");
    }

    pub fn is_inhibited(&self) -> bool {
        self.count.load(Ordering::Acquire) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nests() {
        let d = Deterrent::new();
        assert!(!d.is_inhibited());
        d.start();
        d.start();
        d.end();
        assert!(d.is_inhibited());
        d.end();
        assert!(!d.is_inhibited());
    }
}
