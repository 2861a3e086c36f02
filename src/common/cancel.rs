use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{DbError, Result};

/// Cooperative cancellation flag carried by a transaction.
///
/// Long operations (verify, sync, index scans) poll this periodically and
/// unwind with `DbError::Cancelled` when it is raised; in-flight page fixes
/// are released by their guards on the way out.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    raised: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Return `Err(Cancelled)` if the flag has been raised.
    pub fn check(&self) -> Result<()> {
        if self.is_raised() {
            Err(DbError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_after_raise() {
        let flag = CancelFlag::new();
        assert!(flag.check().is_ok());
        flag.raise();
        assert!(matches!(flag.check(), Err(DbError::Cancelled)));
    }
}
