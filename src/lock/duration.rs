// Lock durations.

use serde::{Deserialize, Serialize};

/// How long a granted lock is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LockDuration {
    /// Released the moment it is granted.
    Instant,
    /// Held to the end of the statement.
    Statement,
    /// Released explicitly when the cursor moves.
    Cursor,
    /// Released at transaction end.
    Middle,
    /// Released explicitly by the user, not before transaction end.
    User,
}

impl LockDuration {
    /// Alias: `Pulse` is the instant duration.
    pub const PULSE: LockDuration = LockDuration::Instant;
    /// Alias: `Short` is the cursor duration.
    pub const SHORT: LockDuration = LockDuration::Cursor;
    /// Alias: `Inside` is the transaction duration.
    pub const INSIDE: LockDuration = LockDuration::Middle;
    /// Alias: `Long` is the user duration.
    pub const LONG: LockDuration = LockDuration::User;

    /// Only cursor- and user-duration locks release before transaction end.
    pub fn is_explicitly_releasable(self) -> bool {
        matches!(self, LockDuration::Cursor | LockDuration::User)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releasable_durations() {
        assert!(LockDuration::Cursor.is_explicitly_releasable());
        assert!(LockDuration::User.is_explicitly_releasable());
        assert!(!LockDuration::Middle.is_explicitly_releasable());
        assert!(!LockDuration::Statement.is_explicitly_releasable());
        assert!(!LockDuration::Instant.is_explicitly_releasable());
    }
}
