// # Lock Model
//
// The sixteen-value mode lattice with its compatibility and least-upper-
// bound relations, lock durations, hierarchical lock names, and the
// adequacy matrix deriving (mode, duration) from what a transaction is
// doing to what.

mod duration;
mod hold;
mod mode;
mod name;

pub use duration::LockDuration;
pub use hold::{
    adequate_lock, convert_decision, hold_decision, release_decision, HoldOperation, HoldTarget,
};
pub use mode::{LockMode, Possibility};
pub use name::{LockCategory, LockName};
