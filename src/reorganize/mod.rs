// # Reorganization
//
// The dispatch table mapping each SQL statement kind to its executing
// module, transaction envelope, admissibility flags, logging discipline,
// and required privilege; and the redo/undo replay of logged DDL during
// recovery.

mod dispatch;
mod log;
mod redo;

pub use dispatch::{
    dispatch_check, entry, privilege, DispatchEntry, Module, Permission, PrivilegeCategory,
    Privileges, SessionContext, SqlKind, Tristate,
};
pub use log::DdlLog;
pub use redo::{redo, replay, undo};
