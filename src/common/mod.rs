// # Common Types
//
// Shared identifiers, the monotonic timestamp source, named configuration
// parameters, scalar data with the null singleton, and the cooperative
// cancellation flag. Everything above the OS layer builds on these.

mod cancel;
mod config;
mod data;
mod timestamp;
mod transaction;

pub use cancel::CancelFlag;
pub use config::{set_parameter, ParameterBool, ParameterInt, ParameterU64};
pub use data::{NullData, ScalarData};
pub use timestamp::TimeStamp;
pub use transaction::{IsolationLevel, Transaction, TransactionStatus};

/// Page identifier inside one logical file.
pub type PageId = u32;

/// Identifier of a logical or physical file.
pub type FileId = u32;

/// Transaction identifier. Monotonic, assigned at begin.
pub type TransactionId = u64;

/// Session identifier, assigned by the connection layer.
pub type SessionId = u64;

/// Row identifier of a stored tuple.
pub type RowId = u32;

/// Document identifier inside an inverted index.
pub type DocumentId = u32;

/// Identifier of a schema object (database, table, column, ...).
pub type ObjectId = u64;

/// Sentinel for "no such page".
pub const INVALID_PAGE_ID: PageId = PageId::MAX;

/// Sentinel document id returned by exhausted iterators.
pub const UNDEFINED_DOCUMENT_ID: DocumentId = DocumentId::MAX;

/// Sentinel for "no such row".
pub const UNDEFINED_ROW_ID: RowId = RowId::MAX;
