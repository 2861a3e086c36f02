// # Schema Catalog
//
// The object model, the per-kind object maps, consistent snapshots handed
// to sessions, the process-wide snapshot registry advancing at every
// reorganize commit, and the name/path reservations taken during DDL
// preparation.

mod cache;
mod map;
mod object;
mod registry;
mod reservation;
mod sequence;
mod snapshot;

pub use cache::ObjectCachePressure;
pub use map::ObjectMap;
pub use object::{CatalogObject, ObjectCategory, SchemaObject};
pub use registry::SnapshotRegistry;
pub use reservation::{NameWithdraw, PathWithdraw, Reservations};
pub use sequence::ObjectIdSequence;
pub use snapshot::{DatabaseEntry, IndexEntry, ObjectSnapshot, TableEntry};
