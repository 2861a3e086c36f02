// # Index Kinds
//
// Per-kind logical files. Each specializes the logical-file framework with
// its own page layouts and entry points; the algorithms that consume them
// (query-execution trees, scoring) live in `fulltext`.

pub mod array;
pub mod bitmap;
pub mod btree;
pub mod inverted;
pub mod kdtree;
pub mod lob;
pub mod record;
pub mod vector;

pub use array::ArrayFile;
pub use bitmap::BitmapFile;
pub use btree::BtreeFile;
pub use inverted::{ExpungeIdMap, InvertedFile};
pub use kdtree::{KdEntry, KdTreeFile};
pub use lob::LobFile;
pub use record::RecordFile;
pub use vector::DocumentVectorFile;
