// # Physical File Layer
//
// Page-granularity allocation on top of the version layer. Pages are grouped
// into runs of one management page followed by its data pages; the
// management page keeps an allocation bitmap for the run. The verification
// pass walks pages with `verify_page` + `notify_use_page` and compares the
// used set against the bitmaps at the end.

mod file;
mod verify;

pub use file::{PhysicalFile, PhysicalFileConfig};
pub use verify::{Treatment, VerifyProgress};
