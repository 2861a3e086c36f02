// A buffer frame holds one page image (block header + content) together
// with the bookkeeping the pool and the version layer need: fix count,
// dirty and pending-flush bits, the discardable undo image, and the
// last-modification timestamp mirrored from the block header.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::common::{FileId, PageId, TimeStamp};

use super::ReplacementPriority;

/// Size of the on-disk block header at the start of every page.
pub const BLOCK_HEADER_SIZE: usize = 16;

/// On-disk block header. 16-byte aligned, little-endian fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, align(16))]
pub struct BlockHeader {
    /// Timestamp of the last modification, for version validation.
    pub last_modification: u64,
    /// CRC of the page content.
    pub checksum: u32,
    /// Reserved flag bits.
    pub flags: u32,
}

impl BlockHeader {
    pub fn read_from(page: &[u8]) -> BlockHeader {
        debug_assert!(page.len() >= BLOCK_HEADER_SIZE);
        BlockHeader {
            last_modification: u64::from_le_bytes(page[0..8].try_into().unwrap()),
            checksum: u32::from_le_bytes(page[8..12].try_into().unwrap()),
            flags: u32::from_le_bytes(page[12..16].try_into().unwrap()),
        }
    }

    pub fn write_to(&self, page: &mut [u8]) {
        debug_assert!(page.len() >= BLOCK_HEADER_SIZE);
        page[0..8].copy_from_slice(&self.last_modification.to_le_bytes());
        page[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        page[12..16].copy_from_slice(&self.flags.to_le_bytes());
    }
}

/// One cached page.
pub struct Frame {
    file: FileId,
    page: PageId,
    /// Full page image, block header included.
    pub(crate) data: RwLock<Vec<u8>>,
    dirty: AtomicBool,
    pending_flush: AtomicBool,
    discardable: AtomicBool,
    /// Pre-image captured when the frame became discardable; restored by
    /// `recover`, dropped by `touch`.
    undo: Mutex<Option<Vec<u8>>>,
    fix_count: AtomicU32,
    last_modification: AtomicU64,
    /// Recency stamp maintained by the pool.
    pub(crate) touched: AtomicU64,
    pub(crate) priority: Mutex<ReplacementPriority>,
}

impl Frame {
    pub fn new(file: FileId, page: PageId, data: Vec<u8>) -> Frame {
        let header = BlockHeader::read_from(&data);
        Frame {
            file,
            page,
            data: RwLock::new(data),
            dirty: AtomicBool::new(false),
            pending_flush: AtomicBool::new(false),
            discardable: AtomicBool::new(false),
            undo: Mutex::new(None),
            fix_count: AtomicU32::new(0),
            last_modification: AtomicU64::new(header.last_modification),
            touched: AtomicU64::new(0),
            priority: Mutex::new(ReplacementPriority::Middle),
        }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, value: bool) {
        self.dirty.store(value, Ordering::Release);
    }

    pub fn is_pending_flush(&self) -> bool {
        self.pending_flush.load(Ordering::Acquire)
    }

    pub fn set_pending_flush(&self, value: bool) {
        self.pending_flush.store(value, Ordering::Release);
    }

    pub fn is_discardable(&self) -> bool {
        self.discardable.load(Ordering::Acquire)
    }

    pub fn fix_count(&self) -> u32 {
        self.fix_count.load(Ordering::Acquire)
    }

    pub(crate) fn incr_fix(&self) {
        self.fix_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn decr_fix(&self) {
        let prev = self.fix_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0);
    }

    pub fn last_modification(&self) -> TimeStamp {
        TimeStamp(self.last_modification.load(Ordering::Acquire))
    }

    /// Stamp a modification timestamp into the in-memory block header.
    pub fn stamp(&self, t: TimeStamp) {
        self.last_modification.store(t.0, Ordering::Release);
        let mut data = self.data.write();
        let mut header = BlockHeader::read_from(&data);
        header.last_modification = t.0;
        header.write_to(&mut data);
    }

    /// Make subsequent modifications undoable: capture the current image.
    pub fn make_discardable(&self) {
        if !self.is_discardable() {
            let image = self.data.read().clone();
            *self.undo.lock() = Some(image);
            self.discardable.store(true, Ordering::Release);
        }
    }

    /// Commit the accumulated modifications: the pre-image is dropped and
    /// can no longer be restored.
    pub fn settle(&self) {
        if self.is_discardable() {
            if let Some(undo) = self.undo.lock().as_mut() {
                undo.copy_from_slice(&self.data.read());
            }
        }
    }

    /// Roll the frame back to the captured pre-image. Returns true if a
    /// pre-image existed.
    pub fn recover(&self) -> bool {
        match self.undo.lock().as_ref() {
            Some(image) => {
                let mut data = self.data.write();
                data.copy_from_slice(image);
                let header = BlockHeader::read_from(&data);
                self.last_modification
                    .store(header.last_modification, Ordering::Release);
                self.dirty.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }
}
