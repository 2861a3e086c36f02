// The fix guard. Holding a `Memory` keeps the frame fixed; dropping it
// unfixes with whatever dirty state accumulated through the guard. Explicit
// `unfix` variants control the stamped timestamp and write-through urgency.

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

use crate::common::TimeStamp;

use super::frame::{Frame, BLOCK_HEADER_SIZE};
use super::pool::BufferPool;
use super::FixMode;

/// A reference-counted, optionally mutable view of a fixed page.
pub struct Memory {
    frame: Arc<Frame>,
    pool: Arc<BufferPool>,
    mode: FixMode,
    /// Dirty bit accumulated through this guard, ORed into the frame.
    dirtied: bool,
    released: bool,
}

impl Memory {
    pub(crate) fn new(frame: Arc<Frame>, pool: Arc<BufferPool>, mode: FixMode) -> Memory {
        Memory {
            frame,
            pool,
            mode,
            dirtied: false,
            released: false,
        }
    }

    pub fn fix_mode(&self) -> FixMode {
        self.mode
    }

    pub fn last_modification(&self) -> TimeStamp {
        self.frame.last_modification()
    }

    /// Size of the content area (page size minus the block header).
    pub fn content_size(&self) -> usize {
        self.frame.data.read().len() - BLOCK_HEADER_SIZE
    }

    /// Read view of the page content.
    pub fn content(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.frame.data.read(), |d| &d[BLOCK_HEADER_SIZE..])
    }

    /// Mutable view of the page content. Marks the frame dirty.
    pub fn content_mut(&mut self) -> MappedRwLockWriteGuard<'_, [u8]> {
        debug_assert!(self.mode.is_writable(), "write through a read-only fix");
        self.dirtied = true;
        self.frame.set_dirty(true);
        RwLockWriteGuard::map(self.frame.data.write(), |d| {
            &mut d[BLOCK_HEADER_SIZE..]
        })
    }

    /// Mark the current modifications undoable-no-more and stamp a fresh
    /// timestamp.
    pub fn touch(&mut self, dirty: bool) {
        if dirty || self.frame.is_dirty() {
            self.frame.stamp(TimeStamp::assign());
            self.frame.settle();
        }
    }

    /// Permit rollback of subsequent writes through this fix.
    pub fn discardable(&mut self) {
        if self.frame.is_dirty() {
            self.frame.stamp(TimeStamp::assign());
        }
        self.frame.make_discardable();
    }

    /// Release the fix. The dirty flag is ORed with the internally tracked
    /// bit; a dirty release stamps a fresh timestamp and records the intent
    /// to persist (asynchronously unless forced).
    pub fn unfix(mut self, dirty: bool, asynchronously: bool) {
        self.release(dirty, None, asynchronously);
    }

    /// Release the fix, forcing the caller-supplied modification timestamp.
    pub fn unfix_at(mut self, t: TimeStamp, asynchronously: bool) {
        self.release(true, Some(t), asynchronously);
    }

    /// Release the fix without recording any write-through intent, for
    /// frames whose content was just rolled back or discarded.
    pub fn unfix_discard(mut self) {
        if !self.released {
            self.released = true;
            self.pool.on_unfix(&self.frame);
        }
    }

    pub fn is_discardable(&self) -> bool {
        self.frame.is_discardable()
    }

    fn release(&mut self, dirty: bool, at: Option<TimeStamp>, asynchronously: bool) {
        if self.released {
            return;
        }
        self.released = true;

        let dirty = dirty || self.dirtied || self.frame.is_dirty();
        if dirty {
            let t = at.unwrap_or_else(TimeStamp::assign);
            self.frame.stamp(t);
            self.frame.set_dirty(true);
            self.pool.request_flush(&self.frame, asynchronously);
        }
        self.pool.on_unfix(&self.frame);
    }
}

impl Drop for Memory {
    fn drop(&mut self) {
        // RAII release for unwinding paths; accumulated writes stay dirty.
        self.release(false, None, true);
    }
}
