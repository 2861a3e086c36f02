// Buffer pool.
//
// Frames are keyed by (file, page). A fix either hits a cached frame or
// asks the caller's loader for the on-disk image; eviction considers only
// unreferenced, clean frames and prefers Low replacement priority, then
// least recent use. Dirty frames are drained per file by the version layer.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::common::{FileId, PageId};
use crate::error::{DbError, Result};

use super::frame::Frame;
use super::memory::Memory;
use super::{Deterrent, FixMode, ReplacementPriority};

/// Buffer pool configuration.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Maximum number of resident frames.
    pub capacity: usize,
    /// Page size, block header included.
    pub page_size: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            page_size: 4096,
        }
    }
}

/// Pool counters.
#[derive(Debug, Clone, Default)]
pub struct BufferPoolStats {
    pub fixes: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub flush_requests: u64,
}

struct Inner {
    frames: HashMap<(FileId, PageId), Arc<Frame>>,
    stats: BufferPoolStats,
}

pub struct BufferPool {
    config: BufferPoolConfig,
    inner: Mutex<Inner>,
    clock: AtomicU64,
    deterrent: Deterrent,
}

impl BufferPool {
    pub fn new(config: BufferPoolConfig) -> Arc<BufferPool> {
        Arc::new(BufferPool {
            config,
            inner: Mutex::new(Inner {
                frames: HashMap::new(),
                stats: BufferPoolStats::default(),
            }),
            clock: AtomicU64::new(1),
            deterrent: Deterrent::new(),
        })
    }

    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// The global flush inhibitor.
    pub fn deterrent(&self) -> &Deterrent {
        &self.deterrent
    }

    /// Fix a page. On a miss the `loader` supplies the page image (for
    /// `ALLOCATE` a zeroed image of page size).
    pub fn fix(
        self: &Arc<Self>,
        file: FileId,
        page: PageId,
        mode: FixMode,
        priority: ReplacementPriority,
        loader: impl FnOnce() -> Result<Vec<u8>>,
    ) -> Result<Memory> {
        let stamp = self.clock.fetch_add(1, Ordering::Relaxed);

        let frame = {
            let mut inner = self.inner.lock();
            inner.stats.fixes += 1;

            if let Some(frame) = inner.frames.get(&(file, page)).cloned() {
                inner.stats.hits += 1;
                frame
            } else {
                inner.stats.misses += 1;
                if inner.frames.len() >= self.config.capacity {
                    self.evict_one(&mut inner)?;
                }
                // Load outside would be nicer but the map must not hand out
                // a second frame for the same page meanwhile; fixes are
                // page-granular and loads are short.
                let image = loader()?;
                if image.len() != self.config.page_size {
                    return Err(DbError::Storage(format!(
                        "page image size {} != configured {}",
                        image.len(),
                        self.config.page_size
                    )));
                }
                let frame = Arc::new(Frame::new(file, page, image));
                inner.frames.insert((file, page), frame.clone());
                frame
            }
        };

        frame.touched.store(stamp, Ordering::Relaxed);
        *frame.priority.lock() = priority;
        frame.incr_fix();
        if mode.contains(FixMode::DISCARDABLE) {
            frame.make_discardable();
        }
        Ok(Memory::new(frame, self.clone(), mode))
    }

    fn evict_one(&self, inner: &mut Inner) -> Result<()> {
        let mut victim: Option<((FileId, PageId), u64, ReplacementPriority)> = None;
        for (key, frame) in inner.frames.iter() {
            if frame.fix_count() != 0 || frame.is_dirty() || frame.is_pending_flush() {
                continue;
            }
            let touched = frame.touched.load(Ordering::Relaxed);
            let priority = *frame.priority.lock();
            let better = match &victim {
                None => true,
                Some((_, best_touched, best_priority)) => {
                    (priority, touched) < (*best_priority, *best_touched)
                }
            };
            if better {
                victim = Some((*key, touched, priority));
            }
        }
        match victim {
            Some((key, _, _)) => {
                inner.frames.remove(&key);
                inner.stats.evictions += 1;
                trace!(file = key.0, page = key.1, "evicted frame");
                Ok(())
            }
            None => Err(DbError::BufferExhausted(format!(
                "no evictable frame among {}",
                inner.frames.len()
            ))),
        }
    }

    pub(crate) fn on_unfix(&self, frame: &Arc<Frame>) {
        frame.decr_fix();
    }

    /// Record the intent to persist. Synchronous requests mark the frame for
    /// the next drain regardless of the deterrent; asynchronous ones defer
    /// to the deterrent.
    pub(crate) fn request_flush(&self, frame: &Arc<Frame>, asynchronously: bool) {
        let mut inner = self.inner.lock();
        inner.stats.flush_requests += 1;
        drop(inner);
        if !asynchronously || !self.deterrent.is_inhibited() {
            frame.set_pending_flush(true);
        } else {
            // Deterred: the dirty bit alone keeps the frame resident until
            // the next full drain.
            trace!(file = frame.file(), page = frame.page(), "flush deterred");
        }
    }

    /// Drain every dirty frame of `file`, in page order. Clears the dirty
    /// and pending bits; the caller persists the returned frames.
    pub fn take_dirty(&self, file: FileId) -> Vec<Arc<Frame>> {
        let inner = self.inner.lock();
        let mut dirty: Vec<Arc<Frame>> = inner
            .frames
            .values()
            .filter(|f| f.file() == file && (f.is_dirty() || f.is_pending_flush()))
            .cloned()
            .collect();
        dirty.sort_by_key(|f| f.page());
        dirty
    }

    /// Forget every frame of `file` without writing anything.
    pub fn detach_file(&self, file: FileId) {
        let mut inner = self.inner.lock();
        inner.frames.retain(|(f, _), _| *f != file);
    }

    /// Forget one page of `file`.
    pub fn detach_page(&self, file: FileId, page: PageId) {
        self.inner.lock().frames.remove(&(file, page));
    }

    /// Look up a resident frame.
    pub fn find(&self, file: FileId, page: PageId) -> Option<Arc<Frame>> {
        self.inner.lock().frames.get(&(file, page)).cloned()
    }

    pub fn stats(&self) -> BufferPoolStats {
        self.inner.lock().stats.clone()
    }

    pub fn resident_count(&self) -> usize {
        self.inner.lock().frames.len()
    }
}
