// A versioned page file: master datafile plus version log plus sync log,
// living in one directory. The master always holds the newest committed
// image of every page; overwrites that an active snapshot could still
// observe push the pre-image onto the version log first. Reads at a
// snapshot timestamp resolve against the log, then the master.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::buffer::{
    BlockHeader, BufferPool, FixMode, Memory, ReplacementPriority, BLOCK_HEADER_SIZE,
};
use crate::common::{FileId, PageId, TimeStamp};
use crate::error::{DbError, Result};

use super::snapshots::ActiveSnapshots;
use super::{MASTER_DATA, SYNC_LOG, VERSION_LOG};

/// How many pages one `sync` call sweeps before reporting incomplete.
const SYNC_BATCH: usize = 128;

#[derive(Debug, Clone)]
pub struct VersionFileConfig {
    pub file_id: FileId,
    pub page_size: usize,
    pub path: PathBuf,
    pub read_only: bool,
    /// Temporary files carry no version or sync log.
    pub temporary: bool,
}

/// Result of one `sync` sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// More work remains; call again.
    pub incomplete: bool,
    /// The sweep dropped at least one version.
    pub modified: bool,
}

struct State {
    path: PathBuf,
    mounted: bool,
    master: Option<File>,
    version_log: Option<File>,
    sync_log: Option<File>,
    /// page -> (timestamp, offset of the image inside the version log),
    /// sorted by timestamp.
    versions: HashMap<PageId, Vec<(u64, u64)>>,
    version_log_len: u64,
    page_count: u32,
    verifying: bool,
    sync_cursor: u32,
}

pub struct VersionFile {
    config: VersionFileConfig,
    pool: Arc<BufferPool>,
    snapshots: Arc<ActiveSnapshots>,
    state: Mutex<State>,
}

impl VersionFile {
    pub fn new(
        config: VersionFileConfig,
        pool: Arc<BufferPool>,
        snapshots: Arc<ActiveSnapshots>,
    ) -> Result<VersionFile> {
        if config.page_size != pool.page_size() {
            return Err(DbError::InvalidArgument(format!(
                "page size {} does not match pool page size {}",
                config.page_size,
                pool.page_size()
            )));
        }
        if !config.page_size.is_power_of_two() || config.page_size < 64 {
            return Err(DbError::InvalidArgument(format!(
                "invalid page size {}",
                config.page_size
            )));
        }
        let path = config.path.clone();
        Ok(VersionFile {
            config,
            pool,
            snapshots,
            state: Mutex::new(State {
                path,
                mounted: false,
                master: None,
                version_log: None,
                sync_log: None,
                versions: HashMap::new(),
                version_log_len: 0,
                page_count: 0,
                verifying: false,
                sync_cursor: 0,
            }),
        })
    }

    pub fn file_id(&self) -> FileId {
        self.config.file_id
    }

    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    pub fn path(&self) -> PathBuf {
        self.state.lock().path.clone()
    }

    pub fn page_count(&self) -> u32 {
        self.state.lock().page_count
    }

    pub fn is_mounted(&self) -> bool {
        self.state.lock().mounted
    }

    /// False once the backing directory is gone, e.g. after recovery
    /// dropped the file.
    pub fn is_accessible(&self) -> bool {
        self.state.lock().path.join(MASTER_DATA).exists()
    }

    /// Create the directory and the three files. On failure the directory
    /// is removed again.
    pub fn create(&self) -> Result<()> {
        let state = self.state.lock();
        let result = (|| -> Result<()> {
            fs::create_dir_all(&state.path)?;
            File::create(state.path.join(MASTER_DATA))?;
            if !self.config.temporary {
                File::create(state.path.join(VERSION_LOG))?;
                File::create(state.path.join(SYNC_LOG))?;
            }
            Ok(())
        })();
        if result.is_err() {
            let _ = fs::remove_dir_all(&state.path);
        }
        result
    }

    /// Remove the directory and everything in it.
    pub fn destroy(&self) -> Result<()> {
        self.pool.detach_file(self.config.file_id);
        let mut state = self.state.lock();
        state.mounted = false;
        state.master = None;
        state.version_log = None;
        state.sync_log = None;
        if state.path.exists() {
            fs::remove_dir_all(&state.path)?;
        }
        Ok(())
    }

    /// Open the files and rebuild the version index from the log.
    pub fn mount(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.mounted {
            return Ok(());
        }
        let mut options = OpenOptions::new();
        options.read(true).write(!self.config.read_only);

        let master = options.open(state.path.join(MASTER_DATA))?;
        let len = master.metadata()?.len();
        state.page_count = (len / self.config.page_size as u64) as u32;
        state.master = Some(master);

        if !self.config.temporary {
            let version_log = options.open(state.path.join(VERSION_LOG))?;
            state.version_log_len = version_log.metadata()?.len();
            state.version_log = Some(version_log);
            state.sync_log = Some(options.open(state.path.join(SYNC_LOG))?);
            self.rebuild_version_index(&mut state)?;
        }
        state.mounted = true;
        Ok(())
    }

    pub fn unmount(&self) -> Result<()> {
        self.flush_all_pages()?;
        self.pool.detach_file(self.config.file_id);
        let mut state = self.state.lock();
        state.mounted = false;
        state.master = None;
        state.version_log = None;
        state.sync_log = None;
        state.versions.clear();
        Ok(())
    }

    /// Move the directory. The three files are staged into a sibling of the
    /// destination and committed with a single rename, so a failure leaves
    /// either the old or the new tree complete.
    pub fn move_to(&self, new_path: &Path) -> Result<()> {
        let mut state = self.state.lock();
        if state.path == new_path {
            return Ok(());
        }
        if new_path.exists() {
            return Err(DbError::AlreadyExists(new_path.display().to_string()));
        }
        let was_mounted = state.mounted;
        state.master = None;
        state.version_log = None;
        state.sync_log = None;
        state.mounted = false;

        let staging = new_path.with_extension("mv");
        let result = (|| -> Result<()> {
            fs::create_dir_all(&staging)?;
            fs::copy(state.path.join(MASTER_DATA), staging.join(MASTER_DATA))?;
            if !self.config.temporary {
                fs::copy(state.path.join(VERSION_LOG), staging.join(VERSION_LOG))?;
                fs::copy(state.path.join(SYNC_LOG), staging.join(SYNC_LOG))?;
            }
            fs::rename(&staging, new_path)?;
            Ok(())
        })();
        match result {
            Ok(()) => {
                let old = std::mem::replace(&mut state.path, new_path.to_path_buf());
                if let Err(e) = fs::remove_dir_all(&old) {
                    warn!(path = %old.display(), error = %e, "old directory left behind");
                }
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                drop(state);
                if was_mounted {
                    self.mount()?;
                }
                return Err(e);
            }
        }
        drop(state);
        if was_mounted {
            self.mount()?;
        }
        Ok(())
    }

    /// Fix a page of the current version through the buffer pool.
    pub fn fix(
        self: &Arc<Self>,
        page: PageId,
        mode: FixMode,
        priority: ReplacementPriority,
    ) -> Result<Memory> {
        let this = self.clone();
        self.pool.fix(self.config.file_id, page, mode, priority, move || {
            this.load_image(page, mode)
        })
    }

    fn load_image(&self, page: PageId, mode: FixMode) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        if !state.mounted {
            return Err(DbError::InvalidState("file is not mounted".into()));
        }
        if page >= state.page_count {
            if !mode.contains(FixMode::ALLOCATE) {
                return Err(DbError::PageNotFound(format!(
                    "page {page} beyond {}",
                    state.page_count
                )));
            }
            self.extend_to(&mut state, page + 1)?;
            return Ok(vec![0u8; self.config.page_size]);
        }
        let image = self.read_master(&state, page)?;
        self.validate(page, &image)?;
        Ok(image)
    }

    fn extend_to(&self, state: &mut State, page_count: u32) -> Result<()> {
        let master = state
            .master
            .as_mut()
            .ok_or_else(|| DbError::InvalidState("file is not mounted".into()))?;
        master.set_len(page_count as u64 * self.config.page_size as u64)?;
        state.page_count = page_count;
        Ok(())
    }

    fn read_master(&self, state: &State, page: PageId) -> Result<Vec<u8>> {
        let mut master = state
            .master
            .as_ref()
            .ok_or_else(|| DbError::InvalidState("file is not mounted".into()))?;
        let mut image = vec![0u8; self.config.page_size];
        master.seek(SeekFrom::Start(page as u64 * self.config.page_size as u64))?;
        master.read_exact(&mut image)?;
        Ok(image)
    }

    fn validate(&self, page: PageId, image: &[u8]) -> Result<()> {
        let header = BlockHeader::read_from(image);
        if header.last_modification == 0 {
            return Ok(());
        }
        let computed = crc32fast::hash(&image[BLOCK_HEADER_SIZE..]);
        if computed != header.checksum {
            return Err(DbError::Corruption(format!(
                "checksum mismatch on page {page} of file {}",
                self.config.file_id
            )));
        }
        Ok(())
    }

    /// Read the content a snapshot at `t` observes. Pages unallocated at `t`
    /// read as zeroes.
    pub fn read_version(&self, page: PageId, t: TimeStamp) -> Result<Vec<u8>> {
        let state = self.state.lock();
        if !state.mounted {
            return Err(DbError::InvalidState("file is not mounted".into()));
        }
        if let Some(entries) = state.versions.get(&page) {
            if let Some(&(_, offset)) = entries
                .iter()
                .rev()
                .find(|(ts, _)| TimeStamp(*ts) <= t)
            {
                let image = self.read_log_image(&state, offset)?;
                self.validate(page, &image)?;
                return Ok(image[BLOCK_HEADER_SIZE..].to_vec());
            }
        }
        if page < state.page_count {
            let image = self.read_master(&state, page)?;
            let header = BlockHeader::read_from(&image);
            if TimeStamp(header.last_modification) <= t {
                self.validate(page, &image)?;
                return Ok(image[BLOCK_HEADER_SIZE..].to_vec());
            }
        }
        Ok(vec![0u8; self.config.page_size - BLOCK_HEADER_SIZE])
    }

    fn read_log_image(&self, state: &State, offset: u64) -> Result<Vec<u8>> {
        let mut log = state
            .version_log
            .as_ref()
            .ok_or_else(|| DbError::InvalidState("no version log".into()))?;
        let mut image = vec![0u8; self.config.page_size];
        log.seek(SeekFrom::Start(offset))?;
        log.read_exact(&mut image)?;
        Ok(image)
    }

    fn rebuild_version_index(&self, state: &mut State) -> Result<()> {
        state.versions.clear();
        let record = 4 + self.config.page_size as u64;
        let count = state.version_log_len / record;
        for i in 0..count {
            let offset = i * record;
            let mut log = state.version_log.as_ref().unwrap();
            let mut id_buf = [0u8; 4];
            log.seek(SeekFrom::Start(offset))?;
            log.read_exact(&mut id_buf)?;
            let page = PageId::from_le_bytes(id_buf);
            let image_offset = offset + 4;
            let mut header_buf = vec![0u8; BLOCK_HEADER_SIZE];
            log.read_exact(&mut header_buf)?;
            let header = BlockHeader::read_from(&header_buf);
            state
                .versions
                .entry(page)
                .or_default()
                .push((header.last_modification, image_offset));
        }
        for entries in state.versions.values_mut() {
            entries.sort_by_key(|(ts, _)| *ts);
        }
        Ok(())
    }

    /// Write every dirty frame of this file back to the master, pushing
    /// pre-images an active snapshot could observe onto the version log.
    pub fn flush_all_pages(&self) -> Result<()> {
        let dirty = self.pool.take_dirty(self.config.file_id);
        if dirty.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock();
        if !state.mounted {
            return Ok(());
        }
        for frame in dirty {
            if frame.fix_count() != 0 {
                continue;
            }
            let page = frame.page();
            if !self.config.temporary && page < state.page_count {
                let old = self.read_master(&state, page)?;
                let old_header = BlockHeader::read_from(&old);
                if old_header.last_modification != 0
                    && self
                        .snapshots
                        .observes_at_or_after(TimeStamp(old_header.last_modification))
                {
                    self.append_version(&mut state, page, &old)?;
                }
            }
            let mut image = frame.data.read().clone();
            let mut header = BlockHeader::read_from(&image);
            header.checksum = crc32fast::hash(&image[BLOCK_HEADER_SIZE..]);
            header.write_to(&mut image);
            {
                let master = state.master.as_mut().unwrap();
                master.seek(SeekFrom::Start(
                    page as u64 * self.config.page_size as u64,
                ))?;
                master.write_all(&image)?;
            }
            frame.set_dirty(false);
            frame.set_pending_flush(false);
            frame.settle();
        }
        state.master.as_mut().unwrap().sync_data()?;
        Ok(())
    }

    fn append_version(&self, state: &mut State, page: PageId, image: &[u8]) -> Result<()> {
        let header = BlockHeader::read_from(image);
        let offset = state.version_log_len;
        {
            let log = state.version_log.as_mut().unwrap();
            log.seek(SeekFrom::Start(offset))?;
            log.write_all(&page.to_le_bytes())?;
            log.write_all(image)?;
        }
        state.version_log_len = offset + 4 + self.config.page_size as u64;
        state
            .versions
            .entry(page)
            .or_default()
            .push((header.last_modification, offset + 4));
        Ok(())
    }

    /// Forget all resident frames of this file without writing them.
    pub fn detach_page_all(&self) {
        self.pool.detach_file(self.config.file_id);
    }

    /// Undo the in-memory modifications of a resident discardable frame; a
    /// frame with no pre-image is dropped so the next fix rereads the
    /// master.
    pub fn recover_resident(&self, page: PageId) {
        if let Some(frame) = self.pool.find(self.config.file_id, page) {
            if !frame.recover() {
                self.pool.detach_page(self.config.file_id, page);
            }
        }
    }

    /// Bring every master page back to its state at `checkpoint` and clear
    /// the version log.
    pub fn recover(&self, checkpoint: TimeStamp) -> Result<()> {
        self.pool.detach_file(self.config.file_id);
        let mut state = self.state.lock();
        self.rewind_master(&mut state, checkpoint)?;
        state.versions.clear();
        state.version_log_len = 0;
        if let Some(log) = state.version_log.as_mut() {
            log.set_len(0)?;
        }
        debug!(file = self.config.file_id, checkpoint = checkpoint.0, "recovered");
        Ok(())
    }

    /// Make the versions observed at `checkpoint` the newest, keeping the
    /// version log for still-running snapshot readers.
    pub fn restore(&self, checkpoint: TimeStamp) -> Result<()> {
        self.pool.detach_file(self.config.file_id);
        let mut state = self.state.lock();
        self.rewind_master(&mut state, checkpoint)?;
        Ok(())
    }

    fn rewind_master(&self, state: &mut State, checkpoint: TimeStamp) -> Result<()> {
        if !state.mounted {
            return Err(DbError::InvalidState("file is not mounted".into()));
        }
        let mut newest_seen = 0u64;
        for page in 0..state.page_count {
            let image = self.read_master(state, page)?;
            let header = BlockHeader::read_from(&image);
            newest_seen = newest_seen.max(header.last_modification);
            if TimeStamp(header.last_modification) <= checkpoint {
                continue;
            }
            let replacement = match state.versions.get(&page).and_then(|entries| {
                entries
                    .iter()
                    .rev()
                    .find(|(ts, _)| TimeStamp(*ts) <= checkpoint)
                    .copied()
            }) {
                Some((_, offset)) => self.read_log_image(state, offset)?,
                // The page did not exist at the checkpoint.
                None => vec![0u8; self.config.page_size],
            };
            let master = state.master.as_mut().unwrap();
            master.seek(SeekFrom::Start(
                page as u64 * self.config.page_size as u64,
            ))?;
            master.write_all(&replacement)?;
        }
        state.master.as_mut().unwrap().sync_data()?;
        crate::common::TimeStamp::catch_up(newest_seen);
        Ok(())
    }

    /// Reclaim versions no active snapshot can observe. Sweeps a bounded
    /// batch of pages per call and records its cursor in the sync log, so an
    /// interrupted sweep resumes where it stopped.
    pub fn sync(&self) -> Result<SyncOutcome> {
        let horizon = self.snapshots.oldest();
        let mut state = self.state.lock();
        if !state.mounted || state.versions.is_empty() {
            state.sync_cursor = 0;
            return Ok(SyncOutcome {
                incomplete: false,
                modified: false,
            });
        }

        let start = state.sync_cursor;
        let end = (start as usize + SYNC_BATCH).min(state.page_count as usize) as u32;
        let mut modified = false;
        for page in start..end {
            let Some(entries) = state.versions.get_mut(&page) else {
                continue;
            };
            let before = entries.len();
            match horizon {
                None => entries.clear(),
                Some(h) => {
                    // Keep everything newer than the horizon plus the newest
                    // entry at or below it.
                    let split = entries.partition_point(|(ts, _)| TimeStamp(*ts) <= h);
                    if split > 1 {
                        entries.drain(..split - 1);
                    }
                }
            }
            if entries.len() != before {
                modified = true;
            }
            if entries.is_empty() {
                state.versions.remove(&page);
            }
        }

        let incomplete = end < state.page_count;
        state.sync_cursor = if incomplete { end } else { 0 };

        if !incomplete && modified {
            self.compact_version_log(&mut state)?;
        }
        self.write_sync_mark(&mut state, horizon)?;
        Ok(SyncOutcome {
            incomplete,
            modified,
        })
    }

    fn compact_version_log(&self, state: &mut State) -> Result<()> {
        let mut kept: Vec<(PageId, Vec<u8>)> = Vec::new();
        for (&page, entries) in state.versions.iter() {
            for &(_, offset) in entries {
                kept.push((page, self.read_log_image(state, offset)?));
            }
        }
        {
            let log = state.version_log.as_mut().unwrap();
            log.set_len(0)?;
            log.seek(SeekFrom::Start(0))?;
        }
        state.version_log_len = 0;
        state.versions.clear();
        for (page, image) in kept {
            self.append_version(state, page, &image)?;
        }
        Ok(())
    }

    fn write_sync_mark(&self, state: &mut State, horizon: Option<TimeStamp>) -> Result<()> {
        let cursor = state.sync_cursor;
        if let Some(log) = state.sync_log.as_mut() {
            log.seek(SeekFrom::Start(0))?;
            log.write_all(&cursor.to_le_bytes())?;
            log.write_all(&horizon.map_or(0, |t| t.0).to_le_bytes())?;
        }
        Ok(())
    }

    /// Drop every page at or beyond `first_free_page_id`.
    pub fn truncate(&self, first_free_page_id: PageId) -> Result<()> {
        let old_count = self.page_count();
        if first_free_page_id >= old_count {
            return Ok(());
        }
        for page in first_free_page_id..old_count {
            self.pool.detach_page(self.config.file_id, page);
        }
        let mut state = self.state.lock();
        for page in first_free_page_id..old_count {
            state.versions.remove(&page);
        }
        self.extend_to(&mut state, first_free_page_id)?;
        Ok(())
    }

    /// Begin a verification pass.
    pub fn start_verification(&self) {
        self.state.lock().verifying = true;
    }

    /// Validate the stored image of `page`.
    pub fn verify_page(&self, page: PageId) -> Result<()> {
        let state = self.state.lock();
        if page >= state.page_count {
            return Err(DbError::Corruption(format!(
                "page {page} beyond file end {}",
                state.page_count
            )));
        }
        let image = self.read_master(&state, page)?;
        self.validate(page, &image)
    }

    pub fn end_verification(&self) {
        self.state.lock().verifying = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPoolConfig;
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (Arc<VersionFile>, Arc<ActiveSnapshots>) {
        let pool = BufferPool::new(BufferPoolConfig {
            capacity: 16,
            page_size: 256,
        });
        let snapshots = ActiveSnapshots::new();
        let file = Arc::new(
            VersionFile::new(
                VersionFileConfig {
                    file_id: 1,
                    page_size: 256,
                    path: dir.path().join("f"),
                    read_only: false,
                    temporary: false,
                },
                pool,
                snapshots.clone(),
            )
            .unwrap(),
        );
        file.create().unwrap();
        file.mount().unwrap();
        (file, snapshots)
    }

    fn write_page(file: &Arc<VersionFile>, page: PageId, fill: &[u8]) {
        let mut m = file
            .fix(
                page,
                FixMode::ALLOCATE | FixMode::WRITE,
                ReplacementPriority::Middle,
            )
            .unwrap();
        m.content_mut()[..fill.len()].copy_from_slice(fill);
        m.unfix(true, true);
        file.flush_all_pages().unwrap();
    }

    #[test]
    fn write_reopen_read() {
        let dir = TempDir::new().unwrap();
        let (file, _) = setup(&dir);
        write_page(&file, 0, b"hello");
        file.unmount().unwrap();
        file.mount().unwrap();
        let m = file
            .fix(0, FixMode::READ_ONLY, ReplacementPriority::Middle)
            .unwrap();
        assert_eq!(&m.content()[..5], b"hello");
    }

    #[test]
    fn snapshot_reader_keeps_old_version() {
        let dir = TempDir::new().unwrap();
        let (file, snapshots) = setup(&dir);
        write_page(&file, 10, b"v0");

        // A reader starts now; a later write must not change what it sees.
        let guard = snapshots.register(TimeStamp::assign());
        write_page(&file, 10, b"v1");

        let seen = file.read_version(10, guard.timestamp()).unwrap();
        assert_eq!(&seen[..2], b"v0");

        // A reader after the second write sees it.
        let now = TimeStamp::assign();
        let seen = file.read_version(10, now).unwrap();
        assert_eq!(&seen[..2], b"v1");
    }

    #[test]
    fn snapshot_before_allocation_reads_zeroes() {
        let dir = TempDir::new().unwrap();
        let (file, _) = setup(&dir);
        let before = TimeStamp::assign();
        write_page(&file, 3, b"xx");
        let seen = file.read_version(3, before).unwrap();
        assert!(seen.iter().all(|&b| b == 0));
    }

    #[test]
    fn recover_rewinds_to_checkpoint() {
        let dir = TempDir::new().unwrap();
        let (file, snapshots) = setup(&dir);
        write_page(&file, 0, b"aa");
        let checkpoint = TimeStamp::assign();
        // Keep a snapshot alive so the overwrite versions the pre-image.
        let _guard = snapshots.register(checkpoint);
        write_page(&file, 0, b"bb");
        file.recover(checkpoint).unwrap();
        let m = file
            .fix(0, FixMode::READ_ONLY, ReplacementPriority::Middle)
            .unwrap();
        assert_eq!(&m.content()[..2], b"aa");
    }

    #[test]
    fn sync_reclaims_unobservable_versions() {
        let dir = TempDir::new().unwrap();
        let (file, snapshots) = setup(&dir);
        write_page(&file, 0, b"aa");
        {
            let _guard = snapshots.register(TimeStamp::assign());
            write_page(&file, 0, b"bb");
        }
        // No readers left: everything in the log is reclaimable.
        let outcome = file.sync().unwrap();
        assert!(!outcome.incomplete);
        assert!(outcome.modified);
        let again = file.sync().unwrap();
        assert!(!again.modified);
    }

    #[test]
    fn move_is_atomic_and_keeps_content() {
        let dir = TempDir::new().unwrap();
        let (file, _) = setup(&dir);
        write_page(&file, 0, b"kept");
        let dest = dir.path().join("g");
        file.move_to(&dest).unwrap();
        assert_eq!(file.path(), dest);
        let m = file
            .fix(0, FixMode::READ_ONLY, ReplacementPriority::Middle)
            .unwrap();
        assert_eq!(&m.content()[..4], b"kept");
    }

    #[test]
    fn truncate_drops_tail_pages() {
        let dir = TempDir::new().unwrap();
        let (file, _) = setup(&dir);
        write_page(&file, 0, b"a");
        write_page(&file, 1, b"b");
        write_page(&file, 2, b"c");
        file.truncate(1).unwrap();
        assert_eq!(file.page_count(), 1);
        assert!(file
            .fix(2, FixMode::READ_ONLY, ReplacementPriority::Middle)
            .is_err());
    }
}
