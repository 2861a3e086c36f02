// Physical file: allocation bookkeeping over a version file.
//
// Layout: page ids are divided into runs of `1 + bits_per_page` pages. The
// first page of each run is a management page whose content is an
// allocation bitmap for the run's data pages. Management pages never leave
// this layer; callers only see data page ids.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::buffer::{FixMode, Memory, ReplacementPriority, BLOCK_HEADER_SIZE};
use crate::common::{PageId, TimeStamp, Transaction};
use crate::error::{DbError, Result};
use crate::version::{SyncOutcome, VersionFile};

use super::verify::{Treatment, VerifyProgress};

#[derive(Debug, Clone)]
pub struct PhysicalFileConfig {
    /// Replacement priority for pages fixed through this file.
    pub priority: ReplacementPriority,
}

impl Default for PhysicalFileConfig {
    fn default() -> Self {
        Self {
            priority: ReplacementPriority::Middle,
        }
    }
}

struct Verification {
    treatment: Treatment,
    used: HashSet<PageId>,
}

pub struct PhysicalFile {
    version: Arc<VersionFile>,
    config: PhysicalFileConfig,
    verification: Mutex<Option<Verification>>,
}

impl PhysicalFile {
    pub fn new(version: Arc<VersionFile>, config: PhysicalFileConfig) -> PhysicalFile {
        PhysicalFile {
            version,
            config,
            verification: Mutex::new(None),
        }
    }

    /// Data-page bits per management page.
    fn bits_per_page(&self) -> u32 {
        ((self.version.page_size() - BLOCK_HEADER_SIZE) * 8) as u32
    }

    fn run_len(&self) -> u32 {
        self.bits_per_page() + 1
    }

    fn management_page_of(&self, page: PageId) -> PageId {
        page - (page % self.run_len())
    }

    fn is_management_page(&self, page: PageId) -> bool {
        page % self.run_len() == 0
    }

    pub fn version_file(&self) -> &Arc<VersionFile> {
        &self.version
    }

    pub fn create(&self, _trans: &Transaction) -> Result<()> {
        self.version.create()?;
        self.version.mount()?;
        // Materialize the first management page.
        let m = self.version.fix(
            0,
            FixMode::ALLOCATE | FixMode::WRITE,
            self.config.priority,
        )?;
        m.unfix(true, false);
        self.version.flush_all_pages()
    }

    pub fn destroy(&self, _trans: &Transaction) -> Result<()> {
        self.version.destroy()
    }

    pub fn mount(&self, _trans: &Transaction) -> Result<()> {
        self.version.mount()
    }

    pub fn unmount(&self, _trans: &Transaction) -> Result<()> {
        self.version.unmount()
    }

    pub fn is_mounted(&self) -> bool {
        self.version.is_mounted()
    }

    pub fn is_accessible(&self) -> bool {
        self.version.is_accessible()
    }

    pub fn move_to(&self, _trans: &Transaction, new_path: &Path) -> Result<()> {
        self.version.move_to(new_path)
    }

    /// Allocate a data page: first clear bit across the management pages,
    /// extending the file with a new run when every run is full.
    pub fn allocate_page(&self, trans: &Transaction) -> Result<PageId> {
        let run_len = self.run_len();
        let mut run = 0u32;
        loop {
            trans.check_cancel()?;
            let management = run * run_len;
            let beyond = management >= self.version.page_count();
            let mut m = self.version.fix(
                management,
                if beyond {
                    FixMode::ALLOCATE | FixMode::WRITE
                } else {
                    FixMode::WRITE
                },
                self.config.priority,
            )?;
            let slot = {
                let content = m.content();
                content
                    .iter()
                    .enumerate()
                    .find(|(_, &b)| b != 0xff)
                    .map(|(i, &b)| (i, (!b).trailing_zeros() as usize))
            };
            if let Some((byte, bit)) = slot {
                m.content_mut()[byte] |= 1 << bit;
                m.unfix(true, true);
                let page = management + 1 + (byte * 8 + bit) as u32;
                // Materialize the data page.
                let data = self.version.fix(
                    page,
                    FixMode::ALLOCATE | FixMode::WRITE,
                    self.config.priority,
                )?;
                data.unfix(true, true);
                debug!(file = self.version.file_id(), page, "allocated page");
                return Ok(page);
            }
            m.unfix(false, true);
            run += 1;
        }
    }

    /// Page id of the `index`-th data page, skipping management pages.
    /// Direct-address files (vector layouts) compute their pages this way.
    pub fn data_page_id(&self, index: u32) -> PageId {
        let bits = self.bits_per_page();
        (index / bits) * self.run_len() + 1 + (index % bits)
    }

    /// Allocate the `index`-th data page specifically, extending the file
    /// as needed. Idempotent for already-allocated pages.
    pub fn allocate_at(&self, trans: &Transaction, index: u32) -> Result<PageId> {
        trans.check_cancel()?;
        let page = self.data_page_id(index);
        let management = self.management_page_of(page);
        let bit = (page - management - 1) as usize;
        let beyond = management >= self.version.page_count();
        let mut m = self.version.fix(
            management,
            if beyond {
                FixMode::ALLOCATE | FixMode::WRITE
            } else {
                FixMode::WRITE
            },
            self.config.priority,
        )?;
        let already = m.content()[bit / 8] & (1 << (bit % 8)) != 0;
        if !already {
            m.content_mut()[bit / 8] |= 1 << (bit % 8);
            m.unfix(true, true);
            let data = self.version.fix(
                page,
                FixMode::ALLOCATE | FixMode::WRITE,
                self.config.priority,
            )?;
            data.unfix(true, true);
        } else {
            m.unfix(false, true);
        }
        Ok(page)
    }

    /// Release a data page. The page content is not touched; reallocation
    /// hands out zero-initialized views via `ALLOCATE`.
    pub fn free_page(&self, _trans: &Transaction, page: PageId) -> Result<()> {
        if self.is_management_page(page) {
            return Err(DbError::InvalidArgument(format!(
                "page {page} is a management page"
            )));
        }
        let management = self.management_page_of(page);
        let index = (page - management - 1) as usize;
        let mut m = self
            .version
            .fix(management, FixMode::WRITE, self.config.priority)?;
        m.content_mut()[index / 8] &= !(1 << (index % 8));
        m.unfix(true, true);
        Ok(())
    }

    /// True if the data page is currently allocated.
    pub fn is_allocated(&self, page: PageId) -> Result<bool> {
        if self.is_management_page(page) || page >= self.version.page_count() {
            return Ok(false);
        }
        let management = self.management_page_of(page);
        let index = (page - management - 1) as usize;
        let m = self
            .version
            .fix(management, FixMode::READ_ONLY, self.config.priority)?;
        let allocated = m.content()[index / 8] & (1 << (index % 8)) != 0;
        Ok(allocated)
    }

    /// Fix a data page with the given mode.
    pub fn attach_page(
        &self,
        _trans: &Transaction,
        page: PageId,
        mode: FixMode,
    ) -> Result<Memory> {
        self.version.fix(page, mode, self.config.priority)
    }

    /// Undo the in-memory modifications of a discardable page, or drop the
    /// cached frame so the next fix rereads the master.
    pub fn recover_page(&self, page: PageId) {
        self.version.recover_resident(page);
    }

    pub fn detach_page_all(&self) {
        self.version.detach_page_all();
    }

    pub fn flush_all_pages(&self) -> Result<()> {
        self.version.flush_all_pages()
    }

    pub fn recover(&self, _trans: &Transaction, checkpoint: TimeStamp) -> Result<()> {
        self.version.recover(checkpoint)
    }

    pub fn restore(&self, _trans: &Transaction, checkpoint: TimeStamp) -> Result<()> {
        self.version.restore(checkpoint)
    }

    pub fn sync(&self, trans: &Transaction) -> Result<SyncOutcome> {
        trans.check_cancel()?;
        self.version.sync()
    }

    pub fn truncate(&self, _trans: &Transaction, first_free_page_id: PageId) -> Result<()> {
        self.version.truncate(first_free_page_id)
    }

    // ---- verification --------------------------------------------------

    pub fn start_verification(
        &self,
        _trans: &Transaction,
        treatment: Treatment,
        _progress: &mut VerifyProgress,
    ) -> Result<()> {
        self.version.start_verification();
        *self.verification.lock() = Some(Verification {
            treatment,
            used: HashSet::new(),
        });
        Ok(())
    }

    /// Validate a page image, then fix it.
    pub fn verify_page(
        &self,
        trans: &Transaction,
        page: PageId,
        mode: FixMode,
        progress: &mut VerifyProgress,
    ) -> Result<Memory> {
        if let Err(e) = self.version.verify_page(page) {
            progress.fail(format!("page {page}: {e}"));
            return Err(DbError::VerifyAborted);
        }
        self.attach_page(trans, page, mode)
    }

    /// Record that the verifier reached `page`; an unallocated page being
    /// used is an inconsistency.
    pub fn notify_use_page(
        &self,
        _trans: &Transaction,
        progress: &mut VerifyProgress,
        page: PageId,
    ) {
        let mut verification = self.verification.lock();
        let Some(v) = verification.as_mut() else {
            progress.fail("notify_use_page outside verification");
            return;
        };
        v.used.insert(page);
        drop(verification);
        match self.is_allocated(page) {
            Ok(true) => {}
            Ok(false) => progress.fail(format!("page {page} used but not allocated")),
            Err(e) => progress.fail(format!("page {page}: {e}")),
        }
    }

    /// Finish the pass: allocated-but-unused pages are reported, and freed
    /// when the treatment allows correction.
    pub fn end_verification(
        &self,
        trans: &Transaction,
        progress: &mut VerifyProgress,
    ) -> Result<()> {
        let Some(v) = self.verification.lock().take() else {
            self.version.end_verification();
            return Ok(());
        };
        let run_len = self.run_len();
        let page_count = self.version.page_count();
        for page in 0..page_count {
            if page % run_len == 0 {
                continue;
            }
            if self.is_allocated(page)? && !v.used.contains(&page) {
                if v.treatment == Treatment::Correct {
                    self.free_page(trans, page)?;
                    progress.note_corrected();
                } else {
                    progress.fail(format!("page {page} allocated but never used"));
                }
            }
        }
        self.version.end_verification();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferPool, BufferPoolConfig};
    use crate::common::IsolationLevel;
    use crate::version::{ActiveSnapshots, VersionFileConfig};
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (PhysicalFile, Transaction) {
        let pool = BufferPool::new(BufferPoolConfig {
            capacity: 32,
            page_size: 256,
        });
        let version = Arc::new(
            VersionFile::new(
                VersionFileConfig {
                    file_id: 7,
                    page_size: 256,
                    path: dir.path().join("p"),
                    read_only: false,
                    temporary: false,
                },
                pool,
                ActiveSnapshots::new(),
            )
            .unwrap(),
        );
        let file = PhysicalFile::new(version, PhysicalFileConfig::default());
        let trans = Transaction::new(1, 1, IsolationLevel::ReadCommitted, true);
        file.create(&trans).unwrap();
        (file, trans)
    }

    #[test]
    fn allocate_free_reallocate() {
        let dir = TempDir::new().unwrap();
        let (file, trans) = setup(&dir);
        let a = file.allocate_page(&trans).unwrap();
        let b = file.allocate_page(&trans).unwrap();
        assert_ne!(a, b);
        assert!(file.is_allocated(a).unwrap());
        file.free_page(&trans, a).unwrap();
        assert!(!file.is_allocated(a).unwrap());
        let c = file.allocate_page(&trans).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn management_pages_stay_internal() {
        let dir = TempDir::new().unwrap();
        let (file, trans) = setup(&dir);
        let a = file.allocate_page(&trans).unwrap();
        assert!(!file.is_management_page(a));
        assert!(file.free_page(&trans, 0).is_err());
    }

    #[test]
    fn verification_reports_leaked_page() {
        let dir = TempDir::new().unwrap();
        let (file, trans) = setup(&dir);
        let used = file.allocate_page(&trans).unwrap();
        let leaked = file.allocate_page(&trans).unwrap();
        file.flush_all_pages().unwrap();

        let mut progress = VerifyProgress::new();
        file.start_verification(&trans, Treatment::ReadOnly, &mut progress)
            .unwrap();
        let m = file
            .verify_page(&trans, used, FixMode::READ_ONLY, &mut progress)
            .unwrap();
        drop(m);
        file.notify_use_page(&trans, &mut progress, used);
        file.end_verification(&trans, &mut progress).unwrap();
        assert!(!progress.is_good());
        assert!(progress.inconsistencies()[0].contains(&leaked.to_string()));
    }

    #[test]
    fn verification_correct_frees_leaked_page() {
        let dir = TempDir::new().unwrap();
        let (file, trans) = setup(&dir);
        let leaked = file.allocate_page(&trans).unwrap();
        file.flush_all_pages().unwrap();

        let mut progress = VerifyProgress::new();
        file.start_verification(&trans, Treatment::Correct, &mut progress)
            .unwrap();
        file.end_verification(&trans, &mut progress).unwrap();
        assert!(progress.is_good());
        assert_eq!(progress.corrected_count(), 1);
        assert!(!file.is_allocated(leaked).unwrap());
    }
}
