// Ordered-key file: sorted (key, rowid) entries in a chain of leaf pages
// with in-page binary search and half splits. The header tracks the chain
// head and the entry count.

use std::sync::Arc;

use crate::common::{PageId, RowId, Transaction, INVALID_PAGE_ID};
use crate::error::Result;
use crate::logical::{LogicalFile, OpenMode, PageSlot};
use crate::physical::PhysicalFile;

const OFF_ENTRY_COUNT: usize = 0;
const OFF_FIRST_LEAF: usize = 4;

// Leaf layout.
const LEAF_OFF_COUNT: usize = 0;
const LEAF_OFF_NEXT: usize = 4;
const LEAF_OFF_ENTRIES: usize = 8;
const ENTRY_SIZE: usize = 12; // key u64 + value u32

fn read_u32(content: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(content[offset..offset + 4].try_into().unwrap())
}

fn write_u32(content: &mut [u8], offset: usize, value: u32) {
    content[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn read_u64(content: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(content[offset..offset + 8].try_into().unwrap())
}

fn write_u64(content: &mut [u8], offset: usize, value: u64) {
    content[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn entry_at(content: &[u8], index: usize) -> (u64, u32) {
    let offset = LEAF_OFF_ENTRIES + index * ENTRY_SIZE;
    (read_u64(content, offset), read_u32(content, offset + 8))
}

fn put_entry(content: &mut [u8], index: usize, key: u64, value: u32) {
    let offset = LEAF_OFF_ENTRIES + index * ENTRY_SIZE;
    write_u64(content, offset, key);
    write_u32(content, offset + 8, value);
}

pub struct BtreeFile {
    file: LogicalFile,
    leaf_capacity: usize,
}

impl BtreeFile {
    pub fn new(physical: Arc<PhysicalFile>, cache_size: usize) -> BtreeFile {
        let content = physical.version_file().page_size() - crate::buffer::BLOCK_HEADER_SIZE;
        let leaf_capacity = (content - LEAF_OFF_ENTRIES) / ENTRY_SIZE;
        let header_page = physical.data_page_id(0);
        let mut file = LogicalFile::new(physical, cache_size);
        file.set_header_page(header_page);
        BtreeFile {
            file,
            leaf_capacity,
        }
    }

    pub fn create(&mut self, trans: &Transaction) -> Result<()> {
        self.file.physical().create(trans)?;
        self.file.physical().allocate_at(trans, 0)?;
        self.file.open(trans, OpenMode::Update);
        let header = self.header(trans)?;
        {
            let page = self.file.page_mut(header);
            let mut content = page.content_mut();
            content.fill(0);
            write_u32(&mut content, OFF_FIRST_LEAF, INVALID_PAGE_ID);
        }
        self.file.detach_page(header);
        self.file.flush_all_pages(trans)?;
        self.file.close();
        Ok(())
    }

    pub fn open(&mut self, trans: &Transaction, mode: OpenMode) -> Result<()> {
        self.file.physical().mount(trans)?;
        self.file.open(trans, mode);
        Ok(())
    }

    pub fn close(&mut self, trans: &Transaction) -> Result<()> {
        if self.file.is_open() {
            self.file.flush_all_pages(trans)?;
        }
        self.file.close();
        Ok(())
    }

    fn header(&mut self, trans: &Transaction) -> Result<PageSlot> {
        let page = self.file.physical().data_page_id(0);
        self.file.attach_page(trans, page, None)
    }

    pub fn entry_count(&mut self, trans: &Transaction) -> Result<u32> {
        let header = self.header(trans)?;
        let count = read_u32(&self.file.page(header).content(), OFF_ENTRY_COUNT);
        self.file.detach_page(header);
        Ok(count)
    }

    /// Leaf that should hold `key`: the first whose last entry is >= key,
    /// else the last leaf of the chain.
    fn target_leaf(&mut self, trans: &Transaction, key: u64) -> Result<Option<PageId>> {
        let header = self.header(trans)?;
        let mut leaf = read_u32(&self.file.page(header).content(), OFF_FIRST_LEAF);
        self.file.detach_page(header);
        if leaf == INVALID_PAGE_ID {
            return Ok(None);
        }
        loop {
            let slot = self.file.attach_page(trans, leaf, None)?;
            let (next, last_key) = {
                let content = self.file.page(slot).content();
                let count = read_u32(&content, LEAF_OFF_COUNT) as usize;
                let next = read_u32(&content, LEAF_OFF_NEXT);
                let last_key = if count > 0 {
                    entry_at(&content, count - 1).0
                } else {
                    u64::MAX
                };
                (next, last_key)
            };
            self.file.detach_page(slot);
            if last_key >= key || next == INVALID_PAGE_ID {
                return Ok(Some(leaf));
            }
            leaf = next;
        }
    }

    pub fn insert(&mut self, trans: &Transaction, key: u64, value: RowId) -> Result<()> {
        let leaf = match self.target_leaf(trans, key)? {
            Some(leaf) => leaf,
            None => {
                // First leaf of the file.
                let leaf = self.file.physical().allocate_page(trans)?;
                let header = self.header(trans)?;
                {
                    let page = self.file.page_mut(header);
                    write_u32(&mut page.content_mut(), OFF_FIRST_LEAF, leaf);
                }
                self.file.detach_page(header);
                let slot = self.file.attach_page(trans, leaf, None)?;
                {
                    let page = self.file.page_mut(slot);
                    let mut content = page.content_mut();
                    write_u32(&mut content, LEAF_OFF_COUNT, 0);
                    write_u32(&mut content, LEAF_OFF_NEXT, INVALID_PAGE_ID);
                }
                self.file.detach_page(slot);
                leaf
            }
        };

        let mut target = leaf;
        let slot = self.file.attach_page(trans, leaf, None)?;
        let full = {
            let content = self.file.page(slot).content();
            read_u32(&content, LEAF_OFF_COUNT) as usize >= self.leaf_capacity
        };
        if full {
            target = self.split_leaf(trans, slot, key)?;
        } else {
            self.file.detach_page(slot);
        }

        let slot = self.file.attach_page(trans, target, None)?;
        {
            let page = self.file.page_mut(slot);
            let mut content = page.content_mut();
            let count = read_u32(&content, LEAF_OFF_COUNT) as usize;
            let mut position = count;
            for i in 0..count {
                if entry_at(&content, i).0 > key {
                    position = i;
                    break;
                }
            }
            for i in (position..count).rev() {
                let (k, v) = entry_at(&content, i);
                put_entry(&mut content, i + 1, k, v);
            }
            put_entry(&mut content, position, key, value);
            write_u32(&mut content, LEAF_OFF_COUNT, count as u32 + 1);
        }
        self.file.detach_page(slot);

        let header = self.header(trans)?;
        {
            let page = self.file.page_mut(header);
            let mut content = page.content_mut();
            let count = read_u32(&content, OFF_ENTRY_COUNT) + 1;
            write_u32(&mut content, OFF_ENTRY_COUNT, count);
        }
        self.file.detach_page(header);
        Ok(())
    }

    /// Split a full leaf in half; returns the leaf that should receive
    /// `key`.
    fn split_leaf(&mut self, trans: &Transaction, slot: PageSlot, key: u64) -> Result<PageId> {
        let sibling = self.file.physical().allocate_page(trans)?;
        let left_id = self.file.page(slot).id();

        let (moved, old_next, split_key) = {
            let page = self.file.page_mut(slot);
            let mut content = page.content_mut();
            let count = read_u32(&content, LEAF_OFF_COUNT) as usize;
            let half = count / 2;
            let moved: Vec<(u64, u32)> = (half..count).map(|i| entry_at(&content, i)).collect();
            let old_next = read_u32(&content, LEAF_OFF_NEXT);
            write_u32(&mut content, LEAF_OFF_COUNT, half as u32);
            write_u32(&mut content, LEAF_OFF_NEXT, sibling);
            (moved, old_next, entry_at(&content, half - 1).0)
        };
        self.file.detach_page(slot);

        let right = self.file.attach_page(trans, sibling, None)?;
        {
            let page = self.file.page_mut(right);
            let mut content = page.content_mut();
            write_u32(&mut content, LEAF_OFF_COUNT, moved.len() as u32);
            write_u32(&mut content, LEAF_OFF_NEXT, old_next);
            for (i, (k, v)) in moved.iter().enumerate() {
                put_entry(&mut content, i, *k, *v);
            }
        }
        self.file.detach_page(right);

        Ok(if key <= split_key { left_id } else { sibling })
    }

    /// All row ids stored under `key`.
    pub fn find(&mut self, trans: &Transaction, key: u64) -> Result<Vec<RowId>> {
        let mut result = Vec::new();
        self.scan(trans, key, key, |_, v| result.push(v))?;
        Ok(result)
    }

    /// Walk entries with `low <= key <= high` in key order.
    pub fn scan(
        &mut self,
        trans: &Transaction,
        low: u64,
        high: u64,
        mut visit: impl FnMut(u64, RowId),
    ) -> Result<()> {
        let header = self.header(trans)?;
        let mut leaf = read_u32(&self.file.page(header).content(), OFF_FIRST_LEAF);
        self.file.detach_page(header);
        while leaf != INVALID_PAGE_ID {
            trans.check_cancel()?;
            let slot = self.file.attach_page(trans, leaf, None)?;
            let mut done = false;
            let next = {
                let content = self.file.page(slot).content();
                let count = read_u32(&content, LEAF_OFF_COUNT) as usize;
                for i in 0..count {
                    let (k, v) = entry_at(&content, i);
                    if k > high {
                        done = true;
                        break;
                    }
                    if k >= low {
                        visit(k, v);
                    }
                }
                read_u32(&content, LEAF_OFF_NEXT)
            };
            self.file.detach_page(slot);
            if done {
                break;
            }
            leaf = next;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferPool, BufferPoolConfig};
    use crate::common::IsolationLevel;
    use crate::physical::PhysicalFileConfig;
    use crate::version::{ActiveSnapshots, VersionFile, VersionFileConfig};
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (BtreeFile, Transaction) {
        let pool = BufferPool::new(BufferPoolConfig {
            capacity: 128,
            page_size: 256,
        });
        let version = Arc::new(
            VersionFile::new(
                VersionFileConfig {
                    file_id: 31,
                    page_size: 256,
                    path: dir.path().join("Btree"),
                    read_only: false,
                    temporary: false,
                },
                pool,
                ActiveSnapshots::new(),
            )
            .unwrap(),
        );
        let physical = Arc::new(PhysicalFile::new(version, PhysicalFileConfig::default()));
        let trans = Transaction::new(1, 1, IsolationLevel::ReadCommitted, true);
        let mut file = BtreeFile::new(physical, 16);
        file.create(&trans).unwrap();
        file.open(&trans, OpenMode::Update).unwrap();
        (file, trans)
    }

    #[test]
    fn insert_and_find() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        file.insert(&trans, 30, 3).unwrap();
        file.insert(&trans, 10, 1).unwrap();
        file.insert(&trans, 20, 2).unwrap();
        assert_eq!(file.find(&trans, 20).unwrap(), vec![2]);
        assert!(file.find(&trans, 25).unwrap().is_empty());
        assert_eq!(file.entry_count(&trans).unwrap(), 3);
    }

    #[test]
    fn splits_keep_order() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        // Enough entries to force several leaf splits at 256-byte pages.
        let keys: Vec<u64> = (0..200).map(|i| (i * 37) % 500).collect();
        for (i, &k) in keys.iter().enumerate() {
            file.insert(&trans, k, i as u32).unwrap();
        }
        let mut seen = Vec::new();
        file.scan(&trans, 0, u64::MAX, |k, _| seen.push(k)).unwrap();
        assert_eq!(seen.len(), keys.len());
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(seen, sorted);
    }

    #[test]
    fn range_scan_bounds() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        for k in 0..50u64 {
            file.insert(&trans, k, k as u32).unwrap();
        }
        let mut seen = Vec::new();
        file.scan(&trans, 10, 14, |k, _| seen.push(k)).unwrap();
        assert_eq!(seen, vec![10, 11, 12, 13, 14]);
    }

    #[test]
    fn duplicate_keys_all_returned() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        file.insert(&trans, 7, 1).unwrap();
        file.insert(&trans, 7, 2).unwrap();
        file.insert(&trans, 7, 3).unwrap();
        let mut rows = file.find(&trans, 7).unwrap();
        rows.sort_unstable();
        assert_eq!(rows, vec![1, 2, 3]);
    }
}
