// Bitmap index file: each key owns a chain of bitmap pages over the rowid
// space. The directory (key -> chain head) itself chains from the header.

use std::sync::Arc;

use crate::common::{PageId, RowId, Transaction, INVALID_PAGE_ID};
use crate::error::Result;
use crate::logical::{LogicalFile, OpenMode, PageSlot};
use crate::physical::PhysicalFile;

// Header page: {first_directory u32, key_count u32}.
const OFF_FIRST_DIRECTORY: usize = 0;
const OFF_KEY_COUNT: usize = 4;

// Directory page: {next u32, count u32, entries (key u64, head u32)}.
const DIR_OFF_NEXT: usize = 0;
const DIR_OFF_COUNT: usize = 4;
const DIR_OFF_ENTRIES: usize = 8;
const DIR_ENTRY_SIZE: usize = 12;

// Bitmap page: {next u32, bits...}.
const BMP_OFF_NEXT: usize = 0;
const BMP_OFF_BITS: usize = 4;

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

pub struct BitmapFile {
    file: LogicalFile,
    directory_capacity: usize,
    bits_per_page: usize,
}

impl BitmapFile {
    pub fn new(physical: Arc<PhysicalFile>, cache_size: usize) -> BitmapFile {
        let content = physical.version_file().page_size() - crate::buffer::BLOCK_HEADER_SIZE;
        let header_page = physical.data_page_id(0);
        let mut file = LogicalFile::new(physical, cache_size);
        file.set_header_page(header_page);
        BitmapFile {
            file,
            directory_capacity: (content - DIR_OFF_ENTRIES) / DIR_ENTRY_SIZE,
            bits_per_page: (content - BMP_OFF_BITS) * 8,
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
            write_u32(&mut content, OFF_FIRST_DIRECTORY, INVALID_PAGE_ID);
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

    pub fn key_count(&mut self, trans: &Transaction) -> Result<u32> {
        let header = self.header(trans)?;
        let count = read_u32(&self.file.page(header).content(), OFF_KEY_COUNT);
        self.file.detach_page(header);
        Ok(count)
    }

    /// Chain head for `key`, creating the directory entry when asked.
    fn chain_head(
        &mut self,
        trans: &Transaction,
        key: u64,
        create: bool,
    ) -> Result<Option<(PageId, usize)>> {
        let header = self.header(trans)?;
        let first = read_u32(&self.file.page(header).content(), OFF_FIRST_DIRECTORY);
        self.file.detach_page(header);

        let mut dir = first;
        let mut last_dir = INVALID_PAGE_ID;
        while dir != INVALID_PAGE_ID {
            let slot = self.file.attach_page(trans, dir, None)?;
            let (found, next, count) = {
                let content = self.file.page(slot).content();
                let count = read_u32(&content, DIR_OFF_COUNT) as usize;
                let mut found = None;
                for i in 0..count {
                    let offset = DIR_OFF_ENTRIES + i * DIR_ENTRY_SIZE;
                    if read_u64(&content, offset) == key {
                        found = Some((read_u32(&content, offset + 8), i));
                        break;
                    }
                }
                (found, read_u32(&content, DIR_OFF_NEXT), count)
            };
            if let Some((_, index)) = found {
                self.file.detach_page(slot);
                return Ok(Some((dir, index)));
            }
            if next == INVALID_PAGE_ID && create && count < self.directory_capacity {
                // Room in the tail directory page for the new key.
                let page = self.file.page_mut(slot);
                let mut content = page.content_mut();
                let offset = DIR_OFF_ENTRIES + count * DIR_ENTRY_SIZE;
                write_u64(&mut content, offset, key);
                write_u32(&mut content, offset + 8, INVALID_PAGE_ID);
                write_u32(&mut content, DIR_OFF_COUNT, count as u32 + 1);
                drop(content);
                self.file.detach_page(slot);
                self.bump_key_count(trans)?;
                return Ok(Some((dir, count)));
            }
            self.file.detach_page(slot);
            last_dir = dir;
            dir = next;
        }

        if !create {
            return Ok(None);
        }

        // Append a fresh directory page holding the key.
        let fresh = self.file.physical().allocate_page(trans)?;
        let slot = self.file.attach_page(trans, fresh, None)?;
        {
            let page = self.file.page_mut(slot);
            let mut content = page.content_mut();
            write_u32(&mut content, DIR_OFF_NEXT, INVALID_PAGE_ID);
            write_u32(&mut content, DIR_OFF_COUNT, 1);
            write_u64(&mut content, DIR_OFF_ENTRIES, key);
            write_u32(&mut content, DIR_OFF_ENTRIES + 8, INVALID_PAGE_ID);
        }
        self.file.detach_page(slot);

        if last_dir == INVALID_PAGE_ID {
            let header = self.header(trans)?;
            {
                let page = self.file.page_mut(header);
                write_u32(&mut page.content_mut(), OFF_FIRST_DIRECTORY, fresh);
            }
            self.file.detach_page(header);
        } else {
            let slot = self.file.attach_page(trans, last_dir, None)?;
            {
                let page = self.file.page_mut(slot);
                write_u32(&mut page.content_mut(), DIR_OFF_NEXT, fresh);
            }
            self.file.detach_page(slot);
        }
        self.bump_key_count(trans)?;
        Ok(Some((fresh, 0)))
    }

    fn bump_key_count(&mut self, trans: &Transaction) -> Result<()> {
        let header = self.header(trans)?;
        {
            let page = self.file.page_mut(header);
            let mut content = page.content_mut();
            let count = read_u32(&content, OFF_KEY_COUNT) + 1;
            write_u32(&mut content, OFF_KEY_COUNT, count);
        }
        self.file.detach_page(header);
        Ok(())
    }

    fn directory_entry_head(
        &mut self,
        trans: &Transaction,
        dir: PageId,
        index: usize,
    ) -> Result<PageId> {
        let slot = self.file.attach_page(trans, dir, None)?;
        let head = read_u32(
            &self.file.page(slot).content(),
            DIR_OFF_ENTRIES + index * DIR_ENTRY_SIZE + 8,
        );
        self.file.detach_page(slot);
        Ok(head)
    }

    /// Set the bit for (key, rowid).
    pub fn set(&mut self, trans: &Transaction, key: u64, rowid: RowId) -> Result<()> {
        let (dir, index) = self
            .chain_head(trans, key, true)?
            .expect("create mode always yields an entry");
        let mut page_id = self.directory_entry_head(trans, dir, index)?;
        let mut link = rowid as usize / self.bits_per_page;

        // Walk (and extend) the chain to the covering page.
        if page_id == INVALID_PAGE_ID {
            page_id = self.append_bitmap_page(trans, None, (dir, index))?;
        }
        let mut current = page_id;
        while link > 0 {
            let slot = self.file.attach_page(trans, current, None)?;
            let next = read_u32(&self.file.page(slot).content(), BMP_OFF_NEXT);
            self.file.detach_page(slot);
            current = if next == INVALID_PAGE_ID {
                self.append_bitmap_page(trans, Some(current), (dir, index))?
            } else {
                next
            };
            link -= 1;
        }

        let bit = rowid as usize % self.bits_per_page;
        let slot = self.file.attach_page(trans, current, None)?;
        {
            let page = self.file.page_mut(slot);
            page.content_mut()[BMP_OFF_BITS + bit / 8] |= 1 << (bit % 8);
        }
        self.file.detach_page(slot);
        Ok(())
    }

    fn append_bitmap_page(
        &mut self,
        trans: &Transaction,
        after: Option<PageId>,
        entry: (PageId, usize),
    ) -> Result<PageId> {
        let fresh = self.file.physical().allocate_page(trans)?;
        let slot = self.file.attach_page(trans, fresh, None)?;
        {
            let page = self.file.page_mut(slot);
            let mut content = page.content_mut();
            content.fill(0);
            write_u32(&mut content, BMP_OFF_NEXT, INVALID_PAGE_ID);
        }
        self.file.detach_page(slot);
        match after {
            Some(prev) => {
                let slot = self.file.attach_page(trans, prev, None)?;
                {
                    let page = self.file.page_mut(slot);
                    write_u32(&mut page.content_mut(), BMP_OFF_NEXT, fresh);
                }
                self.file.detach_page(slot);
            }
            None => {
                let (dir, index) = entry;
                let slot = self.file.attach_page(trans, dir, None)?;
                {
                    let page = self.file.page_mut(slot);
                    write_u32(
                        &mut page.content_mut(),
                        DIR_OFF_ENTRIES + index * DIR_ENTRY_SIZE + 8,
                        fresh,
                    );
                }
                self.file.detach_page(slot);
            }
        }
        Ok(fresh)
    }

    /// Test the bit for (key, rowid).
    pub fn test(&mut self, trans: &Transaction, key: u64, rowid: RowId) -> Result<bool> {
        let Some((dir, index)) = self.chain_head(trans, key, false)? else {
            return Ok(false);
        };
        let mut current = self.directory_entry_head(trans, dir, index)?;
        let mut link = rowid as usize / self.bits_per_page;
        while current != INVALID_PAGE_ID && link > 0 {
            let slot = self.file.attach_page(trans, current, None)?;
            current = read_u32(&self.file.page(slot).content(), BMP_OFF_NEXT);
            self.file.detach_page(slot);
            link -= 1;
        }
        if current == INVALID_PAGE_ID {
            return Ok(false);
        }
        let bit = rowid as usize % self.bits_per_page;
        let slot = self.file.attach_page(trans, current, None)?;
        let set = self.file.page(slot).content()[BMP_OFF_BITS + bit / 8] & (1 << (bit % 8)) != 0;
        self.file.detach_page(slot);
        Ok(set)
    }

    /// All row ids under `key`, ascending.
    pub fn rows(&mut self, trans: &Transaction, key: u64) -> Result<Vec<RowId>> {
        let mut result = Vec::new();
        let Some((dir, index)) = self.chain_head(trans, key, false)? else {
            return Ok(result);
        };
        let mut current = self.directory_entry_head(trans, dir, index)?;
        let mut base = 0usize;
        while current != INVALID_PAGE_ID {
            trans.check_cancel()?;
            let slot = self.file.attach_page(trans, current, None)?;
            {
                let content = self.file.page(slot).content();
                for bit in 0..self.bits_per_page {
                    if content[BMP_OFF_BITS + bit / 8] & (1 << (bit % 8)) != 0 {
                        result.push((base + bit) as RowId);
                    }
                }
                current = read_u32(&content, BMP_OFF_NEXT);
            }
            self.file.detach_page(slot);
            base += self.bits_per_page;
        }
        Ok(result)
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

    fn setup(dir: &TempDir) -> (BitmapFile, Transaction) {
        let pool = BufferPool::new(BufferPoolConfig {
            capacity: 128,
            page_size: 256,
        });
        let version = Arc::new(
            VersionFile::new(
                VersionFileConfig {
                    file_id: 41,
                    page_size: 256,
                    path: dir.path().join("Bitmap"),
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
        let mut file = BitmapFile::new(physical, 16);
        file.create(&trans).unwrap();
        file.open(&trans, OpenMode::Update).unwrap();
        (file, trans)
    }

    #[test]
    fn set_test_rows() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        file.set(&trans, 5, 1).unwrap();
        file.set(&trans, 5, 100).unwrap();
        file.set(&trans, 9, 2).unwrap();
        assert!(file.test(&trans, 5, 1).unwrap());
        assert!(!file.test(&trans, 5, 2).unwrap());
        assert!(!file.test(&trans, 6, 1).unwrap());
        assert_eq!(file.rows(&trans, 5).unwrap(), vec![1, 100]);
        assert_eq!(file.key_count(&trans).unwrap(), 2);
    }

    #[test]
    fn rowids_beyond_one_page_chain() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        // 256-byte pages hold (240-4)*8 = 1888 bits; go well past that.
        let far = 5000;
        file.set(&trans, 1, far).unwrap();
        file.set(&trans, 1, 3).unwrap();
        assert!(file.test(&trans, 1, far).unwrap());
        assert!(!file.test(&trans, 1, far - 1).unwrap());
        assert_eq!(file.rows(&trans, 1).unwrap(), vec![3, far]);
    }

    #[test]
    fn many_keys_spill_directory_pages() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        // 256-byte pages hold (240-8)/12 = 19 directory entries.
        for key in 0..50u64 {
            file.set(&trans, key, key as u32).unwrap();
        }
        for key in 0..50u64 {
            assert!(file.test(&trans, key, key as u32).unwrap(), "key {key}");
        }
        assert_eq!(file.key_count(&trans).unwrap(), 50);
    }
}
