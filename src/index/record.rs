// Record file: fixed-length records addressed by row id.
//
// Header page: {record_size, record_count, free_head}. Data pages carry an
// occupancy bitmap followed by fixed-size slots; freed slots chain through
// their first four bytes so inserts reuse them before extending the file.

use std::sync::Arc;

use crate::common::{RowId, Transaction, UNDEFINED_ROW_ID};
use crate::error::{DbError, Result};
use crate::logical::{LogicalFile, OpenMode, PageSlot};
use crate::physical::PhysicalFile;

const OFF_RECORD_SIZE: usize = 0;
const OFF_RECORD_COUNT: usize = 4;
const OFF_FREE_HEAD: usize = 8;

fn read_u32(content: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(content[offset..offset + 4].try_into().unwrap())
}

fn write_u32(content: &mut [u8], offset: usize, value: u32) {
    content[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub struct RecordFile {
    file: LogicalFile,
    record_size: usize,
    slots_per_page: usize,
}

impl RecordFile {
    pub fn new(physical: Arc<PhysicalFile>, cache_size: usize, record_size: usize) -> RecordFile {
        let record_size = record_size.max(4);
        let content = physical.version_file().page_size() - crate::buffer::BLOCK_HEADER_SIZE;
        let slots_per_page = content * 8 / (record_size * 8 + 1);
        let header_page = physical.data_page_id(0);
        let mut file = LogicalFile::new(physical, cache_size);
        file.set_header_page(header_page);
        RecordFile {
            file,
            record_size,
            slots_per_page,
        }
    }

    pub fn create(&mut self, trans: &Transaction) -> Result<()> {
        self.file.physical().create(trans)?;
        self.file.physical().allocate_at(trans, 0)?;
        self.file.open(trans, OpenMode::Update);
        let record_size = self.record_size as u32;
        let header = self.header(trans)?;
        {
            let page = self.file.page_mut(header);
            let mut content = page.content_mut();
            content.fill(0);
            write_u32(&mut content, OFF_RECORD_SIZE, record_size);
            write_u32(&mut content, OFF_FREE_HEAD, UNDEFINED_ROW_ID);
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

    fn slot_page(&mut self, trans: &Transaction, rowid: RowId) -> Result<(PageSlot, usize)> {
        let page_index = (1 + rowid as usize / self.slots_per_page) as u32;
        let page_id = self.file.physical().allocate_at(trans, page_index)?;
        let slot = self.file.attach_page(trans, page_id, None)?;
        Ok((slot, rowid as usize % self.slots_per_page))
    }

    fn slot_offset(&self, index: usize) -> usize {
        self.slots_per_page.div_ceil(8) + index * self.record_size
    }

    /// Store a record, reusing a freed slot when one is chained.
    pub fn insert(&mut self, trans: &Transaction, data: &[u8]) -> Result<RowId> {
        if data.len() > self.record_size {
            return Err(DbError::InvalidArgument(format!(
                "record of {} bytes exceeds slot size {}",
                data.len(),
                self.record_size
            )));
        }
        let (rowid, reused) = {
            let header = self.header(trans)?;
            let free_head = read_u32(&self.file.page(header).content(), OFF_FREE_HEAD);
            let result = if free_head != UNDEFINED_ROW_ID {
                (free_head, true)
            } else {
                (
                    read_u32(&self.file.page(header).content(), OFF_RECORD_COUNT),
                    false,
                )
            };
            self.file.detach_page(header);
            result
        };

        let mut next_free = UNDEFINED_ROW_ID;
        let (slot, index) = self.slot_page(trans, rowid)?;
        {
            let record_offset = self.slot_offset(index);
            let page = self.file.page_mut(slot);
            if reused {
                next_free = read_u32(&page.content(), record_offset);
            }
            let mut content = page.content_mut();
            content[index / 8] |= 1 << (index % 8);
            content[record_offset..record_offset + self.record_size].fill(0);
            content[record_offset..record_offset + data.len()].copy_from_slice(data);
        }
        self.file.detach_page(slot);

        let header = self.header(trans)?;
        {
            let page = self.file.page_mut(header);
            let mut content = page.content_mut();
            if reused {
                write_u32(&mut content, OFF_FREE_HEAD, next_free);
            } else {
                write_u32(&mut content, OFF_RECORD_COUNT, rowid + 1);
            }
        }
        self.file.detach_page(header);
        Ok(rowid)
    }

    /// Read a record. Returns `None` for never-written or deleted rows.
    pub fn get(&mut self, trans: &Transaction, rowid: RowId) -> Result<Option<Vec<u8>>> {
        let page_index = (1 + rowid as usize / self.slots_per_page) as u32;
        let page_id = self.file.physical().data_page_id(page_index);
        if !self.file.physical().is_allocated(page_id)? {
            return Ok(None);
        }
        let slot = self.file.attach_page(trans, page_id, None)?;
        let index = rowid as usize % self.slots_per_page;
        let result = {
            let content = self.file.page(slot).content();
            if content[index / 8] & (1 << (index % 8)) != 0 {
                let offset = self.slot_offset(index);
                Some(content[offset..offset + self.record_size].to_vec())
            } else {
                None
            }
        };
        self.file.detach_page(slot);
        Ok(result)
    }

    pub fn update(&mut self, trans: &Transaction, rowid: RowId, data: &[u8]) -> Result<bool> {
        if data.len() > self.record_size {
            return Err(DbError::InvalidArgument("record too large".into()));
        }
        let (slot, index) = self.slot_page(trans, rowid)?;
        let offset = self.slot_offset(index);
        let updated = {
            let page = self.file.page_mut(slot);
            let occupied = page.content()[index / 8] & (1 << (index % 8)) != 0;
            if occupied {
                let mut content = page.content_mut();
                content[offset..offset + self.record_size].fill(0);
                content[offset..offset + data.len()].copy_from_slice(data);
            }
            occupied
        };
        self.file.detach_page(slot);
        Ok(updated)
    }

    /// Delete a record and chain its slot onto the free list.
    pub fn expunge(&mut self, trans: &Transaction, rowid: RowId) -> Result<bool> {
        let free_head = {
            let header = self.header(trans)?;
            let value = read_u32(&self.file.page(header).content(), OFF_FREE_HEAD);
            self.file.detach_page(header);
            value
        };
        let (slot, index) = self.slot_page(trans, rowid)?;
        let offset = self.slot_offset(index);
        let deleted = {
            let page = self.file.page_mut(slot);
            let occupied = page.content()[index / 8] & (1 << (index % 8)) != 0;
            if occupied {
                let mut content = page.content_mut();
                content[index / 8] &= !(1 << (index % 8));
                write_u32(&mut content, offset, free_head);
            }
            occupied
        };
        self.file.detach_page(slot);
        if deleted {
            let header = self.header(trans)?;
            {
                let page = self.file.page_mut(header);
                let mut content = page.content_mut();
                write_u32(&mut content, OFF_FREE_HEAD, rowid);
            }
            self.file.detach_page(header);
        }
        Ok(deleted)
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

    fn setup(dir: &TempDir) -> (RecordFile, Transaction) {
        let pool = BufferPool::new(BufferPoolConfig {
            capacity: 64,
            page_size: 512,
        });
        let version = Arc::new(
            VersionFile::new(
                VersionFileConfig {
                    file_id: 21,
                    page_size: 512,
                    path: dir.path().join("Record"),
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
        let mut file = RecordFile::new(physical, 8, 16);
        file.create(&trans).unwrap();
        file.open(&trans, OpenMode::Update).unwrap();
        (file, trans)
    }

    #[test]
    fn insert_get_update_expunge() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        let a = file.insert(&trans, b"alpha").unwrap();
        let b = file.insert(&trans, b"beta").unwrap();
        assert_ne!(a, b);
        assert_eq!(&file.get(&trans, a).unwrap().unwrap()[..5], b"alpha");

        assert!(file.update(&trans, a, b"gamma").unwrap());
        assert_eq!(&file.get(&trans, a).unwrap().unwrap()[..5], b"gamma");

        assert!(file.expunge(&trans, a).unwrap());
        assert!(file.get(&trans, a).unwrap().is_none());
        assert!(!file.expunge(&trans, a).unwrap());
    }

    #[test]
    fn freed_slot_is_reused() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        let a = file.insert(&trans, b"one").unwrap();
        let _b = file.insert(&trans, b"two").unwrap();
        file.expunge(&trans, a).unwrap();
        let c = file.insert(&trans, b"three").unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn oversized_record_rejected() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        assert!(file.insert(&trans, &[0u8; 64]).is_err());
    }
}
