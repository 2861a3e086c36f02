// Large-object file: one byte stream per row, spread over a chain of data
// pages, with a direct-addressed slot holding the chain head and length.

use std::sync::Arc;

use crate::common::{RowId, Transaction, INVALID_PAGE_ID};
use crate::error::Result;
use crate::logical::{LogicalFile, OpenMode, PageSlot};
use crate::physical::PhysicalFile;

// Row slot: {head page u32, byte length u32}.
const SLOT_SIZE: usize = 8;

// Data page: {next u32, len u32, bytes}.
const DATA_OFF_NEXT: usize = 0;
const DATA_OFF_LEN: usize = 4;
const DATA_OFF_BYTES: usize = 8;

fn read_u32(content: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(content[offset..offset + 4].try_into().unwrap())
}

fn write_u32(content: &mut [u8], offset: usize, value: u32) {
    content[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub struct LobFile {
    file: LogicalFile,
    slots_per_page: usize,
    bytes_per_page: usize,
}

impl LobFile {
    pub fn new(physical: Arc<PhysicalFile>, cache_size: usize) -> LobFile {
        let content = physical.version_file().page_size() - crate::buffer::BLOCK_HEADER_SIZE;
        let header_page = physical.data_page_id(0);
        let mut file = LogicalFile::new(physical, cache_size);
        file.set_header_page(header_page);
        LobFile {
            file,
            slots_per_page: content * 8 / (SLOT_SIZE * 8 + 1),
            bytes_per_page: content - DATA_OFF_BYTES,
        }
    }

    pub fn create(&mut self, trans: &Transaction) -> Result<()> {
        self.file.physical().create(trans)?;
        self.file.physical().allocate_at(trans, 0)?;
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

    fn row_slot(&mut self, trans: &Transaction, rowid: RowId) -> Result<(PageSlot, usize)> {
        let page_index = (1 + rowid as usize / self.slots_per_page) as u32;
        let page_id = self.file.physical().allocate_at(trans, page_index)?;
        let slot = self.file.attach_page(trans, page_id, None)?;
        Ok((slot, rowid as usize % self.slots_per_page))
    }

    fn slot_offset(&self, index: usize) -> usize {
        self.slots_per_page.div_ceil(8) + index * SLOT_SIZE
    }

    /// Store the row's object, replacing any previous content.
    pub fn write(&mut self, trans: &Transaction, rowid: RowId, data: &[u8]) -> Result<()> {
        self.expunge(trans, rowid)?;

        let mut head = INVALID_PAGE_ID;
        let mut previous = INVALID_PAGE_ID;
        for chunk in data.chunks(self.bytes_per_page.max(1)) {
            let fresh = self.file.physical().allocate_page(trans)?;
            let slot = self.file.attach_page(trans, fresh, None)?;
            {
                let page = self.file.page_mut(slot);
                let mut content = page.content_mut();
                content.fill(0);
                write_u32(&mut content, DATA_OFF_NEXT, INVALID_PAGE_ID);
                write_u32(&mut content, DATA_OFF_LEN, chunk.len() as u32);
                content[DATA_OFF_BYTES..DATA_OFF_BYTES + chunk.len()].copy_from_slice(chunk);
            }
            self.file.detach_page(slot);
            if head == INVALID_PAGE_ID {
                head = fresh;
            } else {
                let slot = self.file.attach_page(trans, previous, None)?;
                {
                    let page = self.file.page_mut(slot);
                    write_u32(&mut page.content_mut(), DATA_OFF_NEXT, fresh);
                }
                self.file.detach_page(slot);
            }
            previous = fresh;
        }

        let (slot, index) = self.row_slot(trans, rowid)?;
        let offset = self.slot_offset(index);
        {
            let page = self.file.page_mut(slot);
            let mut content = page.content_mut();
            content[index / 8] |= 1 << (index % 8);
            write_u32(&mut content, offset, head);
            write_u32(&mut content, offset + 4, data.len() as u32);
        }
        self.file.detach_page(slot);
        Ok(())
    }

    /// Read the row's object; `None` when nothing is stored.
    pub fn read(&mut self, trans: &Transaction, rowid: RowId) -> Result<Option<Vec<u8>>> {
        let page_index = (1 + rowid as usize / self.slots_per_page) as u32;
        let page_id = self.file.physical().data_page_id(page_index);
        if !self.file.physical().is_allocated(page_id)? {
            return Ok(None);
        }
        let (slot, index) = self.row_slot(trans, rowid)?;
        let offset = self.slot_offset(index);
        let (head, length, occupied) = {
            let content = self.file.page(slot).content();
            (
                read_u32(&content, offset),
                read_u32(&content, offset + 4) as usize,
                content[index / 8] & (1 << (index % 8)) != 0,
            )
        };
        self.file.detach_page(slot);
        if !occupied {
            return Ok(None);
        }

        let mut data = Vec::with_capacity(length);
        let mut current = head;
        while current != INVALID_PAGE_ID {
            trans.check_cancel()?;
            let slot = self.file.attach_page(trans, current, None)?;
            {
                let content = self.file.page(slot).content();
                let len = read_u32(&content, DATA_OFF_LEN) as usize;
                data.extend_from_slice(&content[DATA_OFF_BYTES..DATA_OFF_BYTES + len]);
                current = read_u32(&content, DATA_OFF_NEXT);
            }
            self.file.detach_page(slot);
        }
        debug_assert_eq!(data.len(), length);
        Ok(Some(data))
    }

    /// Drop the row's object, freeing its pages at the next flush.
    pub fn expunge(&mut self, trans: &Transaction, rowid: RowId) -> Result<()> {
        let (slot, index) = self.row_slot(trans, rowid)?;
        let offset = self.slot_offset(index);
        let (head, occupied) = {
            let content = self.file.page(slot).content();
            (
                read_u32(&content, offset),
                content[index / 8] & (1 << (index % 8)) != 0,
            )
        };
        if occupied {
            let page = self.file.page_mut(slot);
            let mut content = page.content_mut();
            content[index / 8] &= !(1 << (index % 8));
            write_u32(&mut content, offset, 0);
            write_u32(&mut content, offset + 4, 0);
        }
        self.file.detach_page(slot);
        if !occupied {
            return Ok(());
        }
        let mut current = head;
        while current != INVALID_PAGE_ID {
            let slot = self.file.attach_page(trans, current, None)?;
            let next = read_u32(&self.file.page(slot).content(), DATA_OFF_NEXT);
            self.file.free_page(slot);
            current = next;
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

    fn setup(dir: &TempDir) -> (LobFile, Transaction) {
        let pool = BufferPool::new(BufferPoolConfig {
            capacity: 128,
            page_size: 256,
        });
        let version = Arc::new(
            VersionFile::new(
                VersionFileConfig {
                    file_id: 81,
                    page_size: 256,
                    path: dir.path().join("Lob"),
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
        let mut file = LobFile::new(physical, 16);
        file.create(&trans).unwrap();
        file.open(&trans, OpenMode::Update).unwrap();
        (file, trans)
    }

    #[test]
    fn write_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        file.write(&trans, 3, b"small object").unwrap();
        assert_eq!(file.read(&trans, 3).unwrap().unwrap(), b"small object");
        assert!(file.read(&trans, 4).unwrap().is_none());
    }

    #[test]
    fn large_object_chains_pages() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        // 256-byte pages hold 232 content bytes per data page.
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        file.write(&trans, 1, &data).unwrap();
        assert_eq!(file.read(&trans, 1).unwrap().unwrap(), data);
    }

    #[test]
    fn rewrite_replaces_content() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        file.write(&trans, 1, &[1u8; 500]).unwrap();
        file.write(&trans, 1, b"short").unwrap();
        assert_eq!(file.read(&trans, 1).unwrap().unwrap(), b"short");
    }

    #[test]
    fn expunge_clears_row() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        file.write(&trans, 2, b"bytes").unwrap();
        file.expunge(&trans, 2).unwrap();
        assert!(file.read(&trans, 2).unwrap().is_none());
        file.expunge(&trans, 2).unwrap();
    }
}
