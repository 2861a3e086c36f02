// Array file: a list of values per row, for array-typed columns. Rows get a
// direct-addressed slot pointing at a chain of value pages.

use std::sync::Arc;

use crate::common::{PageId, RowId, Transaction, INVALID_PAGE_ID};
use crate::error::Result;
use crate::logical::{LogicalFile, OpenMode, PageSlot};
use crate::physical::PhysicalFile;

// Row slot: {head page u32, value count u32}.
const SLOT_SIZE: usize = 8;

// Value page: {next u32, count u32, values u32...}.
const VAL_OFF_NEXT: usize = 0;
const VAL_OFF_COUNT: usize = 4;
const VAL_OFF_VALUES: usize = 8;

fn read_u32(content: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(content[offset..offset + 4].try_into().unwrap())
}

fn write_u32(content: &mut [u8], offset: usize, value: u32) {
    content[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub struct ArrayFile {
    file: LogicalFile,
    slots_per_page: usize,
    values_per_page: usize,
}

impl ArrayFile {
    pub fn new(physical: Arc<PhysicalFile>, cache_size: usize) -> ArrayFile {
        let content = physical.version_file().page_size() - crate::buffer::BLOCK_HEADER_SIZE;
        let header_page = physical.data_page_id(0);
        let mut file = LogicalFile::new(physical, cache_size);
        file.set_header_page(header_page);
        ArrayFile {
            file,
            slots_per_page: content * 8 / (SLOT_SIZE * 8 + 1),
            values_per_page: (content - VAL_OFF_VALUES) / 4,
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

    /// Append one value to the row's array.
    pub fn append(&mut self, trans: &Transaction, rowid: RowId, value: u32) -> Result<()> {
        let (slot, index) = self.row_slot(trans, rowid)?;
        let offset = self.slot_offset(index);
        let (mut head, count, occupied) = {
            let content = self.file.page(slot).content();
            (
                read_u32(&content, offset),
                read_u32(&content, offset + 4),
                content[index / 8] & (1 << (index % 8)) != 0,
            )
        };
        if !occupied {
            head = INVALID_PAGE_ID;
        }
        self.file.detach_page(slot);

        // Extend the chain when the row is new or its tail page is full.
        let head = if head == INVALID_PAGE_ID {
            self.fresh_value_page(trans)?
        } else {
            if count > 0 && count as usize % self.values_per_page == 0 {
                let tail = self.tail_page(trans, head)?;
                let fresh = self.fresh_value_page(trans)?;
                let slot = self.file.attach_page(trans, tail, None)?;
                {
                    let page = self.file.page_mut(slot);
                    write_u32(&mut page.content_mut(), VAL_OFF_NEXT, fresh);
                }
                self.file.detach_page(slot);
            }
            head
        };

        let tail = self.tail_page(trans, head)?;
        let slot = self.file.attach_page(trans, tail, None)?;
        {
            let page = self.file.page_mut(slot);
            let mut content = page.content_mut();
            let in_page = read_u32(&content, VAL_OFF_COUNT) as usize;
            write_u32(&mut content, VAL_OFF_VALUES + in_page * 4, value);
            write_u32(&mut content, VAL_OFF_COUNT, in_page as u32 + 1);
        }
        self.file.detach_page(slot);

        let (slot, index) = self.row_slot(trans, rowid)?;
        {
            let page = self.file.page_mut(slot);
            let mut content = page.content_mut();
            content[index / 8] |= 1 << (index % 8);
            write_u32(&mut content, offset, head);
            write_u32(&mut content, offset + 4, count + 1);
        }
        self.file.detach_page(slot);
        Ok(())
    }

    fn fresh_value_page(&mut self, trans: &Transaction) -> Result<PageId> {
        let fresh = self.file.physical().allocate_page(trans)?;
        let slot = self.file.attach_page(trans, fresh, None)?;
        {
            let page = self.file.page_mut(slot);
            let mut content = page.content_mut();
            content.fill(0);
            write_u32(&mut content, VAL_OFF_NEXT, INVALID_PAGE_ID);
        }
        self.file.detach_page(slot);
        Ok(fresh)
    }

    fn tail_page(&mut self, trans: &Transaction, head: PageId) -> Result<PageId> {
        let mut current = head;
        loop {
            let slot = self.file.attach_page(trans, current, None)?;
            let next = read_u32(&self.file.page(slot).content(), VAL_OFF_NEXT);
            self.file.detach_page(slot);
            if next == INVALID_PAGE_ID {
                return Ok(current);
            }
            current = next;
        }
    }

    /// The row's values in append order; empty when nothing is stored.
    pub fn values(&mut self, trans: &Transaction, rowid: RowId) -> Result<Vec<u32>> {
        let mut result = Vec::new();
        let page_index = (1 + rowid as usize / self.slots_per_page) as u32;
        let page_id = self.file.physical().data_page_id(page_index);
        if !self.file.physical().is_allocated(page_id)? {
            return Ok(result);
        }
        let (slot, index) = self.row_slot(trans, rowid)?;
        let offset = self.slot_offset(index);
        let (head, occupied) = {
            let content = self.file.page(slot).content();
            (
                read_u32(&content, offset),
                content[index / 8] & (1 << (index % 8)) != 0,
            )
        };
        self.file.detach_page(slot);
        if !occupied {
            return Ok(result);
        }
        let mut current = head;
        while current != INVALID_PAGE_ID {
            trans.check_cancel()?;
            let slot = self.file.attach_page(trans, current, None)?;
            {
                let content = self.file.page(slot).content();
                let in_page = read_u32(&content, VAL_OFF_COUNT) as usize;
                for i in 0..in_page {
                    result.push(read_u32(&content, VAL_OFF_VALUES + i * 4));
                }
                current = read_u32(&content, VAL_OFF_NEXT);
            }
            self.file.detach_page(slot);
        }
        Ok(result)
    }

    /// Drop the row's array, freeing its value pages at the next flush.
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
            let next = read_u32(&self.file.page(slot).content(), VAL_OFF_NEXT);
            self.file.free_page(slot);
            current = next;
        }
        Ok(())
    }
}
