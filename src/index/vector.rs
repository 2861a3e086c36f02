// Document metadata vector.
//
// Dense by document id: each slot holds (rowid, document length), with a
// null bitmap at the head of every slot page. The header page carries the
// global counts and the per-unit partitioning array that keeps inverted
// units of comparable cumulative length.

use std::sync::Arc;

use crate::common::{
    DocumentId, PageId, ParameterU64, RowId, Transaction,
};
use crate::error::{DbError, Result};
use crate::logical::{LogicalFile, OpenMode, PageSlot};
use crate::physical::PhysicalFile;

/// Cap on a unit's cumulative document length before the insert unit moves.
static MAX_DOCUMENT_LENGTH: ParameterU64 =
    ParameterU64::new("Inverted_MaxDocumentLength", 3 << 30);

/// Bytes per element: (rowid, document length).
const ELEMENT_SIZE: usize = 8;

// Header page offsets.
const OFF_VERSION: usize = 0;
const OFF_DOCUMENT_COUNT: usize = 4;
const OFF_MAX_PAGE_ID: usize = 8;
const OFF_LAST_DOCUMENT_ID: usize = 12;
const OFF_TOTAL_DOCUMENT_LENGTH: usize = 16;
const OFF_LIST_COUNT: usize = 24;
const OFF_UNIT_COUNT: usize = 28;
const OFF_INSERT_UNIT: usize = 32;
const OFF_MAX_DOCUMENT_LENGTH: usize = 40;
const OFF_UNITS: usize = 48;

// Per-unit array entry: {document_count u32, list_count u32,
// total_document_length u64}.
const UNIT_ENTRY_SIZE: usize = 16;

const CURRENT_VERSION: u32 = 1;

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

pub struct DocumentVectorFile {
    file: LogicalFile,
    unit_count: u32,
    /// Slots per slot page, leaving room for the null bitmap.
    slots_per_page: usize,
}

impl DocumentVectorFile {
    pub fn new(physical: Arc<PhysicalFile>, cache_size: usize, unit_count: u32) -> DocumentVectorFile {
        // One null bit plus one element per slot.
        let content = physical.version_file().page_size() - crate::buffer::BLOCK_HEADER_SIZE;
        let slots_per_page = content * 8 / (ELEMENT_SIZE * 8 + 1);
        let header_page = physical.data_page_id(0);
        let mut file = LogicalFile::new(physical, cache_size);
        file.set_header_page(header_page);
        DocumentVectorFile {
            file,
            unit_count: unit_count.max(1),
            slots_per_page,
        }
    }

    pub fn create(&mut self, trans: &Transaction) -> Result<()> {
        self.file.physical().create(trans)?;
        self.file.physical().allocate_at(trans, 0)?;
        self.file.open(trans, OpenMode::Update);
        self.initialize_header_page(trans)?;
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

    pub fn destroy(&mut self, trans: &Transaction) -> Result<()> {
        self.file.physical().destroy(trans)
    }

    pub fn flush(&mut self, trans: &Transaction) -> Result<()> {
        self.file.flush_all_pages(trans)
    }

    /// Roll back attached modifications after a failed statement.
    pub fn recover_all_pages(&mut self) {
        self.file.recover_all_pages();
    }

    fn header(&mut self, trans: &Transaction) -> Result<PageSlot> {
        let page = self.file.physical().data_page_id(0);
        self.file.attach_page(trans, page, None)
    }

    fn initialize_header_page(&mut self, trans: &Transaction) -> Result<()> {
        let unit_count = self.unit_count;
        let slot = self.header(trans)?;
        {
            let page = self.file.page_mut(slot);
            let mut content = page.content_mut();
            content.fill(0);
            write_u32(&mut content, OFF_VERSION, CURRENT_VERSION);
            write_u32(&mut content, OFF_UNIT_COUNT, unit_count);
            write_u64(
                &mut content,
                OFF_MAX_DOCUMENT_LENGTH,
                MAX_DOCUMENT_LENGTH.get(),
            );
        }
        self.file.detach_page(slot);
        Ok(())
    }

    /// Insert a document's metadata. Document ids grow monotonically; the
    /// header's last-document-id follows every insert.
    pub fn insert(
        &mut self,
        trans: &Transaction,
        doc_id: DocumentId,
        unit: u32,
        rowid: RowId,
        document_length: u32,
    ) -> Result<()> {
        let (page_id, slot_index) = self.locate(trans, doc_id)?;
        let slot = self.file.attach_page(trans, page_id, None)?;
        let offset = self.element_offset(slot_index);
        {
            let page = self.file.page_mut(slot);
            let mut content = page.content_mut();
            content[slot_index / 8] |= 1 << (slot_index % 8);
            write_u32(&mut content, offset, rowid);
            write_u32(&mut content, offset + 4, document_length);
        }
        self.file.detach_page(slot);

        let unit_count = self.unit_count;
        if unit >= unit_count {
            return Err(DbError::InvalidArgument(format!(
                "unit {unit} out of {unit_count}"
            )));
        }
        let header = self.header(trans)?;
        {
            let page = self.file.page_mut(header);
            let mut content = page.content_mut();
            let count = read_u32(&content, OFF_DOCUMENT_COUNT) + 1;
            write_u32(&mut content, OFF_DOCUMENT_COUNT, count);
            let total =
                read_u64(&content, OFF_TOTAL_DOCUMENT_LENGTH) + document_length as u64;
            write_u64(&mut content, OFF_TOTAL_DOCUMENT_LENGTH, total);
            write_u32(&mut content, OFF_LAST_DOCUMENT_ID, doc_id);

            let unit_offset = OFF_UNITS + unit as usize * UNIT_ENTRY_SIZE;
            let unit_docs = read_u32(&content, unit_offset) + 1;
            write_u32(&mut content, unit_offset, unit_docs);
            let unit_total =
                read_u64(&content, unit_offset + 8) + document_length as u64;
            write_u64(&mut content, unit_offset + 8, unit_total);
        }
        self.file.detach_page(header);
        Ok(())
    }

    /// Remove a document's metadata. Quietly does nothing when the slot
    /// holds no value.
    pub fn expunge(&mut self, trans: &Transaction, doc_id: DocumentId, unit: u32) -> Result<()> {
        let (page_id, slot_index) = self.locate(trans, doc_id)?;
        let mut removed_length: Option<u32> = None;
        let slot = self.file.attach_page(trans, page_id, None)?;
        let offset = self.element_offset(slot_index);
        {
            let page = self.file.page_mut(slot);
            let occupied = {
                let content = page.content();
                content[slot_index / 8] & (1 << (slot_index % 8)) != 0
            };
            if occupied {
                let mut content = page.content_mut();
                removed_length = Some(read_u32(&content, offset + 4));
                content[slot_index / 8] &= !(1 << (slot_index % 8));
                write_u32(&mut content, offset, 0);
                write_u32(&mut content, offset + 4, 0);
            }
        }
        self.file.detach_page(slot);

        if let Some(length) = removed_length {
            let header = self.header(trans)?;
            {
                let page = self.file.page_mut(header);
                let mut content = page.content_mut();
                let count = read_u32(&content, OFF_DOCUMENT_COUNT) - 1;
                write_u32(&mut content, OFF_DOCUMENT_COUNT, count);
                let total = read_u64(&content, OFF_TOTAL_DOCUMENT_LENGTH) - length as u64;
                write_u64(&mut content, OFF_TOTAL_DOCUMENT_LENGTH, total);

                let unit_offset = OFF_UNITS + unit as usize * UNIT_ENTRY_SIZE;
                let unit_docs = read_u32(&content, unit_offset) - 1;
                write_u32(&mut content, unit_offset, unit_docs);
                let unit_total = read_u64(&content, unit_offset + 8) - length as u64;
                write_u64(&mut content, unit_offset + 8, unit_total);
            }
            self.file.detach_page(header);
        }
        Ok(())
    }

    /// Look up a document. Returns `None` when nothing is stored.
    pub fn find(
        &mut self,
        trans: &Transaction,
        doc_id: DocumentId,
    ) -> Result<Option<(RowId, u32)>> {
        let page_index = 1 + doc_id as usize / self.slots_per_page;
        let page_id = self.file.physical().data_page_id(page_index as u32);
        if !self.file.physical().is_allocated(page_id)? {
            return Ok(None);
        }
        let slot_index = doc_id as usize % self.slots_per_page;
        let slot = self.file.attach_page(trans, page_id, None)?;
        let found = {
            let page = self.file.page(slot);
            let content = page.content();
            if content[slot_index / 8] & (1 << (slot_index % 8)) != 0 {
                let offset = self.element_offset(slot_index);
                Some((read_u32(&content, offset), read_u32(&content, offset + 4)))
            } else {
                None
            }
        };
        self.file.detach_page(slot);
        Ok(found)
    }

    fn locate(&mut self, trans: &Transaction, doc_id: DocumentId) -> Result<(PageId, usize)> {
        let page_index = (1 + doc_id as usize / self.slots_per_page) as u32;
        let page_id = self.file.physical().allocate_at(trans, page_index)?;
        Ok((page_id, doc_id as usize % self.slots_per_page))
    }

    fn element_offset(&self, slot_index: usize) -> usize {
        let bitmap_bytes = self.slots_per_page.div_ceil(8);
        bitmap_bytes + slot_index * ELEMENT_SIZE
    }

    // ---- header accessors ---------------------------------------------

    fn header_u32(&mut self, trans: &Transaction, offset: usize) -> Result<u32> {
        let header = self.header(trans)?;
        let value = read_u32(&self.file.page(header).content(), offset);
        self.file.detach_page(header);
        Ok(value)
    }

    fn header_u64(&mut self, trans: &Transaction, offset: usize) -> Result<u64> {
        let header = self.header(trans)?;
        let value = read_u64(&self.file.page(header).content(), offset);
        self.file.detach_page(header);
        Ok(value)
    }

    pub fn document_count(&mut self, trans: &Transaction) -> Result<u32> {
        self.header_u32(trans, OFF_DOCUMENT_COUNT)
    }

    pub fn last_document_id(&mut self, trans: &Transaction) -> Result<DocumentId> {
        self.header_u32(trans, OFF_LAST_DOCUMENT_ID)
    }

    pub fn total_document_length(&mut self, trans: &Transaction) -> Result<u64> {
        self.header_u64(trans, OFF_TOTAL_DOCUMENT_LENGTH)
    }

    pub fn average_document_length(&mut self, trans: &Transaction) -> Result<u64> {
        let count = self.document_count(trans)? as u64;
        let total = self.total_document_length(trans)?;
        Ok(if count == 0 { 0 } else { total / count })
    }

    pub fn list_count(&mut self, trans: &Transaction) -> Result<u32> {
        self.header_u32(trans, OFF_LIST_COUNT)
    }

    pub fn increment_list_count(&mut self, trans: &Transaction, unit: u32) -> Result<()> {
        let header = self.header(trans)?;
        {
            let page = self.file.page_mut(header);
            let mut content = page.content_mut();
            let count = read_u32(&content, OFF_LIST_COUNT) + 1;
            write_u32(&mut content, OFF_LIST_COUNT, count);
            let unit_offset = OFF_UNITS + unit as usize * UNIT_ENTRY_SIZE;
            let unit_lists = read_u32(&content, unit_offset + 4) + 1;
            write_u32(&mut content, unit_offset + 4, unit_lists);
        }
        self.file.detach_page(header);
        Ok(())
    }

    pub fn unit_count(&mut self, trans: &Transaction) -> Result<u32> {
        self.header_u32(trans, OFF_UNIT_COUNT)
    }

    pub fn insert_unit(&mut self, trans: &Transaction) -> Result<u32> {
        self.header_u32(trans, OFF_INSERT_UNIT)
    }

    pub fn unit_document_count(&mut self, trans: &Transaction, unit: u32) -> Result<u32> {
        self.header_u32(trans, OFF_UNITS + unit as usize * UNIT_ENTRY_SIZE)
    }

    pub fn unit_total_document_length(
        &mut self,
        trans: &Transaction,
        unit: u32,
    ) -> Result<u64> {
        self.header_u64(trans, OFF_UNITS + unit as usize * UNIT_ENTRY_SIZE + 8)
    }

    /// Check the insert unit against the length cap and advance it when the
    /// current unit overflowed. When every unit overflows the cap doubles
    /// until unit 0 fits again. Returns true when the unit changed.
    pub fn check_insert_unit(&mut self, trans: &Transaction) -> Result<bool> {
        if self.unit_count <= 1 {
            return Ok(false);
        }
        let header = self.header(trans)?;
        let mut changed = false;
        {
            let page = self.file.page_mut(header);
            let (insert_unit, unit_count, mut max_len) = {
                let content = page.content();
                (
                    read_u32(&content, OFF_INSERT_UNIT),
                    read_u32(&content, OFF_UNIT_COUNT),
                    read_u64(&content, OFF_MAX_DOCUMENT_LENGTH),
                )
            };
            let unit_total = |content: &[u8], unit: u32| -> u64 {
                read_u64(content, OFF_UNITS + unit as usize * UNIT_ENTRY_SIZE + 8)
            };
            let current_total = unit_total(&page.content(), insert_unit);
            if current_total > max_len {
                // The insert unit overflowed; find one with room to spare.
                let mut target = unit_count;
                {
                    let content = page.content();
                    for unit in 0..unit_count {
                        if unit_total(&content, unit) < max_len / 10 * 9 {
                            target = unit;
                            break;
                        }
                    }
                }
                changed = true;
                let mut content = page.content_mut();
                if target == unit_count {
                    // Every unit is over the cap; double it until unit 0
                    // has room again.
                    target = 0;
                    while unit_total(&content, 0) > max_len {
                        max_len *= 2;
                    }
                    write_u64(&mut content, OFF_MAX_DOCUMENT_LENGTH, max_len);
                }
                write_u32(&mut content, OFF_INSERT_UNIT, target);
            }
        }
        self.file.detach_page(header);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferPool, BufferPoolConfig};
    use crate::common::{set_parameter, IsolationLevel};
    use crate::physical::PhysicalFileConfig;
    use crate::version::{ActiveSnapshots, VersionFile, VersionFileConfig};
    use tempfile::TempDir;

    fn setup(dir: &TempDir, units: u32) -> (DocumentVectorFile, Transaction) {
        let pool = BufferPool::new(BufferPoolConfig {
            capacity: 64,
            page_size: 512,
        });
        let version = Arc::new(
            VersionFile::new(
                VersionFileConfig {
                    file_id: 11,
                    page_size: 512,
                    path: dir.path().join("DocID"),
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
        let mut file = DocumentVectorFile::new(physical, 8, units);
        file.create(&trans).unwrap();
        file.open(&trans, OpenMode::Update).unwrap();
        (file, trans)
    }

    #[test]
    fn insert_find_expunge() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir, 1);
        file.insert(&trans, 1, 0, 100, 40).unwrap();
        file.insert(&trans, 2, 0, 101, 60).unwrap();

        assert_eq!(file.find(&trans, 1).unwrap(), Some((100, 40)));
        assert_eq!(file.find(&trans, 3).unwrap(), None);
        assert_eq!(file.document_count(&trans).unwrap(), 2);
        assert_eq!(file.total_document_length(&trans).unwrap(), 100);
        assert_eq!(file.last_document_id(&trans).unwrap(), 2);
        assert_eq!(file.average_document_length(&trans).unwrap(), 50);

        file.expunge(&trans, 1, 0).unwrap();
        assert_eq!(file.find(&trans, 1).unwrap(), None);
        assert_eq!(file.document_count(&trans).unwrap(), 1);
        assert_eq!(file.total_document_length(&trans).unwrap(), 60);
    }

    #[test]
    fn per_unit_counts_follow_inserts() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir, 3);
        file.insert(&trans, 1, 0, 100, 10).unwrap();
        file.insert(&trans, 2, 1, 101, 20).unwrap();
        file.insert(&trans, 3, 1, 102, 30).unwrap();
        assert_eq!(file.unit_document_count(&trans, 0).unwrap(), 1);
        assert_eq!(file.unit_document_count(&trans, 1).unwrap(), 2);
        assert_eq!(file.unit_total_document_length(&trans, 1).unwrap(), 50);
        assert_eq!(file.unit_document_count(&trans, 2).unwrap(), 0);
    }

    #[test]
    fn insert_unit_advances_and_cap_doubles() {
        set_parameter("Inverted_MaxDocumentLength", "100");
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir, 2);

        // Unit 0 overflows; unit 1 has room.
        file.insert(&trans, 1, 0, 100, 150).unwrap();
        assert!(file.check_insert_unit(&trans).unwrap());
        assert_eq!(file.insert_unit(&trans).unwrap(), 1);

        // Both overflow: the cap doubles until unit 0 fits and insertion
        // returns there.
        file.insert(&trans, 2, 1, 101, 150).unwrap();
        assert!(file.check_insert_unit(&trans).unwrap());
        assert_eq!(file.insert_unit(&trans).unwrap(), 0);
        assert!(!file.check_insert_unit(&trans).unwrap());
    }

    #[test]
    fn counts_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir, 1);
        file.insert(&trans, 5, 0, 200, 33).unwrap();
        file.close(&trans).unwrap();

        file.open(&trans, OpenMode::Update).unwrap();
        assert_eq!(file.document_count(&trans).unwrap(), 1);
        file.insert(&trans, 6, 0, 201, 7).unwrap();
        assert_eq!(file.document_count(&trans).unwrap(), 2);
        assert_eq!(file.total_document_length(&trans).unwrap(), 40);
        assert_eq!(file.unit_document_count(&trans, 0).unwrap(), 2);
        file.close(&trans).unwrap();
    }

    #[test]
    fn insert_after_recovery_updates_counts() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir, 2);
        file.insert(&trans, 1, 0, 100, 10).unwrap();
        file.flush(&trans).unwrap();

        // A statement abort throws the attached pages away; the next
        // insert still keeps the global and per-unit counts consistent.
        file.recover_all_pages();
        file.insert(&trans, 2, 1, 101, 20).unwrap();
        assert_eq!(file.document_count(&trans).unwrap(), 2);
        assert_eq!(file.total_document_length(&trans).unwrap(), 30);
        assert_eq!(file.unit_document_count(&trans, 0).unwrap(), 1);
        assert_eq!(file.unit_document_count(&trans, 1).unwrap(), 1);
        assert_eq!(file.last_document_id(&trans).unwrap(), 2);
    }

    #[test]
    fn list_count_per_unit() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir, 2);
        file.increment_list_count(&trans, 0).unwrap();
        file.increment_list_count(&trans, 1).unwrap();
        file.increment_list_count(&trans, 1).unwrap();
        assert_eq!(file.list_count(&trans).unwrap(), 3);
    }
}
