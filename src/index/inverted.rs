// Inverted file shell: stores each term's posting list across chained data
// pages, with a term directory chained from the header. Batch deletions go
// through an expunge ID map merged into the lists afterwards.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::common::{DocumentId, PageId, Transaction, INVALID_PAGE_ID};
use crate::error::Result;
use crate::fulltext::PostingList;
use crate::logical::{LogicalFile, OpenMode, PageSlot};
use crate::physical::PhysicalFile;

// Header page: {first_directory u32, list_count u32}.
const OFF_FIRST_DIRECTORY: usize = 0;
const OFF_LIST_COUNT: usize = 4;

// Directory page: {next u32, count u32, used u32, entries...}.
// Entry: {term_len u16, head u32, term bytes}.
const DIR_OFF_NEXT: usize = 0;
const DIR_OFF_COUNT: usize = 4;
const DIR_OFF_USED: usize = 8;
const DIR_OFF_ENTRIES: usize = 12;

// Data page: {next u32, len u32, bytes}.
const DATA_OFF_NEXT: usize = 0;
const DATA_OFF_LEN: usize = 4;
const DATA_OFF_BYTES: usize = 8;

fn read_u16(content: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(content[offset..offset + 2].try_into().unwrap())
}

fn write_u16(content: &mut [u8], offset: usize, value: u16) {
    content[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn read_u32(content: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(content[offset..offset + 4].try_into().unwrap())
}

fn write_u32(content: &mut [u8], offset: usize, value: u32) {
    content[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub struct InvertedFile {
    file: LogicalFile,
    content_size: usize,
}

impl InvertedFile {
    pub fn new(physical: Arc<PhysicalFile>, cache_size: usize) -> InvertedFile {
        let content_size =
            physical.version_file().page_size() - crate::buffer::BLOCK_HEADER_SIZE;
        let header_page = physical.data_page_id(0);
        let mut file = LogicalFile::new(physical, cache_size);
        file.set_header_page(header_page);
        InvertedFile { file, content_size }
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

    pub fn destroy(&mut self, trans: &Transaction) -> Result<()> {
        self.file.physical().destroy(trans)
    }

    fn header(&mut self, trans: &Transaction) -> Result<PageSlot> {
        let page = self.file.physical().data_page_id(0);
        self.file.attach_page(trans, page, None)
    }

    pub fn list_count(&mut self, trans: &Transaction) -> Result<u32> {
        let header = self.header(trans)?;
        let count = read_u32(&self.file.page(header).content(), OFF_LIST_COUNT);
        self.file.detach_page(header);
        Ok(count)
    }

    /// Directory position of `term`: (directory page, entry offset).
    fn find_entry(
        &mut self,
        trans: &Transaction,
        term: &str,
    ) -> Result<Option<(PageId, usize)>> {
        let header = self.header(trans)?;
        let mut dir = read_u32(&self.file.page(header).content(), OFF_FIRST_DIRECTORY);
        self.file.detach_page(header);
        while dir != INVALID_PAGE_ID {
            trans.check_cancel()?;
            let slot = self.file.attach_page(trans, dir, None)?;
            let (found, next) = {
                let content = self.file.page(slot).content();
                let count = read_u32(&content, DIR_OFF_COUNT) as usize;
                let mut offset = DIR_OFF_ENTRIES;
                let mut found = None;
                for _ in 0..count {
                    let term_len = read_u16(&content, offset) as usize;
                    let bytes = &content[offset + 6..offset + 6 + term_len];
                    if bytes == term.as_bytes() {
                        found = Some(offset);
                        break;
                    }
                    offset += 6 + term_len;
                }
                (found, read_u32(&content, DIR_OFF_NEXT))
            };
            self.file.detach_page(slot);
            if let Some(offset) = found {
                return Ok(Some((dir, offset)));
            }
            dir = next;
        }
        Ok(None)
    }

    /// Create a directory entry for `term` with no data chain yet.
    fn create_entry(&mut self, trans: &Transaction, term: &str) -> Result<(PageId, usize)> {
        let entry_size = 6 + term.len();
        let header = self.header(trans)?;
        let first = read_u32(&self.file.page(header).content(), OFF_FIRST_DIRECTORY);
        self.file.detach_page(header);

        // Find a directory page with room, remembering the chain tail.
        let mut dir = first;
        let mut tail = INVALID_PAGE_ID;
        while dir != INVALID_PAGE_ID {
            let slot = self.file.attach_page(trans, dir, None)?;
            let (used, next) = {
                let content = self.file.page(slot).content();
                (
                    read_u32(&content, DIR_OFF_USED) as usize,
                    read_u32(&content, DIR_OFF_NEXT),
                )
            };
            if DIR_OFF_ENTRIES + used + entry_size <= self.content_size {
                let offset = DIR_OFF_ENTRIES + used;
                {
                    let page = self.file.page_mut(slot);
                    let mut content = page.content_mut();
                    write_u16(&mut content, offset, term.len() as u16);
                    write_u32(&mut content, offset + 2, INVALID_PAGE_ID);
                    content[offset + 6..offset + 6 + term.len()]
                        .copy_from_slice(term.as_bytes());
                    let count = read_u32(&content, DIR_OFF_COUNT) + 1;
                    write_u32(&mut content, DIR_OFF_COUNT, count);
                    write_u32(&mut content, DIR_OFF_USED, (used + entry_size) as u32);
                }
                self.file.detach_page(slot);
                self.bump_list_count(trans)?;
                return Ok((dir, offset));
            }
            self.file.detach_page(slot);
            tail = dir;
            dir = next;
        }

        // Chain a fresh directory page.
        let fresh = self.file.physical().allocate_page(trans)?;
        let slot = self.file.attach_page(trans, fresh, None)?;
        {
            let page = self.file.page_mut(slot);
            let mut content = page.content_mut();
            content.fill(0);
            write_u32(&mut content, DIR_OFF_NEXT, INVALID_PAGE_ID);
            write_u32(&mut content, DIR_OFF_COUNT, 1);
            write_u32(&mut content, DIR_OFF_USED, entry_size as u32);
            write_u16(&mut content, DIR_OFF_ENTRIES, term.len() as u16);
            write_u32(&mut content, DIR_OFF_ENTRIES + 2, INVALID_PAGE_ID);
            content[DIR_OFF_ENTRIES + 6..DIR_OFF_ENTRIES + 6 + term.len()]
                .copy_from_slice(term.as_bytes());
        }
        self.file.detach_page(slot);

        if tail == INVALID_PAGE_ID {
            let header = self.header(trans)?;
            {
                let page = self.file.page_mut(header);
                write_u32(&mut page.content_mut(), OFF_FIRST_DIRECTORY, fresh);
            }
            self.file.detach_page(header);
        } else {
            let slot = self.file.attach_page(trans, tail, None)?;
            {
                let page = self.file.page_mut(slot);
                write_u32(&mut page.content_mut(), DIR_OFF_NEXT, fresh);
            }
            self.file.detach_page(slot);
        }
        self.bump_list_count(trans)?;
        Ok((fresh, DIR_OFF_ENTRIES))
    }

    fn bump_list_count(&mut self, trans: &Transaction) -> Result<()> {
        let header = self.header(trans)?;
        {
            let page = self.file.page_mut(header);
            let mut content = page.content_mut();
            let count = read_u32(&content, OFF_LIST_COUNT) + 1;
            write_u32(&mut content, OFF_LIST_COUNT, count);
        }
        self.file.detach_page(header);
        Ok(())
    }

    fn entry_head(&mut self, trans: &Transaction, entry: (PageId, usize)) -> Result<PageId> {
        let slot = self.file.attach_page(trans, entry.0, None)?;
        let head = read_u32(&self.file.page(slot).content(), entry.1 + 2);
        self.file.detach_page(slot);
        Ok(head)
    }

    fn set_entry_head(
        &mut self,
        trans: &Transaction,
        entry: (PageId, usize),
        head: PageId,
    ) -> Result<()> {
        let slot = self.file.attach_page(trans, entry.0, None)?;
        {
            let page = self.file.page_mut(slot);
            write_u32(&mut page.content_mut(), entry.1 + 2, head);
        }
        self.file.detach_page(slot);
        Ok(())
    }

    /// Store (or replace) a term's posting list.
    pub fn store_list(
        &mut self,
        trans: &Transaction,
        term: &str,
        list: &PostingList,
    ) -> Result<()> {
        let entry = match self.find_entry(trans, term)? {
            Some(entry) => entry,
            None => self.create_entry(trans, term)?,
        };

        // Free the previous chain.
        let mut current = self.entry_head(trans, entry)?;
        while current != INVALID_PAGE_ID {
            let slot = self.file.attach_page(trans, current, None)?;
            let next = read_u32(&self.file.page(slot).content(), DATA_OFF_NEXT);
            self.file.free_page(slot);
            current = next;
        }

        let bytes = bincode::serde::encode_to_vec(list, bincode::config::standard())?;
        let capacity = self.content_size - DATA_OFF_BYTES;
        let mut head = INVALID_PAGE_ID;
        let mut previous = INVALID_PAGE_ID;
        for chunk in bytes.chunks(capacity.max(1)) {
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
        self.set_entry_head(trans, entry, head)
    }

    /// Load a term's posting list; `None` for unknown terms.
    pub fn load_list(&mut self, trans: &Transaction, term: &str) -> Result<Option<PostingList>> {
        let Some(entry) = self.find_entry(trans, term)? else {
            return Ok(None);
        };
        let mut current = self.entry_head(trans, entry)?;
        if current == INVALID_PAGE_ID {
            return Ok(Some(PostingList::default()));
        }
        let mut bytes = Vec::new();
        while current != INVALID_PAGE_ID {
            trans.check_cancel()?;
            let slot = self.file.attach_page(trans, current, None)?;
            {
                let content = self.file.page(slot).content();
                let len = read_u32(&content, DATA_OFF_LEN) as usize;
                bytes.extend_from_slice(&content[DATA_OFF_BYTES..DATA_OFF_BYTES + len]);
                current = read_u32(&content, DATA_OFF_NEXT);
            }
            self.file.detach_page(slot);
        }
        let (list, _) = bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        Ok(Some(list))
    }

    /// Apply batch deletions: drop every expunged document from the term's
    /// stored list.
    pub fn merge_expunge(
        &mut self,
        trans: &Transaction,
        term: &str,
        expunged: &ExpungeIdMap,
    ) -> Result<()> {
        let Some(mut list) = self.load_list(trans, term)? else {
            return Ok(());
        };
        let before = list.postings.len();
        list.postings.retain(|p| !expunged.contains(p.doc_id));
        if list.postings.len() != before {
            self.store_list(trans, term, &list)?;
        }
        Ok(())
    }
}

/// Document ids deleted while a batch insert was running; merged into the
/// stored lists after the batch lands.
#[derive(Debug, Clone, Default)]
pub struct ExpungeIdMap {
    ids: BTreeSet<DocumentId>,
}

impl ExpungeIdMap {
    pub fn new() -> ExpungeIdMap {
        ExpungeIdMap::default()
    }

    pub fn insert(&mut self, doc_id: DocumentId) {
        self.ids.insert(doc_id);
    }

    pub fn contains(&self, doc_id: DocumentId) -> bool {
        self.ids.contains(&doc_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ascending expunged ids.
    pub fn iter(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.ids.iter().copied()
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

    fn setup(dir: &TempDir) -> (InvertedFile, Transaction) {
        let pool = BufferPool::new(BufferPoolConfig {
            capacity: 256,
            page_size: 256,
        });
        let version = Arc::new(
            VersionFile::new(
                VersionFileConfig {
                    file_id: 71,
                    page_size: 256,
                    path: dir.path().join("FullText"),
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
        let mut file = InvertedFile::new(physical, 32);
        file.create(&trans).unwrap();
        file.open(&trans, OpenMode::Update).unwrap();
        (file, trans)
    }

    fn sample_list(ids: &[u32]) -> PostingList {
        let mut list = PostingList::new(1);
        for &id in ids {
            list.push(id, vec![id, id + 5]);
        }
        list
    }

    #[test]
    fn store_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        let list = sample_list(&[1, 4, 9]);
        file.store_list(&trans, "rust", &list).unwrap();
        assert_eq!(file.load_list(&trans, "rust").unwrap().unwrap(), list);
        assert!(file.load_list(&trans, "absent").unwrap().is_none());
        assert_eq!(file.list_count(&trans).unwrap(), 1);
    }

    #[test]
    fn replace_shrinks_and_grows() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        // Long list first: forces a multi-page chain at 256-byte pages.
        let long: Vec<u32> = (1..200).collect();
        file.store_list(&trans, "t", &sample_list(&long)).unwrap();
        assert_eq!(
            file.load_list(&trans, "t").unwrap().unwrap().document_count(),
            199
        );
        // Replace with a short one.
        file.store_list(&trans, "t", &sample_list(&[7])).unwrap();
        assert_eq!(
            file.load_list(&trans, "t").unwrap().unwrap().document_count(),
            1
        );
        assert_eq!(file.list_count(&trans).unwrap(), 1);
    }

    #[test]
    fn many_terms_spill_directory() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        for i in 0..40 {
            let term = format!("term-number-{i:04}");
            file.store_list(&trans, &term, &sample_list(&[i + 1])).unwrap();
        }
        for i in 0..40 {
            let term = format!("term-number-{i:04}");
            let list = file.load_list(&trans, &term).unwrap().unwrap();
            assert_eq!(list.postings[0].doc_id, i + 1);
        }
        assert_eq!(file.list_count(&trans).unwrap(), 40);
    }

    #[test]
    fn expunge_map_merges_into_list() {
        let dir = TempDir::new().unwrap();
        let (mut file, trans) = setup(&dir);
        file.store_list(&trans, "w", &sample_list(&[1, 2, 3, 4])).unwrap();
        let mut expunged = ExpungeIdMap::new();
        expunged.insert(2);
        expunged.insert(4);
        assert_eq!(expunged.iter().collect::<Vec<_>>(), vec![2, 4]);
        file.merge_expunge(&trans, "w", &expunged).unwrap();
        let list = file.load_list(&trans, "w").unwrap().unwrap();
        let ids: Vec<u32> = list.postings.iter().map(|p| p.doc_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
