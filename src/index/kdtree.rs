// KD-tree file: fixed-dimension points stored in chained entry pages, with
// an in-memory median-split tree built from per-dimension sorts for
// nearest-neighbor search.

use std::sync::Arc;

use crate::common::{RowId, Transaction, INVALID_PAGE_ID};
use crate::error::{DbError, Result};
use crate::logical::{LogicalFile, OpenMode, PageSlot};
use crate::physical::PhysicalFile;

// Header page: {dimension u32, entry_count u32, first u32, last u32}.
const OFF_DIMENSION: usize = 0;
const OFF_ENTRY_COUNT: usize = 4;
const OFF_FIRST: usize = 8;
const OFF_LAST: usize = 12;

// Entry page: {next u32, count u32, entries...}.
const ENT_OFF_NEXT: usize = 0;
const ENT_OFF_COUNT: usize = 4;
const ENT_OFF_ENTRIES: usize = 8;

fn read_u32(content: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(content[offset..offset + 4].try_into().unwrap())
}

fn write_u32(content: &mut [u8], offset: usize, value: u32) {
    content[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// One indexed point.
#[derive(Debug, Clone, PartialEq)]
pub struct KdEntry {
    pub rowid: RowId,
    pub point: Vec<f32>,
}

impl KdEntry {
    /// Ordering along one dimension, the comparator the median split sorts
    /// with.
    fn compare_dimension(&self, other: &KdEntry, dimension: usize) -> std::cmp::Ordering {
        self.point[dimension]
            .partial_cmp(&other.point[dimension])
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

pub struct KdTreeFile {
    file: LogicalFile,
    dimension: usize,
    entries_per_page: usize,
}

impl KdTreeFile {
    pub fn new(physical: Arc<PhysicalFile>, cache_size: usize, dimension: usize) -> KdTreeFile {
        let content = physical.version_file().page_size() - crate::buffer::BLOCK_HEADER_SIZE;
        let entry_size = 4 + dimension * 4;
        let header_page = physical.data_page_id(0);
        let mut file = LogicalFile::new(physical, cache_size);
        file.set_header_page(header_page);
        KdTreeFile {
            file,
            dimension,
            entries_per_page: (content - ENT_OFF_ENTRIES) / entry_size,
        }
    }

    pub fn create(&mut self, trans: &Transaction) -> Result<()> {
        self.file.physical().create(trans)?;
        self.file.physical().allocate_at(trans, 0)?;
        self.file.open(trans, OpenMode::Update);
        let dimension = self.dimension as u32;
        let header = self.header(trans)?;
        {
            let page = self.file.page_mut(header);
            let mut content = page.content_mut();
            content.fill(0);
            write_u32(&mut content, OFF_DIMENSION, dimension);
            write_u32(&mut content, OFF_FIRST, INVALID_PAGE_ID);
            write_u32(&mut content, OFF_LAST, INVALID_PAGE_ID);
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

    pub fn insert(&mut self, trans: &Transaction, entry: &KdEntry) -> Result<()> {
        if entry.point.len() != self.dimension {
            return Err(DbError::InvalidArgument(format!(
                "point of dimension {} in a {}-dimensional index",
                entry.point.len(),
                self.dimension
            )));
        }
        let (last, count_in_last) = {
            let header = self.header(trans)?;
            let last = read_u32(&self.file.page(header).content(), OFF_LAST);
            self.file.detach_page(header);
            match last {
                INVALID_PAGE_ID => (INVALID_PAGE_ID, self.entries_per_page),
                page => {
                    let slot = self.file.attach_page(trans, page, None)?;
                    let count =
                        read_u32(&self.file.page(slot).content(), ENT_OFF_COUNT) as usize;
                    self.file.detach_page(slot);
                    (page, count)
                }
            }
        };

        let target = if count_in_last >= self.entries_per_page {
            let fresh = self.file.physical().allocate_page(trans)?;
            let slot = self.file.attach_page(trans, fresh, None)?;
            {
                let page = self.file.page_mut(slot);
                let mut content = page.content_mut();
                content.fill(0);
                write_u32(&mut content, ENT_OFF_NEXT, INVALID_PAGE_ID);
            }
            self.file.detach_page(slot);
            if last != INVALID_PAGE_ID {
                let slot = self.file.attach_page(trans, last, None)?;
                {
                    let page = self.file.page_mut(slot);
                    write_u32(&mut page.content_mut(), ENT_OFF_NEXT, fresh);
                }
                self.file.detach_page(slot);
            }
            let header = self.header(trans)?;
            {
                let page = self.file.page_mut(header);
                let mut content = page.content_mut();
                if last == INVALID_PAGE_ID {
                    write_u32(&mut content, OFF_FIRST, fresh);
                }
                write_u32(&mut content, OFF_LAST, fresh);
            }
            self.file.detach_page(header);
            fresh
        } else {
            last
        };

        let entry_size = 4 + self.dimension * 4;
        let slot = self.file.attach_page(trans, target, None)?;
        {
            let page = self.file.page_mut(slot);
            let mut content = page.content_mut();
            let in_page = read_u32(&content, ENT_OFF_COUNT) as usize;
            let mut offset = ENT_OFF_ENTRIES + in_page * entry_size;
            write_u32(&mut content, offset, entry.rowid);
            offset += 4;
            for &v in &entry.point {
                content[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
                offset += 4;
            }
            write_u32(&mut content, ENT_OFF_COUNT, in_page as u32 + 1);
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

    /// Read back every stored entry in insertion order.
    pub fn load(&mut self, trans: &Transaction) -> Result<Vec<KdEntry>> {
        let mut entries = Vec::new();
        let mut current = {
            let header = self.header(trans)?;
            let first = read_u32(&self.file.page(header).content(), OFF_FIRST);
            self.file.detach_page(header);
            first
        };
        let entry_size = 4 + self.dimension * 4;
        while current != INVALID_PAGE_ID {
            trans.check_cancel()?;
            let slot = self.file.attach_page(trans, current, None)?;
            {
                let content = self.file.page(slot).content();
                let in_page = read_u32(&content, ENT_OFF_COUNT) as usize;
                for i in 0..in_page {
                    let mut offset = ENT_OFF_ENTRIES + i * entry_size;
                    let rowid = read_u32(&content, offset);
                    offset += 4;
                    let mut point = Vec::with_capacity(self.dimension);
                    for _ in 0..self.dimension {
                        point.push(f32::from_le_bytes(
                            content[offset..offset + 4].try_into().unwrap(),
                        ));
                        offset += 4;
                    }
                    entries.push(KdEntry { rowid, point });
                }
                current = read_u32(&content, ENT_OFF_NEXT);
            }
            self.file.detach_page(slot);
        }
        Ok(entries)
    }

    /// Build the in-memory search tree from the stored entries.
    pub fn build(&mut self, trans: &Transaction) -> Result<KdTree> {
        let mut entries = self.load(trans)?;
        let root = KdTree::build_node(&mut entries, 0, self.dimension);
        Ok(KdTree {
            dimension: self.dimension,
            root,
        })
    }
}

struct KdNode {
    entry: KdEntry,
    dimension: usize,
    left: Option<Box<KdNode>>,
    right: Option<Box<KdNode>>,
}

pub struct KdTree {
    dimension: usize,
    root: Option<Box<KdNode>>,
}

impl KdTree {
    fn build_node(entries: &mut [KdEntry], depth: usize, k: usize) -> Option<Box<KdNode>> {
        if entries.is_empty() {
            return None;
        }
        let dimension = depth % k;
        entries.sort_unstable_by(|a, b| a.compare_dimension(b, dimension));
        let median = entries.len() / 2;
        let entry = entries[median].clone();
        let (left, rest) = entries.split_at_mut(median);
        let right = &mut rest[1..];
        Some(Box::new(KdNode {
            entry,
            dimension,
            left: Self::build_node(left, depth + 1, k),
            right: Self::build_node(right, depth + 1, k),
        }))
    }

    /// The stored entry closest to `point` with its squared distance.
    pub fn nearest(&self, point: &[f32]) -> Option<(RowId, f32)> {
        debug_assert_eq!(point.len(), self.dimension);
        let mut best: Option<(RowId, f32)> = None;
        Self::search(&self.root, point, &mut best);
        best
    }

    fn search(node: &Option<Box<KdNode>>, point: &[f32], best: &mut Option<(RowId, f32)>) {
        let Some(n) = node else {
            return;
        };
        let distance = n
            .entry
            .point
            .iter()
            .zip(point)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>();
        if best.is_none() || distance < best.unwrap().1 {
            *best = Some((n.entry.rowid, distance));
        }
        let diff = point[n.dimension] - n.entry.point[n.dimension];
        let (near, far) = if diff < 0.0 {
            (&n.left, &n.right)
        } else {
            (&n.right, &n.left)
        };
        Self::search(near, point, best);
        // Only cross the split plane if the best candidate could be beaten.
        if diff * diff < best.unwrap().1 {
            Self::search(far, point, best);
        }
    }
}
