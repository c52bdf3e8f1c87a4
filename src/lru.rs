//! Least-recently-used ordering over resident pages.
//!
//! Nodes are embedded per page (indexed by page number) rather than heap
//! allocated, so every operation is O(1) and the queue never allocates
//! after construction.

use crate::error::{PagingError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Link {
    prev: Option<usize>,
    next: Option<usize>,
}

/// Doubly linked recency queue, head = most recently used
pub struct LruQueue {
    // None means the page is not linked
    nodes: Vec<Option<Link>>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl LruQueue {
    pub fn new(total_pages: usize) -> Self {
        LruQueue {
            nodes: vec![None; total_pages],
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Most recently used page
    pub fn head(&self) -> Option<usize> {
        self.head
    }

    /// Least recently used page, the next eviction victim
    pub fn tail(&self) -> Option<usize> {
        self.tail
    }

    pub fn contains(&self, page: usize) -> bool {
        self.nodes.get(page).is_some_and(Option::is_some)
    }

    /// Link a page that is not yet in the queue at the head
    pub fn insert_new(&mut self, page: usize) -> Result<()> {
        match self.nodes.get(page) {
            None => {
                return Err(PagingError::AddressOutOfRange {
                    page,
                    total_pages: self.nodes.len(),
                });
            }
            Some(Some(_)) => {
                return Err(PagingError::InvariantViolation(format!(
                    "page {} is already linked in the LRU queue",
                    page
                )));
            }
            Some(None) => {}
        }
        self.push_front(page);
        Ok(())
    }

    /// Move a linked page to the head
    pub fn touch(&mut self, page: usize) -> Result<()> {
        if !self.contains(page) {
            return Err(PagingError::InvalidState { page });
        }
        if self.head == Some(page) {
            return Ok(());
        }
        self.unlink(page);
        self.push_front(page);
        Ok(())
    }

    /// Remove and return the least recently used page
    pub fn evict(&mut self) -> Result<usize> {
        let page = self.tail.ok_or(PagingError::QueueEmpty)?;
        self.unlink(page);
        Ok(page)
    }

    /// Pages from most to least recently used
    pub fn iter(&self) -> Iter<'_> {
        Iter { queue: self, cursor: self.head }
    }

    fn push_front(&mut self, page: usize) {
        let old_head = self.head;
        self.nodes[page] = Some(Link { prev: None, next: old_head });
        match old_head {
            Some(h) => self.set_prev(h, Some(page)),
            None => self.tail = Some(page),
        }
        self.head = Some(page);
        self.len += 1;
    }

    // caller guarantees `page` is linked
    fn unlink(&mut self, page: usize) {
        let Some(Link { prev, next }) = self.nodes[page].take() else {
            return;
        };
        match prev {
            Some(p) => self.set_next(p, next),
            None => self.head = next,
        }
        match next {
            Some(n) => self.set_prev(n, prev),
            None => self.tail = prev,
        }
        self.len -= 1;
    }

    // neighbours of a linked node are always linked themselves
    fn set_prev(&mut self, page: usize, prev: Option<usize>) {
        debug_assert!(self.nodes[page].is_some(), "page {} is not linked", page);
        if let Some(link) = self.nodes[page].as_mut() {
            link.prev = prev;
        }
    }

    fn set_next(&mut self, page: usize, next: Option<usize>) {
        debug_assert!(self.nodes[page].is_some(), "page {} is not linked", page);
        if let Some(link) = self.nodes[page].as_mut() {
            link.next = next;
        }
    }
}

pub struct Iter<'a> {
    queue: &'a LruQueue,
    cursor: Option<usize>,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let page = self.cursor?;
        self.cursor = self.queue.nodes[page].and_then(|link| link.next);
        Some(page)
    }
}
