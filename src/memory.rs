use crate::config::PagerConfig;
use crate::error::{PagingError, Result};

/// Physical memory: `frame_count` frames of `page_size` bytes
pub struct PhysicalMemory {
    data: Box<[u8]>,
    page_bits: u32,
}

impl PhysicalMemory {
    /// Create a new physical memory initialized to all zeros
    pub fn new(config: &PagerConfig) -> Self {
        PhysicalMemory {
            data: vec![0u8; config.memory_size()].into_boxed_slice(),
            page_bits: config.page_bits,
        }
    }

    #[inline]
    pub fn read_byte(&self, address: usize) -> u8 {
        self.data[address]
    }

    #[inline]
    pub fn write_byte(&mut self, address: usize, value: u8) {
        self.data[address] = value;
    }

    /// Copy a whole page into a frame
    pub fn load_frame(&mut self, frame: usize, bytes: &[u8]) {
        let start = self.frame_to_address(frame);
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Current contents of a frame
    pub fn frame(&self, frame: usize) -> &[u8] {
        let start = self.frame_to_address(frame);
        &self.data[start..start + (1 << self.page_bits)]
    }

    /// Calculate the starting address of a frame
    #[inline]
    pub fn frame_to_address(&self, frame: usize) -> usize {
        frame << self.page_bits
    }
}

/// Backing store - the permanent home of every page
pub struct BackingStore {
    data: Vec<u8>,
    page_bits: u32,
    total_pages: usize,
}

impl BackingStore {
    /// Wrap `data`, which must hold exactly `total_pages * page_size` bytes
    pub fn new(data: Vec<u8>, config: &PagerConfig) -> Result<Self> {
        let expected = config.store_size();
        if data.len() != expected {
            return Err(PagingError::StoreSize { expected, actual: data.len() });
        }
        Ok(BackingStore {
            data,
            page_bits: config.page_bits,
            total_pages: config.total_pages,
        })
    }

    pub fn read_page(&self, page: usize) -> Result<&[u8]> {
        let range = self.page_range(page)?;
        Ok(&self.data[range])
    }

    pub fn write_page(&mut self, page: usize, bytes: &[u8]) -> Result<()> {
        let range = self.page_range(page)?;
        if bytes.len() != range.len() {
            return Err(PagingError::StoreSize {
                expected: range.len(),
                actual: bytes.len(),
            });
        }
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Read a byte straight from the store, bypassing paging
    pub fn read_byte(&self, offset: usize) -> Result<u8> {
        self.data.get(offset).copied().ok_or(PagingError::AddressOutOfRange {
            page: offset >> self.page_bits,
            total_pages: self.total_pages,
        })
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn page_range(&self, page: usize) -> Result<std::ops::Range<usize>> {
        if page >= self.total_pages {
            return Err(PagingError::AddressOutOfRange {
                page,
                total_pages: self.total_pages,
            });
        }
        let start = page << self.page_bits;
        Ok(start..start + (1 << self.page_bits))
    }
}
