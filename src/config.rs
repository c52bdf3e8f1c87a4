use crate::constants::*;
use crate::error::{PagingError, Result};

/// Geometry of the simulated machine, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerConfig {
    pub page_bits: u32,
    pub total_pages: usize,
    pub frame_count: usize,
}

impl PagerConfig {
    pub fn new(page_bits: u32, total_pages: usize, frame_count: usize) -> Result<Self> {
        let config = PagerConfig { page_bits, total_pages, frame_count };
        config.validate()?;
        Ok(config)
    }

    /// Build from a page size in bytes, which must be a power of two
    pub fn from_page_size(page_size: usize, total_pages: usize, frame_count: usize) -> Result<Self> {
        if !page_size.is_power_of_two() {
            return Err(PagingError::InvalidConfig(format!(
                "page size {} is not a power of two",
                page_size
            )));
        }
        Self::new(page_size.trailing_zeros(), total_pages, frame_count)
    }

    pub fn with_page_bits(mut self, page_bits: u32) -> Self {
        self.page_bits = page_bits;
        self
    }

    pub fn with_total_pages(mut self, total_pages: usize) -> Self {
        self.total_pages = total_pages;
        self
    }

    pub fn with_frame_count(mut self, frame_count: usize) -> Self {
        self.frame_count = frame_count;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_bits > VA_BITS {
            return Err(PagingError::InvalidConfig(format!(
                "page bits {} exceed a {}-bit address",
                self.page_bits, VA_BITS
            )));
        }
        if self.total_pages == 0 {
            return Err(PagingError::InvalidConfig("total pages must be non-zero".into()));
        }
        if self.frame_count == 0 || self.frame_count > self.total_pages {
            return Err(PagingError::InvalidConfig(format!(
                "frame count {} outside 1..={}",
                self.frame_count, self.total_pages
            )));
        }
        let max_pages = 1u64 << (VA_BITS - self.page_bits);
        if self.total_pages as u64 > max_pages {
            return Err(PagingError::InvalidConfig(format!(
                "{} pages of {} bytes exceed a {}-bit address space",
                self.total_pages,
                self.page_size(),
                VA_BITS
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        1 << self.page_bits
    }

    #[inline]
    pub fn offset_mask(&self) -> u32 {
        ((1u64 << self.page_bits) - 1) as u32
    }

    /// Bytes in the backing store
    pub fn store_size(&self) -> usize {
        self.total_pages * self.page_size()
    }

    /// Bytes in physical memory
    pub fn memory_size(&self) -> usize {
        self.frame_count * self.page_size()
    }
}

impl Default for PagerConfig {
    fn default() -> Self {
        PagerConfig {
            page_bits: PAGE_BITS,
            total_pages: TOTAL_PAGES,
            frame_count: FRAME_COUNT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let config = PagerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.page_size(), PAGE_SIZE);
        assert_eq!(config.store_size(), STORE_SIZE);
        assert_eq!(config.memory_size(), PM_SIZE);
        assert_eq!(config.offset_mask(), 0xFFF);
    }

    #[test]
    fn test_from_page_size() {
        let config = PagerConfig::from_page_size(4096, 8, 4).unwrap();
        assert_eq!(config.page_bits, 12);

        let err = PagerConfig::from_page_size(3000, 8, 4).unwrap_err();
        assert!(matches!(err, PagingError::InvalidConfig(_)));
    }

    #[test]
    fn test_frame_count_bounds() {
        assert!(PagerConfig::new(12, 8, 0).is_err());
        assert!(PagerConfig::new(12, 8, 9).is_err());
        assert!(PagerConfig::new(12, 8, 8).is_ok());
        assert!(PagerConfig::new(12, 8, 1).is_ok());
    }

    #[test]
    fn test_rejects_oversized_address_space() {
        // 2^20 pages of 2^13 bytes = 2^33
        assert!(PagerConfig::new(13, 1 << 20, 4).is_err());
        assert!(PagerConfig::new(12, 1 << 20, 4).is_ok());
    }

    #[test]
    fn test_page_size_one() {
        let config = PagerConfig::from_page_size(1, 8, 4).unwrap();
        assert_eq!(config.page_bits, 0);
        assert_eq!(config.page_size(), 1);
        assert_eq!(config.offset_mask(), 0);
        assert_eq!(config.store_size(), 8);
    }

    #[test]
    fn test_single_page_covers_whole_address_space() {
        let config = PagerConfig::new(32, 1, 1).unwrap();
        assert_eq!(config.offset_mask(), u32::MAX);
        assert!(PagerConfig::new(32, 2, 1).is_err());
        assert!(PagerConfig::new(33, 1, 1).is_err());
    }

    #[test]
    fn test_huge_page_count_is_an_error() {
        let err = PagerConfig::new(12, usize::MAX, 1).unwrap_err();
        assert!(matches!(err, PagingError::InvalidConfig(_)));
        assert!(PagerConfig::new(0, usize::MAX, usize::MAX).is_err());
        assert!(PagerConfig::new(12, (1 << 20) + 1, 1).is_err());
    }

    #[test]
    fn test_builder_methods() {
        let config = PagerConfig::default()
            .with_page_bits(8)
            .with_total_pages(32)
            .with_frame_count(2);
        assert_eq!(config, PagerConfig::new(8, 32, 2).unwrap());
    }
}
