use crate::config::PagerConfig;
use crate::error::{PagingError, Result};

/// Represents the decomposed components of a Virtual Address
///
/// ```text
/// [31 ............ page_bits | page_bits-1 ........ 0]
/// |------- page number -------|-------- offset -------|
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAddress {
    pub va: u32,
    pub page: usize,
    pub offset: u32,
}

impl VirtualAddress {
    /// Decompose a raw VA, rejecting pages beyond the page table
    pub fn from_raw(va: u32, config: &PagerConfig) -> Result<Self> {
        let page = page_number(va, config.page_bits);
        if page >= config.total_pages {
            return Err(PagingError::AddressOutOfRange {
                page,
                total_pages: config.total_pages,
            });
        }
        Ok(VirtualAddress {
            va,
            page,
            offset: va & config.offset_mask(),
        })
    }
}

impl std::fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VA({}) = (p={}, w={})", self.va, self.page, self.offset)
    }
}

// page_bits may be 32, which a u32 shift cannot express
#[inline]
pub fn page_number(va: u32, page_bits: u32) -> usize {
    (va as u64 >> page_bits) as usize
}

/// Physical address of `va` once its page lives in `frame`
#[inline]
pub fn translate(va: &VirtualAddress, frame: usize, page_bits: u32) -> usize {
    (frame << page_bits) | va.offset as usize
}
