//! Error types for the paging engine

use thiserror::Error;

/// Result type alias for paging operations
pub type Result<T> = std::result::Result<T, PagingError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PagingError {
    /// Virtual address (or page number) lies beyond the page table
    #[error("address out of range: page {page} >= {total_pages} pages")]
    AddressOutOfRange { page: usize, total_pages: usize },

    /// Frame or dirty bit queried on a page that is not resident
    #[error("invalid state: page {page} is not present")]
    InvalidState { page: usize },

    /// Eviction requested from an empty LRU queue
    #[error("LRU queue is empty")]
    QueueEmpty,

    /// Page table, queue and frame accounting disagree
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Backing store or image does not match the configured geometry.
    /// This is the construction-time case of an out-of-range address: it is
    /// raised before any access is served and is never recoverable.
    #[error("store size mismatch: expected {expected} bytes, got {actual}")]
    StoreSize { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PagingError {
    /// Whether the caller can continue using the manager after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::AddressOutOfRange { .. })
    }
}
