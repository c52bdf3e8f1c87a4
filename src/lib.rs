pub mod config;
pub mod constants;
pub mod error;
pub mod harness;
pub mod io;
pub mod logging;
pub mod lru;
pub mod memory;
pub mod page_table;
pub mod translation;
pub mod vm_manager;

// Re-export commonly used items for convenience
pub use config::PagerConfig;
pub use error::{PagingError, Result};
pub use page_table::PageState;
pub use translation::VirtualAddress;
pub use vm_manager::{PagingStats, VmManager};
