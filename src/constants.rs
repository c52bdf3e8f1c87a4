// page geometry: 4 KiB pages, virtual address = [page number | offset]
pub const PAGE_BITS: u32 = 12;
pub const PAGE_SIZE: usize = 1 << PAGE_BITS;

// virtual addresses are u32
pub const VA_BITS: u32 = 32;

// 4 MiB backing store
pub const TOTAL_PAGES: usize = 1024;
pub const STORE_SIZE: usize = TOTAL_PAGES * PAGE_SIZE;

// 64 KiB physical memory
pub const FRAME_COUNT: usize = 16;
pub const PM_SIZE: usize = FRAME_COUNT * PAGE_SIZE;
