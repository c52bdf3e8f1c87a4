use crate::error::{PagingError, Result};

/// Residency of a single virtual page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageState {
    #[default]
    Absent,
    Present { frame: usize, dirty: bool },
}

impl PageState {
    pub fn is_present(&self) -> bool {
        matches!(self, PageState::Present { .. })
    }

    pub fn frame(&self) -> Option<usize> {
        match *self {
            PageState::Present { frame, .. } => Some(frame),
            PageState::Absent => None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self, PageState::Present { dirty: true, .. })
    }
}

/// Single-level page table, one entry per virtual page
pub struct PageTable {
    entries: Vec<PageState>,
    resident: usize,
}

impl PageTable {
    pub fn new(total_pages: usize) -> Self {
        PageTable {
            entries: vec![PageState::Absent; total_pages],
            resident: 0,
        }
    }

    pub fn state(&self, page: usize) -> Result<PageState> {
        self.entries.get(page).copied().ok_or(self.out_of_range(page))
    }

    pub fn is_present(&self, page: usize) -> bool {
        self.entries.get(page).is_some_and(PageState::is_present)
    }

    pub fn is_dirty(&self, page: usize) -> bool {
        self.entries.get(page).is_some_and(PageState::is_dirty)
    }

    /// Map `page` into `frame`; the page comes in clean
    pub fn mark_present(&mut self, page: usize, frame: usize) -> Result<()> {
        let entry = self.entry_mut(page)?;
        let was_present = entry.is_present();
        *entry = PageState::Present { frame, dirty: false };
        if !was_present {
            self.resident += 1;
        }
        Ok(())
    }

    pub fn mark_absent(&mut self, page: usize) -> Result<()> {
        let entry = self.entry_mut(page)?;
        let was_present = entry.is_present();
        *entry = PageState::Absent;
        if was_present {
            self.resident -= 1;
        }
        Ok(())
    }

    pub fn set_dirty(&mut self, page: usize) -> Result<()> {
        self.update_dirty(page, true)
    }

    pub fn clear_dirty(&mut self, page: usize) -> Result<()> {
        self.update_dirty(page, false)
    }

    pub fn frame_of(&self, page: usize) -> Result<usize> {
        self.state(page)?.frame().ok_or(PagingError::InvalidState { page })
    }

    /// Number of pages currently resident in a frame
    pub fn resident_count(&self) -> usize {
        self.resident
    }

    /// Iterate `(page, frame, dirty)` over resident pages in page order
    pub fn resident(&self) -> impl Iterator<Item = (usize, usize, bool)> + '_ {
        self.entries.iter().enumerate().filter_map(|(page, state)| match *state {
            PageState::Present { frame, dirty } => Some((page, frame, dirty)),
            PageState::Absent => None,
        })
    }

    fn update_dirty(&mut self, page: usize, value: bool) -> Result<()> {
        match self.entry_mut(page)? {
            PageState::Present { dirty, .. } => {
                *dirty = value;
                Ok(())
            }
            PageState::Absent => Err(PagingError::InvalidState { page }),
        }
    }

    fn entry_mut(&mut self, page: usize) -> Result<&mut PageState> {
        let err = self.out_of_range(page);
        self.entries.get_mut(page).ok_or(err)
    }

    fn out_of_range(&self, page: usize) -> PagingError {
        PagingError::AddressOutOfRange {
            page,
            total_pages: self.entries.len(),
        }
    }
}
