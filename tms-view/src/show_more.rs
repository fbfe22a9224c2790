//! "Show more" paging for short lists.

use serde::{Deserialize, Serialize};

/// Items shown before a list is expanded.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Collapsed lists show one page; expanded lists show everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowMore {
    pub page_size: usize,
    pub expanded: bool,
}

impl Default for ShowMore {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ShowMore {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            expanded: false,
        }
    }

    pub fn visible<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        if self.expanded {
            items
        } else {
            &items[..items.len().min(self.page_size)]
        }
    }

    /// Items behind the "show more" control.
    pub fn hidden_count(&self, total: usize) -> usize {
        if self.expanded {
            0
        } else {
            total.saturating_sub(self.page_size)
        }
    }

    /// Whether the control should be offered at all.
    pub fn has_more(&self, total: usize) -> bool {
        total > self.page_size
    }

    pub fn toggle(&mut self) {
        self.expanded = !self.expanded;
    }
}
