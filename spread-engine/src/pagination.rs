use crate::{error::EngineError, model::PageInfo};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Variables of the listing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ListingQuery {
    pub first: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PaginationState {
    pub page_size: usize,
    /// 1-based.
    pub page: usize,
}

/// Tracks page & page size and derives [`ListingQuery`] parameters.
///
/// "Next" availability is driven by the `has_next_page` flag of the listing response for the
/// current page, and is withheld until that response settles. An optional item cap
/// additionally stops paging once `page * page_size >= cap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationController {
    state: PaginationState,
    item_cap: Option<usize>,
    has_next_page: Option<bool>,
    awaiting_page_info: bool,
}

impl PaginationController {
    pub fn new(page_size: usize) -> Result<Self, EngineError> {
        if page_size == 0 {
            return Err(EngineError::InvalidPageSize(page_size));
        }

        Ok(Self {
            state: PaginationState { page_size, page: 1 },
            item_cap: None,
            has_next_page: None,
            awaiting_page_info: false,
        })
    }

    pub fn with_item_cap(mut self, cap: Option<usize>) -> Self {
        self.item_cap = cap;
        self
    }

    pub fn state(&self) -> PaginationState {
        self.state
    }

    pub fn page(&self) -> usize {
        self.state.page
    }

    pub fn page_size(&self) -> usize {
        self.state.page_size
    }

    /// Change the page size, resetting to the first page.
    ///
    /// Returns whether the listing query changed.
    pub fn set_page_size(&mut self, page_size: usize) -> Result<bool, EngineError> {
        if page_size == 0 {
            return Err(EngineError::InvalidPageSize(page_size));
        }

        if page_size == self.state.page_size {
            return Ok(false);
        }

        let before = self.query();
        self.state = PaginationState { page_size, page: 1 };
        self.has_next_page = None;
        self.awaiting_page_info = true;

        debug!(page_size, "listing page size changed");
        Ok(before != self.query())
    }

    pub fn can_prev(&self) -> bool {
        self.state.page > 1
    }

    pub fn can_next(&self) -> bool {
        if self.awaiting_page_info || self.has_next_page == Some(false) {
            return false;
        }

        match self.item_cap {
            Some(cap) => self.state.page.saturating_mul(self.state.page_size) < cap,
            None => true,
        }
    }

    /// Advance one page if allowed. Returns whether the page changed.
    pub fn next(&mut self) -> bool {
        if !self.can_next() {
            return false;
        }
        self.state.page += 1;
        self.awaiting_page_info = true;
        true
    }

    /// Go back one page, no-op on the first page. Returns whether the page changed.
    pub fn prev(&mut self) -> bool {
        if !self.can_prev() {
            return false;
        }
        self.state.page -= 1;
        self.awaiting_page_info = true;
        true
    }

    pub fn query(&self) -> ListingQuery {
        ListingQuery {
            first: self.state.page_size,
            offset: self.state.page_size * (self.state.page - 1),
        }
    }

    /// Record the page info of a settled listing response.
    pub fn apply_page_info(&mut self, info: PageInfo) {
        self.has_next_page = Some(info.has_next_page);
        self.awaiting_page_info = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn more_pages() -> PageInfo {
        PageInfo {
            has_previous_page: true,
            has_next_page: true,
        }
    }

    #[test]
    fn test_prev_is_noop_on_first_page() {
        let mut pagination = PaginationController::new(6).unwrap();
        assert!(!pagination.prev());
        assert_eq!(pagination.page(), 1);
        assert_eq!(pagination.query(), ListingQuery { first: 6, offset: 0 });
    }

    #[test]
    fn test_next_stops_at_item_cap() {
        let mut pagination = PaginationController::new(10)
            .unwrap()
            .with_item_cap(Some(100));

        for _ in 0..25 {
            pagination.next();
            pagination.apply_page_info(more_pages());
        }

        assert_eq!(pagination.page(), 10);
        assert!(!pagination.can_next());
        assert_eq!(pagination.query(), ListingQuery { first: 10, offset: 90 });
    }

    #[test]
    fn test_item_cap_stops_when_page_size_does_not_divide_cap() {
        let mut pagination = PaginationController::new(7)
            .unwrap()
            .with_item_cap(Some(100));

        for _ in 0..25 {
            pagination.next();
            pagination.apply_page_info(more_pages());
        }

        // 15 * 7 = 105 >= 100
        assert_eq!(pagination.page(), 15);
    }

    #[test]
    fn test_next_driven_by_server_page_info() {
        let mut pagination = PaginationController::new(6).unwrap();
        assert!(pagination.can_next());

        pagination.apply_page_info(PageInfo {
            has_previous_page: false,
            has_next_page: true,
        });
        assert!(pagination.next());
        assert_eq!(pagination.query(), ListingQuery { first: 6, offset: 6 });

        pagination.apply_page_info(PageInfo {
            has_previous_page: true,
            has_next_page: false,
        });
        assert!(!pagination.next());
        assert_eq!(pagination.page(), 2);

        assert!(pagination.prev());
        assert_eq!(pagination.page(), 1);
    }

    #[test]
    fn test_set_page_size() {
        let mut pagination = PaginationController::new(6).unwrap();
        pagination.next();
        pagination.apply_page_info(PageInfo {
            has_previous_page: true,
            has_next_page: false,
        });

        assert_eq!(pagination.set_page_size(0), Err(EngineError::InvalidPageSize(0)));
        assert_eq!(pagination.set_page_size(6), Ok(false));
        assert_eq!(pagination.set_page_size(20), Ok(true));
        assert_eq!(pagination.page(), 1);
        assert!(!pagination.can_next());
        assert_eq!(pagination.query(), ListingQuery { first: 20, offset: 0 });

        pagination.apply_page_info(more_pages());
        assert!(pagination.can_next());
    }

    #[test]
    fn test_next_withheld_until_current_page_settles() {
        let mut pagination = PaginationController::new(6).unwrap();
        pagination.apply_page_info(PageInfo {
            has_previous_page: false,
            has_next_page: true,
        });

        assert!(pagination.next());
        assert!(!pagination.can_next());
        assert!(!pagination.next());
        assert_eq!(pagination.page(), 2);

        // prev stays available while the page is loading
        assert!(pagination.can_prev());

        pagination.apply_page_info(more_pages());
        assert!(pagination.next());
        assert_eq!(pagination.query(), ListingQuery { first: 6, offset: 12 });
    }

    #[test]
    fn test_zero_page_size_rejected() {
        assert_eq!(
            PaginationController::new(0),
            Err(EngineError::InvalidPageSize(0))
        );
    }
}
