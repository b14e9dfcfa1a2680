use serde::Serialize;

use crate::value::Record;

/// One page of results plus the totals needed to render pagination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub per_page: u32,
    pub current_page: u32,
    pub last_page: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, per_page: u32, current_page: u32) -> Self {
        let last_page = total.div_ceil(u64::from(per_page.max(1))).max(1);
        Self {
            data,
            total,
            per_page,
            current_page,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
        }
    }

    /// Zero-based row offset of `page` (1-based).
    pub fn offset(per_page: u32, page: u32) -> u64 {
        u64::from(page.saturating_sub(1)) * u64::from(per_page)
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }
}

/// Output of a search: a page when paginating, otherwise every match.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchResult {
    Page(Page<Record>),
    All(Vec<Record>),
}

impl SearchResult {
    pub fn records(&self) -> &[Record] {
        match self {
            Self::Page(page) => &page.data,
            Self::All(records) => records,
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            Self::Page(page) => page.data,
            Self::All(records) => records,
        }
    }

    pub fn as_page(&self) -> Option<&Page<Record>> {
        match self {
            Self::Page(page) => Some(page),
            Self::All(_) => None,
        }
    }
}
