use axum::http::{HeaderName, HeaderValue};

use amora_types::models::PaginationHeader;

use crate::error::ApiResult;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

pub const PAGINATION_HEADER: HeaderName = HeaderName::from_static("pagination");

/// Page selection after clamping. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: Option<u32>, size: Option<u32>) -> Self {
        Self {
            number: number.unwrap_or(1).max(1),
            size: size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u32 {
        (self.number - 1).saturating_mul(self.size)
    }

    pub fn header(&self, total_items: u64) -> PaginationHeader {
        PaginationHeader::new(self.number, self.size, total_items)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

pub fn header_pair(header: &PaginationHeader) -> ApiResult<[(HeaderName, HeaderValue); 1]> {
    let json = serde_json::to_string(header).map_err(anyhow::Error::from)?;
    let value = HeaderValue::from_str(&json).map_err(anyhow::Error::from)?;
    Ok([(PAGINATION_HEADER, value)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_page_size_and_number() {
        assert_eq!(Page::new(None, None), Page { number: 1, size: DEFAULT_PAGE_SIZE });
        assert_eq!(Page::new(Some(0), Some(500)), Page { number: 1, size: MAX_PAGE_SIZE });
        assert_eq!(Page::new(Some(3), Some(5)).offset(), 10);
    }
}
