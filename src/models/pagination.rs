use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{AppError, Result};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Page parameters as they arrive from the client
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PaginationQuery {
    #[serde(default, alias = "pageIndex")]
    pub page_index: Option<i64>,
    #[serde(default, alias = "pageSize")]
    pub page_size: Option<i64>,
}

/// A resolved `LIMIT`/`OFFSET` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl PaginationQuery {
    #[cfg(test)]
    pub fn new(page_index: i64, page_size: i64) -> Self {
        Self {
            page_index: Some(page_index),
            page_size: Some(page_size),
        }
    }

    /// Page numbers start at 1; page `n` skips `(n - 1) * size` rows
    pub fn one_based(&self) -> Result<Page> {
        let index = self.page_index.unwrap_or(1);
        if index < 1 {
            return Err(AppError::BadRequest(
                "page_index must be at least 1".to_string(),
            ));
        }
        Self::page(index - 1, self.size()?)
    }

    /// Page numbers start at 0; page `n` skips `n * size` rows
    pub fn zero_based(&self) -> Result<Page> {
        let index = self.page_index.unwrap_or(0);
        if index < 0 {
            return Err(AppError::BadRequest(
                "page_index must not be negative".to_string(),
            ));
        }
        Self::page(index, self.size()?)
    }

    /// Remove the pagination keys from a free-form parameter map
    pub fn take_from(params: &mut HashMap<String, String>) -> Result<Self> {
        let page_index = take_int(params, &["page_index", "pageIndex"])?;
        let page_size = take_int(params, &["page_size", "pageSize"])?;
        Ok(Self {
            page_index,
            page_size,
        })
    }

    fn size(&self) -> Result<i64> {
        let size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(AppError::BadRequest(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(size)
    }

    fn page(skip_pages: i64, size: i64) -> Result<Page> {
        let offset = skip_pages
            .checked_mul(size)
            .ok_or_else(|| AppError::BadRequest("page_index is too large".to_string()))?;
        Ok(Page {
            offset,
            limit: size,
        })
    }
}

fn take_int(params: &mut HashMap<String, String>, keys: &[&str]) -> Result<Option<i64>> {
    let mut found = None;
    for key in keys {
        if let Some(raw) = params.remove(*key) {
            let value = raw
                .trim()
                .parse()
                .map_err(|_| AppError::BadRequest(format!("{} must be an integer", key)))?;
            found = Some(value);
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_based_offset() {
        let page = PaginationQuery::new(2, 10).one_based().unwrap();
        assert_eq!(page, Page { offset: 10, limit: 10 });
    }

    #[test]
    fn test_zero_based_offset() {
        let page = PaginationQuery::new(2, 10).zero_based().unwrap();
        assert_eq!(page, Page { offset: 20, limit: 10 });
    }

    #[test]
    fn test_defaults() {
        let q = PaginationQuery::default();
        assert_eq!(q.one_based().unwrap(), Page { offset: 0, limit: 10 });
        assert_eq!(q.zero_based().unwrap(), Page { offset: 0, limit: 10 });
    }

    #[test]
    fn test_invalid_values() {
        assert!(PaginationQuery::new(0, 10).one_based().is_err());
        assert!(PaginationQuery::new(-1, 10).zero_based().is_err());
        assert!(PaginationQuery::new(1, 0).one_based().is_err());
        assert!(PaginationQuery::new(1, MAX_PAGE_SIZE + 1).zero_based().is_err());
        assert!(PaginationQuery::new(i64::MAX, 10).zero_based().is_err());
    }

    #[test]
    fn test_take_from_accepts_both_spellings() {
        let mut params: HashMap<String, String> = [
            ("pageIndex", "3"),
            ("page_size", "5"),
            ("filename", "a.txt"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let q = PaginationQuery::take_from(&mut params).unwrap();
        assert_eq!(q.page_index, Some(3));
        assert_eq!(q.page_size, Some(5));
        assert_eq!(params.len(), 1);
        assert!(params.contains_key("filename"));
    }

    #[test]
    fn test_take_from_rejects_garbage() {
        let mut params = HashMap::from([("page_size".to_string(), "ten".to_string())]);
        assert!(matches!(
            PaginationQuery::take_from(&mut params),
            Err(AppError::BadRequest(_))
        ));
    }
}
