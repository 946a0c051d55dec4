//! Offset pagination for list endpoints.
//!
//! Out-of-range input is clamped rather than rejected: a page below 1 is
//! page 1 and `per_page` is held to 1..=100.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// `?page=&per_page=` as sent by the client. Both are optional.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// 1-based page number, default 1.
    #[param(minimum = 1, example = 1)]
    page: Option<i64>,
    /// Page size, default 20, at most 100.
    #[param(minimum = 1, maximum = 100, example = 20)]
    per_page: Option<i64>,
}

impl PaginationParams {
    pub fn from_parts(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self { page, per_page }
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    /// `(LIMIT, OFFSET)` for the current page.
    pub fn limit_offset(&self) -> (i64, i64) {
        let size = self.per_page();
        (size, (self.page() - 1).saturating_mul(size))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaginationMeta {
    #[schema(example = 1)]
    pub page: i64,
    #[schema(example = 20)]
    pub per_page: i64,
    #[schema(example = 42)]
    pub total_count: i64,
    /// Never less than 1, even for an empty result.
    #[schema(example = 3)]
    pub total_pages: i64,
}

impl PaginationMeta {
    fn for_params(params: &PaginationParams, total_count: i64) -> Self {
        let per_page = params.per_page();
        let total_pages = if total_count <= 0 {
            1
        } else {
            (total_count - 1) / per_page + 1
        };
        Self {
            page: params.page(),
            per_page,
            total_count: total_count.max(0),
            total_pages,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T: Serialize> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn from_params(data: Vec<T>, params: &PaginationParams, total_count: i64) -> Self {
        Self {
            data,
            pagination: PaginationMeta::for_params(params, total_count),
        }
    }

    pub fn empty(params: &PaginationParams) -> Self {
        Self::from_params(Vec::new(), params, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parts_use_defaults() {
        let params = PaginationParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.per_page(), DEFAULT_PER_PAGE);
        assert_eq!(params.limit_offset(), (DEFAULT_PER_PAGE, 0));
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let params = PaginationParams::from_parts(Some(-3), Some(0));
        assert_eq!((params.page(), params.per_page()), (1, 1));

        let params = PaginationParams::from_parts(Some(3), Some(500));
        assert_eq!(params.limit_offset(), (MAX_PER_PAGE, 200));
    }

    #[test]
    fn test_total_pages_rounds_up_and_never_hits_zero() {
        let params = PaginationParams::from_parts(Some(1), Some(20));
        let pages = |total| PaginationMeta::for_params(&params, total).total_pages;
        assert_eq!(pages(0), 1);
        assert_eq!(pages(20), 1);
        assert_eq!(pages(21), 2);
        assert_eq!(pages(95), 5);
    }

    #[test]
    fn test_query_string_deserializes() {
        let params: PaginationParams = serde_json::from_str(r#"{"page": 2}"#).unwrap();
        assert_eq!(params.limit_offset(), (DEFAULT_PER_PAGE, DEFAULT_PER_PAGE));
    }

    #[test]
    fn test_empty_page_serializes_metadata() {
        let params = PaginationParams::from_parts(Some(4), None);
        let json = serde_json::to_value(PaginatedResponse::<String>::empty(&params)).unwrap();
        assert_eq!(json["data"], serde_json::json!([]));
        assert_eq!(json["pagination"]["page"], 4);
        assert_eq!(json["pagination"]["total_pages"], 1);
    }
}
