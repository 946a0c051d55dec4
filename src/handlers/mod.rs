//! HTTP request handlers.

pub mod auth;
pub mod comments;
pub mod consultants;
pub mod dogs;
pub mod events;
pub mod health;
pub mod invites;
pub mod notes;
pub mod users;

use axum::{http::StatusCode, Json};
use chrono::{Days, NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::access::{AccessError, DogRef};
use crate::error::{db_err, ApiError, ApiResult};
use crate::models::{Dog, Event};
use crate::schema::dogs as dogs_table;

pub(crate) fn validation_error(e: validator::ValidationErrors) -> (StatusCode, Json<ApiError>) {
    ApiError::bad_request(format!("Validation error: {}", e), "VALIDATION_ERROR")
}

pub(crate) fn load_dog(conn: &mut PgConnection, dog_id: Uuid) -> ApiResult<Dog> {
    dogs_table::table
        .find(dog_id)
        .select(Dog::as_select())
        .first(conn)
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| AccessError::not_found("dog").into())
}

pub(crate) fn dog_ref(dog: &Dog) -> DogRef {
    DogRef {
        id: dog.id,
        owner_id: dog.owner_id,
    }
}

/// The dog an event belongs to. An event whose dog is gone is treated as
/// having none.
pub(crate) fn event_dog(conn: &mut PgConnection, event: &Event) -> ApiResult<Option<DogRef>> {
    let Some(dog_id) = event.dog_id else {
        return Ok(None);
    };
    let owner: Option<Uuid> = dogs_table::table
        .find(dog_id)
        .select(dogs_table::owner_id)
        .first(conn)
        .optional()
        .map_err(db_err)?;
    Ok(owner.map(|owner_id| DogRef {
        id: dog_id,
        owner_id,
    }))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Inclusive `[from, to]` day range as `[start, end)` timestamps.
pub(crate) fn day_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
    let start = from.and_then(|d| d.and_hms_opt(0, 0, 0));
    let end = to
        .and_then(|d| d.checked_add_days(Days::new(1)))
        .and_then(|d| d.and_hms_opt(0, 0, 0));
    (start, end)
}

pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_range_is_inclusive_of_the_last_day() {
        let from = NaiveDate::from_ymd_opt(2025, 3, 1);
        let to = NaiveDate::from_ymd_opt(2025, 3, 31);
        let (start, end) = day_range(from, to);

        assert_eq!(start.unwrap().to_string(), "2025-03-01 00:00:00");
        assert_eq!(end.unwrap().to_string(), "2025-04-01 00:00:00");
        assert_eq!(day_range(None, None), (None, None));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rex"), "%rex%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_sort_order_defaults_to_desc() {
        assert_eq!(SortOrder::default(), SortOrder::Desc);
        let parsed: SortOrder = serde_json::from_str("\"asc\"").unwrap();
        assert_eq!(parsed, SortOrder::Asc);
    }
}
