//! Query-string parameters for list and get-by-id endpoints.
//!
//! `where`, `sort` and `select` carry JSON. Each parameter is parsed
//! independently, and the first failure becomes a 400 response whose
//! message names the parameter:
//!
//! | failure                         | message                  | data       |
//! |---------------------------------|--------------------------|------------|
//! | `where` is not a JSON object    | `Invalid JSON in where`  | `{}`       |
//! | `where` has a bad operator      | `Invalid where clause`   | reason     |
//! | `sort` malformed                | `Invalid JSON in sort`   | `{}`/reason|
//! | `select` malformed              | `Invalid JSON in select` | `{}`/reason|
//! | `skip` / `limit` not a `u64`    | `Invalid skip` / `Invalid limit` | `{}` |
//!
//! Empty parameters are treated as absent.

use serde::Deserialize;
use serde_json::{Value, json};

use super::error::ApiErrorResponse;
use crate::domain::{Filter, Projection, QueryError, SortSpec};
use crate::infrastructure::FindQuery;

/// Raw query parameters of `GET /api/tasks` and `GET /api/users`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    #[serde(rename = "where")]
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub select: Option<String>,
    pub skip: Option<String>,
    pub limit: Option<String>,
    pub count: Option<String>,
}

/// Raw query parameters of `GET /api/{collection}/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectParams {
    pub select: Option<String>,
}

/// A validated list request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    /// Filter, order and window for the repository.
    pub query: FindQuery,
    /// Fields to return.
    pub projection: Projection,
    /// `count=true`: return only the number of matches.
    pub count_only: bool,
}

fn present(raw: Option<&String>) -> Option<&str> {
    raw.map(String::as_str).filter(|value| !value.trim().is_empty())
}

fn invalid_json(parameter: &str) -> ApiErrorResponse {
    ApiErrorResponse::bad_request(format!("Invalid JSON in {parameter}"), json!({}))
}

/// Parses a JSON object parameter; anything else is reported as invalid JSON.
fn parse_object(raw: &str, parameter: &str) -> Result<Value, ApiErrorResponse> {
    serde_json::from_str::<Value>(raw)
        .ok()
        .filter(Value::is_object)
        .ok_or_else(|| invalid_json(parameter))
}

fn parse_filter(raw: Option<&String>) -> Result<Filter, ApiErrorResponse> {
    let Some(raw) = present(raw) else {
        return Ok(Filter::all());
    };
    let value = parse_object(raw, "where")?;
    Filter::from_json(&value).map_err(|error| {
        ApiErrorResponse::bad_request("Invalid where clause", json!(error.to_string()))
    })
}

fn parse_sort(raw: Option<&String>) -> Result<SortSpec, ApiErrorResponse> {
    let Some(raw) = present(raw) else {
        return Ok(SortSpec::none());
    };
    let value = parse_object(raw, "sort")?;
    SortSpec::from_json(&value).map_err(|error| semantic_error("sort", &error))
}

/// Parses the `select` parameter.
///
/// # Errors
///
/// Returns 400 `Invalid JSON in select` when the value is not a valid projection.
pub fn parse_projection(raw: Option<&String>) -> Result<Projection, ApiErrorResponse> {
    let Some(raw) = present(raw) else {
        return Ok(Projection::All);
    };
    let value = parse_object(raw, "select")?;
    Projection::from_json(&value).map_err(|error| semantic_error("select", &error))
}

fn semantic_error(parameter: &str, error: &QueryError) -> ApiErrorResponse {
    ApiErrorResponse::bad_request(format!("Invalid JSON in {parameter}"), json!(error.to_string()))
}

fn parse_count(raw: Option<&String>, parameter: &str) -> Result<Option<u64>, ApiErrorResponse> {
    present(raw)
        .map(|value| {
            value.trim().parse::<u64>().map_err(|_| {
                ApiErrorResponse::bad_request(format!("Invalid {parameter}"), json!({}))
            })
        })
        .transpose()
}

impl ListParams {
    /// Validates the parameters.
    ///
    /// `default_limit` applies when `limit` is absent; `limit=0` means no limit.
    ///
    /// # Errors
    ///
    /// Returns a 400 response for the first malformed parameter.
    pub fn parse(&self, default_limit: Option<u64>) -> Result<ListRequest, ApiErrorResponse> {
        let filter = parse_filter(self.filter.as_ref())?;
        let sort = parse_sort(self.sort.as_ref())?;
        let projection = parse_projection(self.select.as_ref())?;
        let skip = parse_count(self.skip.as_ref(), "skip")?.unwrap_or(0);
        let limit = match parse_count(self.limit.as_ref(), "limit")? {
            Some(0) => None,
            Some(limit) => Some(limit),
            None => default_limit,
        };

        Ok(ListRequest {
            query: FindQuery::with_filter(filter)
                .sorted_by(sort)
                .window(skip, limit),
            projection,
            count_only: self.count.as_deref() == Some("true"),
        })
    }
}

impl SelectParams {
    /// Validates the `select` parameter.
    ///
    /// # Errors
    ///
    /// Returns 400 `Invalid JSON in select` when malformed.
    pub fn projection(&self) -> Result<Projection, ApiErrorResponse> {
        parse_projection(self.select.as_ref())
    }
}

// =============================================================================
// Tests
// =============================================================================
