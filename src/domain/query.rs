//! Document query language.
//!
//! Clients describe which documents they want with three JSON objects:
//!
//! - **filter** (`where`): `{"completed": false, "deadline": {"$lt": "2027-01-01"}}`
//! - **sort**: `{"deadline": 1, "name": -1}`
//! - **projection** (`select`): `{"name": 1, "_id": 0}`
//!
//! This module parses those objects into typed values and evaluates them
//! against `serde_json::Value` documents. The in-memory repository uses the
//! evaluator directly; the `PostgreSQL` repository compiles the same types
//! to SQL.
//!
//! # Comparison rules
//!
//! - Numbers compare numerically, so `1` equals `1.0`.
//! - Equality against an array field also matches when any element is equal.
//! - Ordering operators (`$gt`, `$lt`, ...) only match values of the same
//!   JSON type.
//! - `{"field": null}` matches documents where the field is null or missing.
//! - Sorting ranks types as null < number < string < object < array < bool.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use thiserror::Error;

// =============================================================================
// Query Error
// =============================================================================

/// Errors produced while parsing filter, sort, or projection objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The clause must be a JSON object.
    #[error("expected a JSON object")]
    NotAnObject,

    /// An operator that the query language does not support.
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    /// An operator received an operand of the wrong shape.
    #[error("invalid operand for {operator}: {reason}")]
    InvalidOperand { operator: String, reason: String },

    /// A sort value other than 1, -1, "asc" or "desc".
    #[error("invalid sort direction for '{field}'")]
    InvalidSortDirection { field: String },

    /// A projection value other than 0, 1, true or false.
    #[error("invalid projection value for '{field}'")]
    InvalidProjectionValue { field: String },

    /// A projection that both includes and excludes fields.
    #[error("projection cannot mix inclusion and exclusion")]
    MixedProjection,

    /// A field path with an empty segment, such as `"a..b"` or `""`.
    #[error("invalid field path '{0}'")]
    InvalidFieldPath(String),
}

fn invalid_operand(operator: &str, reason: impl Into<String>) -> QueryError {
    QueryError::InvalidOperand {
        operator: operator.to_string(),
        reason: reason.into(),
    }
}

// =============================================================================
// Field Path
// =============================================================================

/// A dot-separated path into a document, e.g. `"address.city"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Parses a dot-separated path.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::InvalidFieldPath` if any segment is empty.
    pub fn parse(path: &str) -> Result<Self, QueryError> {
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(QueryError::InvalidFieldPath(path.to_string()));
        }
        Ok(Self(segments))
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Follows the path through nested objects.
    #[must_use]
    pub fn resolve<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(document, |current, segment| current.as_object()?.get(segment))
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0.join("."))
    }
}

// =============================================================================
// Filter
// =============================================================================

/// A compiled `$regex` condition.
#[derive(Debug, Clone)]
pub struct RegexCondition {
    /// The pattern as supplied by the client.
    pub pattern: String,
    /// Whether the `i` option was given.
    pub case_insensitive: bool,
    regex: Regex,
}

impl RegexCondition {
    fn new(pattern: &str, options: &str) -> Result<Self, QueryError> {
        let mut case_insensitive = false;
        for option in options.chars() {
            match option {
                'i' => case_insensitive = true,
                other => {
                    return Err(invalid_operand(
                        "$options",
                        format!("unsupported option '{other}'"),
                    ));
                }
            }
        }
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|error| invalid_operand("$regex", error.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            case_insensitive,
            regex,
        })
    }

    /// Returns true if `text` matches the pattern.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for RegexCondition {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.case_insensitive == other.case_insensitive
    }
}

/// A condition on a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Regex(RegexCondition),
}

impl Condition {
    /// Evaluates the condition against a (possibly missing) field value.
    #[must_use]
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Self::Eq(expected) => field_equals(value, expected),
            Self::Ne(expected) => !field_equals(value, expected),
            Self::Gt(bound) => any_candidate(value, |candidate| {
                compare_same_type(candidate, bound) == Some(Ordering::Greater)
            }),
            Self::Gte(bound) => any_candidate(value, |candidate| {
                matches!(
                    compare_same_type(candidate, bound),
                    Some(Ordering::Greater | Ordering::Equal)
                )
            }),
            Self::Lt(bound) => any_candidate(value, |candidate| {
                compare_same_type(candidate, bound) == Some(Ordering::Less)
            }),
            Self::Lte(bound) => any_candidate(value, |candidate| {
                matches!(
                    compare_same_type(candidate, bound),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }),
            Self::In(options) => options.iter().any(|option| field_equals(value, option)),
            Self::Nin(options) => !options.iter().any(|option| field_equals(value, option)),
            Self::Exists(expected) => value.is_some() == *expected,
            Self::Regex(regex) => any_candidate(value, |candidate| {
                candidate.as_str().is_some_and(|text| regex.is_match(text))
            }),
        }
    }
}

/// A parsed `where` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Field { path: FieldPath, condition: Condition },
}

impl Default for Filter {
    fn default() -> Self {
        Self::all()
    }
}

impl Filter {
    /// A filter that matches every document.
    #[must_use]
    pub const fn all() -> Self {
        Self::And(Vec::new())
    }

    /// Returns true if this filter matches every document.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::And(clauses) if clauses.is_empty())
    }

    /// Builds a single-field equality filter.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::InvalidFieldPath` if `path` is malformed.
    pub fn field_eq(path: &str, value: Value) -> Result<Self, QueryError> {
        Ok(Self::Field {
            path: FieldPath::parse(path)?,
            condition: Condition::Eq(value),
        })
    }

    /// Parses a filter object.
    ///
    /// # Errors
    ///
    /// Returns a `QueryError` describing the first problem found.
    pub fn from_json(value: &Value) -> Result<Self, QueryError> {
        let object = value.as_object().ok_or(QueryError::NotAnObject)?;
        let mut clauses = Vec::with_capacity(object.len());

        for (key, operand) in object {
            if key.starts_with('$') {
                clauses.push(parse_logical(key, operand)?);
            } else {
                let path = FieldPath::parse(key)?;
                for condition in parse_conditions(operand)? {
                    clauses.push(Self::Field {
                        path: path.clone(),
                        condition,
                    });
                }
            }
        }

        if clauses.len() == 1 {
            Ok(clauses.remove(0))
        } else {
            Ok(Self::And(clauses))
        }
    }

    /// Evaluates the filter against a document.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Self::And(clauses) => clauses.iter().all(|clause| clause.matches(document)),
            Self::Or(clauses) => clauses.iter().any(|clause| clause.matches(document)),
            Self::Nor(clauses) => !clauses.iter().any(|clause| clause.matches(document)),
            Self::Field { path, condition } => condition.matches(path.resolve(document)),
        }
    }
}

fn parse_logical(operator: &str, operand: &Value) -> Result<Filter, QueryError> {
    let build: fn(Vec<Filter>) -> Filter = match operator {
        "$and" => Filter::And,
        "$or" => Filter::Or,
        "$nor" => Filter::Nor,
        other => return Err(QueryError::UnknownOperator(other.to_string())),
    };
    let items = operand
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| invalid_operand(operator, "expected a non-empty array"))?;
    let clauses = items
        .iter()
        .map(Filter::from_json)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(build(clauses))
}

fn parse_conditions(operand: &Value) -> Result<Vec<Condition>, QueryError> {
    let Some(object) = operand
        .as_object()
        .filter(|object| object.keys().any(|key| key.starts_with('$')))
    else {
        return Ok(vec![Condition::Eq(operand.clone())]);
    };

    let options = match object.get("$options") {
        None => "",
        Some(Value::String(options)) => options.as_str(),
        Some(_) => return Err(invalid_operand("$options", "expected a string")),
    };
    if object.contains_key("$options") && !object.contains_key("$regex") {
        return Err(invalid_operand("$options", "requires $regex"));
    }

    let mut conditions = Vec::with_capacity(object.len());
    for (operator, value) in object {
        let condition = match operator.as_str() {
            "$eq" => Condition::Eq(value.clone()),
            "$ne" => Condition::Ne(value.clone()),
            "$gt" => Condition::Gt(value.clone()),
            "$gte" => Condition::Gte(value.clone()),
            "$lt" => Condition::Lt(value.clone()),
            "$lte" => Condition::Lte(value.clone()),
            "$in" => Condition::In(expect_array(operator, value)?),
            "$nin" => Condition::Nin(expect_array(operator, value)?),
            "$exists" => Condition::Exists(expect_flag(operator, value)?),
            "$regex" => {
                let pattern = value
                    .as_str()
                    .ok_or_else(|| invalid_operand(operator, "expected a string"))?;
                Condition::Regex(RegexCondition::new(pattern, options)?)
            }
            "$options" => continue,
            other => return Err(QueryError::UnknownOperator(other.to_string())),
        };
        conditions.push(condition);
    }
    Ok(conditions)
}

fn expect_array(operator: &str, value: &Value) -> Result<Vec<Value>, QueryError> {
    value
        .as_array()
        .cloned()
        .ok_or_else(|| invalid_operand(operator, "expected an array"))
}

fn expect_flag(operator: &str, value: &Value) -> Result<bool, QueryError> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) => Ok(number.as_f64().is_some_and(|n| n != 0.0)),
        _ => Err(invalid_operand(operator, "expected a boolean")),
    }
}

// =============================================================================
// Value Comparison
// =============================================================================

fn field_equals(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        None => expected.is_null(),
        Some(actual) => {
            values_equal(actual, expected)
                || matches!(actual, Value::Array(items) if items.iter().any(|item| values_equal(item, expected)))
        }
    }
}

fn any_candidate(value: Option<&Value>, predicate: impl Fn(&Value) -> bool) -> bool {
    match value {
        None => false,
        Some(Value::Array(items)) => items.iter().any(predicate),
        Some(scalar) => predicate(scalar),
    }
}

/// Structural equality with numeric comparison for numbers.
#[must_use]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => compare_values(left, right) == Ordering::Equal,
        (Value::Array(left_items), Value::Array(right_items)) => {
            left_items.len() == right_items.len()
                && left_items
                    .iter()
                    .zip(right_items)
                    .all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(left_map), Value::Object(right_map)) => {
            left_map.len() == right_map.len()
                && left_map.iter().all(|(key, l)| {
                    right_map.get(key).is_some_and(|r| values_equal(l, r))
                })
        }
        _ => left == right,
    }
}

const fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

fn compare_same_type(left: &Value, right: &Value) -> Option<Ordering> {
    (type_rank(left) == type_rank(right)).then(|| compare_values(left, right))
}

/// Total order over JSON values used for sorting.
#[must_use]
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_i64(), r.as_i64()) {
            (Some(l), Some(r)) => l.cmp(&r),
            _ => l
                .as_f64()
                .zip(r.as_f64())
                .and_then(|(l, r)| l.partial_cmp(&r))
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(l), Value::String(r)) => l.cmp(r),
        (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
        (Value::Array(l), Value::Array(r)) => l
            .iter()
            .zip(r)
            .map(|(l, r)| compare_values(l, r))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| l.len().cmp(&r.len())),
        (Value::Object(l), Value::Object(r)) => l
            .iter()
            .zip(r)
            .map(|((lk, lv), (rk, rv))| lk.cmp(rk).then_with(|| compare_values(lv, rv)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| l.len().cmp(&r.len())),
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

// =============================================================================
// Sort
// =============================================================================

/// Sort direction for a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One key of a sort specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub path: FieldPath,
    pub direction: SortDirection,
}

/// A parsed `sort` clause; keys apply in the order they were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec(Vec<SortKey>);

impl SortSpec {
    /// A specification that keeps the natural (insertion) order.
    #[must_use]
    pub const fn none() -> Self {
        Self(Vec::new())
    }

    /// Returns the sort keys.
    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    /// Returns true if no keys are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses a sort object.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` for non-objects, bad paths, or bad directions.
    pub fn from_json(value: &Value) -> Result<Self, QueryError> {
        let object = value.as_object().ok_or(QueryError::NotAnObject)?;
        object
            .iter()
            .map(|(field, direction)| -> Result<SortKey, QueryError> {
                Ok(SortKey {
                    path: FieldPath::parse(field)?,
                    direction: parse_direction(field, direction)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Compares two documents; missing fields sort as null.
    #[must_use]
    pub fn compare(&self, left: &Value, right: &Value) -> Ordering {
        self.0
            .iter()
            .map(|key| {
                let ordering = compare_values(
                    key.path.resolve(left).unwrap_or(&Value::Null),
                    key.path.resolve(right).unwrap_or(&Value::Null),
                );
                match key.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

fn parse_direction(field: &str, value: &Value) -> Result<SortDirection, QueryError> {
    let invalid = || QueryError::InvalidSortDirection {
        field: field.to_string(),
    };
    match value {
        Value::Number(number) => match number.as_f64() {
            Some(n) if (n - 1.0).abs() < f64::EPSILON => Ok(SortDirection::Ascending),
            Some(n) if (n + 1.0).abs() < f64::EPSILON => Ok(SortDirection::Descending),
            _ => Err(invalid()),
        },
        Value::String(text) => match text.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            _ => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}

// =============================================================================
// Projection
// =============================================================================

/// A parsed `select` clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    /// Whole documents.
    #[default]
    All,
    /// Only the listed fields (plus `_id` unless excluded).
    Include {
        fields: Vec<FieldPath>,
        include_id: bool,
    },
    /// Everything except the listed fields.
    Exclude { fields: Vec<FieldPath> },
}

impl Projection {
    /// Parses a projection object.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` for non-objects, bad values, or mixed projections.
    pub fn from_json(value: &Value) -> Result<Self, QueryError> {
        let object = value.as_object().ok_or(QueryError::NotAnObject)?;
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        let mut id_flag = None;

        for (field, flag) in object {
            let flag = parse_projection_flag(field, flag)?;
            if field == "_id" {
                id_flag = Some(flag);
                continue;
            }
            let path = FieldPath::parse(field)?;
            if flag {
                included.push(path);
            } else {
                excluded.push(path);
            }
        }

        if !included.is_empty() && !excluded.is_empty() {
            return Err(QueryError::MixedProjection);
        }

        Ok(match id_flag {
            _ if !included.is_empty() => Self::Include {
                fields: included,
                include_id: id_flag.unwrap_or(true),
            },
            Some(false) => {
                excluded.push(FieldPath(vec!["_id".to_string()]));
                Self::Exclude { fields: excluded }
            }
            Some(true) if excluded.is_empty() => Self::Include {
                fields: Vec::new(),
                include_id: true,
            },
            _ if excluded.is_empty() => Self::All,
            _ => Self::Exclude { fields: excluded },
        })
    }

    /// Applies the projection to a document.
    #[must_use]
    pub fn apply(&self, document: Value) -> Value {
        match self {
            Self::All => document,
            Self::Include { fields, include_id } => {
                let mut projected = Map::new();
                if *include_id
                    && let Some(id) = document.get("_id")
                {
                    projected.insert("_id".to_string(), id.clone());
                }
                for path in fields {
                    if let Some(value) = path.resolve(&document) {
                        insert_at(&mut projected, path.segments(), value.clone());
                    }
                }
                Value::Object(projected)
            }
            Self::Exclude { fields } => {
                let mut document = document;
                for path in fields {
                    remove_at(&mut document, path.segments());
                }
                document
            }
        }
    }
}

fn parse_projection_flag(field: &str, value: &Value) -> Result<bool, QueryError> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) => match number.as_f64() {
            Some(n) if n == 0.0 => Ok(false),
            Some(n) if (n - 1.0).abs() < f64::EPSILON => Ok(true),
            _ => Err(QueryError::InvalidProjectionValue {
                field: field.to_string(),
            }),
        },
        _ => Err(QueryError::InvalidProjectionValue {
            field: field.to_string(),
        }),
    }
}

fn insert_at(target: &mut Map<String, Value>, segments: &[String], value: Value) {
    match segments {
        [] => {}
        [last] => {
            target.insert(last.clone(), value);
        }
        [head, rest @ ..] => {
            let child = target
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(child) = child {
                insert_at(child, rest, value);
            }
        }
    }
}

fn remove_at(target: &mut Value, segments: &[String]) {
    let Value::Object(map) = target else {
        return;
    };
    match segments {
        [] => {}
        [last] => {
            *map = std::mem::take(map)
                .into_iter()
                .filter(|(key, _)| key != last)
                .collect();
        }
        [head, rest @ ..] => {
            if let Some(child) = map.get_mut(head) {
                remove_at(child, rest);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
