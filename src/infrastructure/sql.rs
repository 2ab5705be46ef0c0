//! Compiles domain queries to `PostgreSQL` SQL over a `JSONB` column.
//!
//! Every document lives in a `data JSONB` column. Field paths become
//! `data #> $n::text[]` with the path bound as a parameter, and every
//! literal is bound as `jsonb`, so no client input is spliced into the SQL
//! text.
//!
//! Array fields follow the same rule as the in-memory evaluator: a scalar
//! condition matches when any element matches. To share one code path, a
//! scalar (or missing) value is wrapped into a one-element array before the
//! elements are tested:
//!
//! ```sql
//! EXISTS (SELECT 1 FROM jsonb_array_elements(
//!     CASE WHEN jsonb_typeof(<path>) = 'array' THEN <path> ELSE jsonb_build_array(<path>) END
//! ) AS element(value) WHERE <predicate on element.value>)
//! ```
//!
//! A missing field wraps to `[null]`, which is what makes `{"field": null}`
//! match missing fields.

use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use crate::domain::{Condition, FieldPath, Filter, SortDirection, SortSpec};

/// Appends a boolean SQL expression equivalent to `filter`.
pub fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    match filter {
        Filter::And(clauses) => push_group(builder, clauses, " AND ", "TRUE"),
        Filter::Or(clauses) => push_group(builder, clauses, " OR ", "FALSE"),
        Filter::Nor(clauses) => {
            builder.push("NOT ");
            push_group(builder, clauses, " OR ", "FALSE");
        }
        Filter::Field { path, condition } => push_condition(builder, path, condition),
    }
}

/// Appends an `ORDER BY` clause. Insertion order (`seq`) breaks ties.
///
/// Each key sorts by JSON type first (null or missing, number, string,
/// object, array, boolean) and then by value, so mixed-type fields order
/// the same way as in memory. JSON `null` and a missing field compare equal.
pub fn push_order_by(builder: &mut QueryBuilder<'_, Postgres>, sort: &SortSpec) {
    builder.push(" ORDER BY ");
    for key in sort.keys() {
        let direction = match key.direction {
            SortDirection::Ascending => " ASC, ",
            SortDirection::Descending => " DESC, ",
        };
        builder.push("CASE jsonb_typeof(");
        push_path(builder, &key.path);
        builder.push(
            ") WHEN 'number' THEN 1 WHEN 'string' THEN 2 WHEN 'object' THEN 3 \
             WHEN 'array' THEN 4 WHEN 'boolean' THEN 5 ELSE 0 END",
        );
        builder.push(direction);
        builder.push("NULLIF(");
        push_path(builder, &key.path);
        builder.push(", 'null'::jsonb)");
        builder.push(direction);
    }
    builder.push("seq ASC");
}

/// Appends `OFFSET` and, when present, `LIMIT`.
pub fn push_window(builder: &mut QueryBuilder<'_, Postgres>, skip: u64, limit: Option<u64>) {
    builder.push(" OFFSET ");
    builder.push_bind(i64::try_from(skip).unwrap_or(i64::MAX));
    if let Some(limit) = limit {
        builder.push(" LIMIT ");
        builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }
}

fn push_group(
    builder: &mut QueryBuilder<'_, Postgres>,
    clauses: &[Filter],
    separator: &str,
    empty: &str,
) {
    if clauses.is_empty() {
        builder.push(empty);
        return;
    }
    builder.push("(");
    for (index, clause) in clauses.iter().enumerate() {
        if index > 0 {
            builder.push(separator);
        }
        push_filter(builder, clause);
    }
    builder.push(")");
}

fn push_path(builder: &mut QueryBuilder<'_, Postgres>, path: &FieldPath) {
    builder.push("(data #> ");
    builder.push_bind(path.segments().to_vec());
    builder.push("::text[])");
}

fn push_condition(builder: &mut QueryBuilder<'_, Postgres>, path: &FieldPath, condition: &Condition) {
    match condition {
        Condition::Eq(value) => push_equals(builder, path, value),
        Condition::Ne(value) => {
            builder.push("NOT ");
            push_equals(builder, path, value);
        }
        Condition::Gt(value) => push_ordering(builder, path, ">", value),
        Condition::Gte(value) => push_ordering(builder, path, ">=", value),
        Condition::Lt(value) => push_ordering(builder, path, "<", value),
        Condition::Lte(value) => push_ordering(builder, path, "<=", value),
        Condition::In(values) => push_any_equals(builder, path, values),
        Condition::Nin(values) => {
            builder.push("NOT ");
            push_any_equals(builder, path, values);
        }
        Condition::Exists(expected) => {
            push_path(builder, path);
            builder.push(if *expected { " IS NOT NULL" } else { " IS NULL" });
        }
        Condition::Regex(regex) => {
            push_elements(builder, path, |builder| {
                builder.push("jsonb_typeof(element.value) = 'string' AND (element.value #>> '{}') ");
                builder.push(if regex.case_insensitive { "~* " } else { "~ " });
                builder.push_bind(regex.pattern.clone());
            });
        }
    }
}

/// `COALESCE(<path> = v OR <any element> = v, FALSE)`
fn push_equals(builder: &mut QueryBuilder<'_, Postgres>, path: &FieldPath, value: &Value) {
    builder.push("COALESCE(");
    push_path(builder, path);
    builder.push(" = ");
    builder.push_bind(value.clone());
    builder.push(" OR ");
    push_elements(builder, path, |builder| {
        builder.push("element.value = ");
        builder.push_bind(value.clone());
    });
    builder.push(", FALSE)");
}

fn push_any_equals(builder: &mut QueryBuilder<'_, Postgres>, path: &FieldPath, values: &[Value]) {
    if values.is_empty() {
        builder.push("FALSE");
        return;
    }
    builder.push("(");
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            builder.push(" OR ");
        }
        push_equals(builder, path, value);
    }
    builder.push(")");
}

fn push_ordering(
    builder: &mut QueryBuilder<'_, Postgres>,
    path: &FieldPath,
    operator: &str,
    value: &Value,
) {
    push_elements(builder, path, |builder| {
        builder.push("jsonb_typeof(element.value) = jsonb_typeof(");
        builder.push_bind(value.clone());
        builder.push(") AND element.value ");
        builder.push(operator);
        builder.push(" ");
        builder.push_bind(value.clone());
    });
}

fn push_elements(
    builder: &mut QueryBuilder<'_, Postgres>,
    path: &FieldPath,
    predicate: impl FnOnce(&mut QueryBuilder<'_, Postgres>),
) {
    builder.push("EXISTS (SELECT 1 FROM jsonb_array_elements(CASE WHEN jsonb_typeof(");
    push_path(builder, path);
    builder.push(") = 'array' THEN ");
    push_path(builder, path);
    builder.push(" ELSE jsonb_build_array(");
    push_path(builder, path);
    builder.push(") END) AS element(value) WHERE ");
    predicate(builder);
    builder.push(")");
}
