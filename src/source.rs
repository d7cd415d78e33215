use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::cmp::Ordering;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::driver::DataSource;
use crate::error::FetchError;
use crate::filter::{FilterEntry, FilterType};
use crate::query::{
    FetchOutcome, FetchRequest, GridQuery, Pagination, PaginationEnvelope, SortDirection,
};

/// Reference data source that answers [`GridQuery`]s from rows held in memory.
///
/// It behaves the way the list endpoints do: filters, multi-key sort and 1-based pages, a 404
/// when the dataset is not provisioned, and an injectable failure for everything else.
#[derive(Debug, Default)]
pub struct InMemorySource {
    rows: Mutex<Option<Arc<Vec<Value>>>>,
    failure: Mutex<Option<FetchError>>,
}

impl InMemorySource {
    pub fn new(rows: Vec<Value>) -> Self {
        InMemorySource {
            rows: Mutex::new(Some(Arc::new(rows))),
            failure: Mutex::new(None),
        }
    }

    /// A source whose every fetch answers 404.
    pub fn unprovisioned() -> Self {
        InMemorySource::default()
    }

    pub fn set_rows(&self, rows: Option<Vec<Value>>) {
        if let Ok(mut slot) = self.rows.lock() {
            *slot = rows.map(Arc::new);
        }
    }

    /// Makes every following fetch fail with `err` until cleared with `None`.
    pub fn fail_with(&self, err: Option<FetchError>) {
        if let Ok(mut slot) = self.failure.lock() {
            *slot = err;
        }
    }

    pub fn query(&self, query: &GridQuery) -> FetchOutcome {
        if let Some(err) = self.failure.lock().ok().and_then(|f| f.clone()) {
            return Err(err);
        }
        let rows = self
            .rows
            .lock()
            .ok()
            .and_then(|r| r.clone())
            .ok_or_else(FetchError::not_found)?;
        Ok(run_query(&rows, query))
    }
}

impl DataSource for InMemorySource {
    fn fetch(&self, request: FetchRequest) -> impl Future<Output = FetchOutcome> + Send {
        let outcome = self.query(&request.query);
        async move { outcome }
    }
}

pub fn run_query(rows: &[Value], query: &GridQuery) -> PaginationEnvelope {
    let mut matched: Vec<&Value> = rows
        .iter()
        .filter(|row| query.filters.iter().all(|f| matches_filter(row, f)))
        .collect();

    if !query.sort_orders.is_empty() {
        matched.sort_by(|a, b| {
            for sort in &query.sort_orders {
                let ordering = compare_values(a.get(&sort.field), b.get(&sort.field));
                let ordering = match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    let total = matched.len() as u64;
    let page_rows = matched
        .into_iter()
        .skip(query.offset())
        .take(query.size as usize)
        .cloned()
        .collect();

    PaginationEnvelope {
        rows: page_rows,
        pagination: Pagination {
            page: query.page,
            size: query.size,
            total,
        },
    }
}

fn matches_filter(row: &Value, filter: &FilterEntry) -> bool {
    if let Some(Value::Array(conditions)) = filter.extra.get("conditions") {
        let any = filter
            .extra
            .get("operator")
            .and_then(Value::as_str)
            .is_some_and(|op| op.eq_ignore_ascii_case("OR"));
        let mut results = conditions
            .iter()
            .map(|c| matches_filter(row, &FilterEntry::from_model_entry(&filter.field, c)));
        return if any {
            results.any(|m| m)
        } else {
            results.all(|m| m)
        };
    }

    let cell = row.get(&filter.field);
    let kind = filter.kind.as_deref().unwrap_or("equals");

    match filter.filter_type() {
        FilterType::Number => number_matches(cell, kind, filter),
        FilterType::Date => date_matches(cell, kind, filter),
        FilterType::Set => filter
            .values
            .as_ref()
            .is_none_or(|values| values.iter().any(|v| Some(v) == cell)),
        FilterType::Text | FilterType::Other => text_matches(cell, kind, filter.filter.as_ref()),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn text_matches(cell: Option<&Value>, kind: &str, filter: Option<&Value>) -> bool {
    let cell_text = cell.map(text_of).unwrap_or_default().to_lowercase();
    match kind {
        "blank" => cell_text.trim().is_empty(),
        "notBlank" => !cell_text.trim().is_empty(),
        _ => {
            let Some(needle) = filter.map(text_of) else {
                return true;
            };
            let needle = needle.to_lowercase();
            match kind {
                "contains" => cell_text.contains(&needle),
                "notContains" => !cell_text.contains(&needle),
                "startsWith" => cell_text.starts_with(&needle),
                "endsWith" => cell_text.ends_with(&needle),
                "notEqual" => cell_text != needle,
                _ => cell_text == needle,
            }
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn number_matches(cell: Option<&Value>, kind: &str, filter: &FilterEntry) -> bool {
    let cell = cell.and_then(as_number);
    match kind {
        "blank" => return cell.is_none(),
        "notBlank" => return cell.is_some(),
        _ => {}
    }
    let (Some(cell), Some(bound)) = (cell, filter.filter.as_ref().and_then(as_number)) else {
        return false;
    };
    match kind {
        "notEqual" => cell != bound,
        "lessThan" => cell < bound,
        "lessThanOrEqual" => cell <= bound,
        "greaterThan" => cell > bound,
        "greaterThanOrEqual" => cell >= bound,
        "inRange" => filter
            .filter_to
            .as_ref()
            .and_then(as_number)
            .is_some_and(|upper| in_range(cell, bound, upper, range_inclusive(filter))),
        _ => cell == bound,
    }
}

/// Range ends are excluded unless the predicate sets `inRangeInclusive`.
fn range_inclusive(filter: &FilterEntry) -> bool {
    filter
        .extra
        .get("inRangeInclusive")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn in_range<T: PartialOrd>(cell: T, from: T, to: T, inclusive: bool) -> bool {
    if inclusive {
        cell >= from && cell <= to
    } else {
        cell > from && cell < to
    }
}

/// Accepts the widget's `YYYY-MM-DD HH:MM:SS` as well as plain and RFC 3339 dates.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn date_matches(cell: Option<&Value>, kind: &str, filter: &FilterEntry) -> bool {
    let cell = cell.and_then(Value::as_str).and_then(parse_date);
    match kind {
        "blank" => return cell.is_none(),
        "notBlank" => return cell.is_some(),
        _ => {}
    }
    let (Some(cell), Some(from)) = (cell, filter.date_from.as_deref().and_then(parse_date))
    else {
        return false;
    };
    match kind {
        "notEqual" => cell != from,
        "lessThan" => cell < from,
        "greaterThan" => cell > from,
        "inRange" => filter
            .date_to
            .as_deref()
            .and_then(parse_date)
            .is_some_and(|to| in_range(cell, from, to, range_inclusive(filter))),
        _ => cell == from,
    }
}

/// Nulls sort first; numbers numerically; everything else by text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => text_of(x).to_lowercase().cmp(&text_of(y).to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortOrder;
    use serde_json::json;

    fn rows() -> Vec<Value> {
        vec![
            json!({"id": 1, "code": "BCLCF101", "carbon": 45.5, "status": "Approved", "effective": "2024-01-10"}),
            json!({"id": 2, "code": "BCLCF102", "carbon": 12.0, "status": "Draft", "effective": "2024-03-01"}),
            json!({"id": 3, "code": "XYZ200", "carbon": 80.25, "status": "Approved", "effective": "2023-11-20"}),
            json!({"id": 4, "code": "bclcf300", "carbon": null, "status": "Deleted", "effective": null}),
        ]
    }

    fn query() -> GridQuery {
        GridQuery::first_page(10, Vec::new())
    }

    fn ids(envelope: &PaginationEnvelope) -> Vec<i64> {
        envelope
            .rows
            .iter()
            .filter_map(|r| r["id"].as_i64())
            .collect()
    }

    #[test]
    fn text_filters_are_case_insensitive() {
        let mut q = query();
        q.filters = vec![FilterEntry::simple("code", "text", "startsWith", "bclcf")];
        assert_eq!(ids(&run_query(&rows(), &q)), vec![1, 2, 4]);
    }

    #[test]
    fn number_range_filter() {
        let mut q = query();
        let mut filter = FilterEntry::simple("carbon", "number", "inRange", 10);
        filter.filter_to = Some(json!(50));
        q.filters = vec![filter];
        assert_eq!(ids(&run_query(&rows(), &q)), vec![1, 2]);
    }

    #[test]
    fn in_range_excludes_ends_for_numbers_and_dates_unless_inclusive() {
        let mut q = query();
        let mut number = FilterEntry::simple("carbon", "number", "inRange", 12);
        number.filter_to = Some(json!(80.25));
        q.filters = vec![number.clone()];
        assert_eq!(ids(&run_query(&rows(), &q)), vec![1]);

        number.extra.insert("inRangeInclusive".into(), json!(true));
        q.filters = vec![number];
        assert_eq!(ids(&run_query(&rows(), &q)), vec![1, 2, 3]);

        let mut date = FilterEntry::new("effective");
        date.filter_type = Some("date".into());
        date.kind = Some("inRange".into());
        date.date_from = Some("2023-11-20 00:00:00".into());
        date.date_to = Some("2024-03-01 00:00:00".into());
        q.filters = vec![date.clone()];
        assert_eq!(ids(&run_query(&rows(), &q)), vec![1]);

        date.extra.insert("inRangeInclusive".into(), json!(true));
        q.filters = vec![date];
        assert_eq!(ids(&run_query(&rows(), &q)), vec![1, 2, 3]);
    }

    #[test]
    fn date_filter_accepts_widget_timestamp_format() {
        let mut q = query();
        let mut filter = FilterEntry::new("effective");
        filter.filter_type = Some("date".into());
        filter.kind = Some("greaterThan".into());
        filter.date_from = Some("2024-01-01 00:00:00".into());
        q.filters = vec![filter];
        assert_eq!(ids(&run_query(&rows(), &q)), vec![1, 2]);
    }

    #[test]
    fn set_and_compound_filters() {
        let mut q = query();
        let mut set = FilterEntry::new("status");
        set.filter_type = Some("set".into());
        set.values = Some(vec![json!("Draft"), json!("Deleted")]);
        q.filters = vec![set];
        assert_eq!(ids(&run_query(&rows(), &q)), vec![2, 4]);

        let compound = FilterEntry::from_model_entry(
            "code",
            &json!({
                "filterType": "text",
                "operator": "OR",
                "conditions": [
                    {"filterType": "text", "type": "equals", "filter": "XYZ200"},
                    {"filterType": "text", "type": "endsWith", "filter": "102"}
                ]
            }),
        );
        q.filters = vec![compound];
        assert_eq!(ids(&run_query(&rows(), &q)), vec![2, 3]);
    }

    #[test]
    fn multi_key_sort_then_paginate() {
        let mut q = query();
        q.size = 2;
        q.page = 2;
        q.sort_orders = vec![
            SortOrder::new("status", SortDirection::Asc),
            SortOrder::new("carbon", SortDirection::Desc),
        ];
        let envelope = run_query(&rows(), &q);
        // Approved(3, 1), Deleted(4), Draft(2)
        assert_eq!(ids(&envelope), vec![4, 2]);
        assert_eq!(envelope.pagination.total, 4);
        assert_eq!(envelope.pagination.page, 2);
    }

    #[test]
    fn unprovisioned_source_answers_404_and_failures_pass_through() {
        let source = InMemorySource::unprovisioned();
        assert!(source.query(&query()).unwrap_err().is_not_found());

        source.set_rows(Some(rows()));
        source.fail_with(Some(FetchError::new(Some(500), "Internal Server Error")));
        let err = source.query(&query()).unwrap_err();
        assert_eq!(err.status, Some(500));

        source.fail_with(None);
        assert!(source.query(&query()).is_ok());
    }
}
