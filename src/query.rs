use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FetchError, GridError};
use crate::filter::FilterEntry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: String,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        SortOrder {
            field: field.into(),
            direction,
        }
    }
}

/// The argument of every fetch.
///
/// `sort_orders` is in priority order: the first entry is the primary sort.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridQuery {
    pub page: u32,
    pub size: u32,
    pub sort_orders: Vec<SortOrder>,
    pub filters: Vec<FilterEntry>,
}

impl GridQuery {
    pub fn first_page(size: u32, sort_orders: Vec<SortOrder>) -> Self {
        GridQuery {
            page: 1,
            size,
            sort_orders,
            filters: Vec::new(),
        }
    }

    /// Zero-based offset of the first row of `page`.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.size as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

/// Server response: rows under a per-view key, plus the reported pagination.
#[derive(Clone, Debug, PartialEq)]
pub struct PaginationEnvelope {
    pub rows: Vec<Value>,
    pub pagination: Pagination,
}

impl PaginationEnvelope {
    pub fn empty(page: u32, size: u32) -> Self {
        PaginationEnvelope {
            rows: Vec::new(),
            pagination: Pagination {
                page,
                size,
                total: 0,
            },
        }
    }

    /// Decodes `{ <data_key>: [...], pagination: {page, size, total} }`.
    pub fn from_json(value: &Value, data_key: &str) -> Result<Self, GridError> {
        let object = value
            .as_object()
            .ok_or_else(|| GridError::Envelope("response is not an object".to_string()))?;

        let rows = match object.get(data_key) {
            Some(Value::Array(rows)) => rows.clone(),
            Some(Value::Null) | None => {
                return Err(GridError::Envelope(format!("missing data key {data_key:?}")));
            }
            Some(_) => {
                return Err(GridError::Envelope(format!(
                    "data key {data_key:?} is not an array"
                )));
            }
        };

        let pagination = object
            .get("pagination")
            .cloned()
            .ok_or_else(|| GridError::Envelope("missing pagination".to_string()))?;
        let pagination: Pagination = serde_json::from_value(pagination)?;

        Ok(PaginationEnvelope { rows, pagination })
    }

    pub fn to_json(&self, data_key: &str) -> Value {
        let mut object = Map::new();
        object.insert(data_key.to_string(), Value::Array(self.rows.clone()));
        object.insert(
            "pagination".to_string(),
            serde_json::to_value(self.pagination).unwrap_or(Value::Null),
        );
        Value::Object(object)
    }
}

/// What a data source hands back for one request.
pub type FetchOutcome = Result<PaginationEnvelope, FetchError>;

/// One fetch the controller wants issued.
///
/// `seq` grows monotonically per controller; only the completion carrying the latest
/// `seq` is applied.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest {
    pub seq: u64,
    pub query: GridQuery,
    pub params: Map<String, Value>,
}
