use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::GridError;
use crate::filter::FilterEntry;
use crate::query::SortOrder;
use crate::storage::GridIdentity;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_page_size_options() -> Vec<u32> {
    vec![10, 25, 50, 100]
}

/// Static configuration of one grid view.
///
/// Loaded from camelCase JSON, e.g.
///
/// ```json
/// {
///   "gridKey": "fuel-code-grid",
///   "dataKey": "fuelCodes",
///   "pageSize": 25,
///   "defaultSort": [{ "field": "lastUpdated", "direction": "desc" }],
///   "defaultFilters": [],
///   "queryParams": { "organizationId": 7 }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridConfig {
    pub grid_key: String,
    pub data_key: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_page_size_options")]
    pub page_size_options: Vec<u32>,
    #[serde(default)]
    pub default_sort: Vec<SortOrder>,
    #[serde(default)]
    pub default_filters: Vec<FilterEntry>,
    #[serde(default)]
    pub query_params: Map<String, Value>,
}

impl GridConfig {
    pub fn new(grid_key: impl Into<String>, data_key: impl Into<String>) -> Self {
        GridConfig {
            grid_key: grid_key.into(),
            data_key: data_key.into(),
            page_size: DEFAULT_PAGE_SIZE,
            page_size_options: default_page_size_options(),
            default_sort: Vec::new(),
            default_filters: Vec::new(),
            query_params: Map::new(),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_default_sort(mut self, sort: Vec<SortOrder>) -> Self {
        self.default_sort = sort;
        self
    }

    pub fn with_default_filters(mut self, filters: Vec<FilterEntry>) -> Self {
        self.default_filters = filters;
        self
    }

    pub fn with_query_param(mut self, key: &str, value: Value) -> Self {
        self.query_params.insert(key.to_string(), value);
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, GridError> {
        let config: GridConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GridError> {
        let raw = std::fs::read_to_string(path)?;
        GridConfig::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), GridError> {
        GridIdentity::new(self.grid_key.as_str())?;
        if self.data_key.trim().is_empty() {
            return Err(GridError::InvalidConfig("dataKey must not be empty".into()));
        }
        if self.query_params.contains_key("dataKey") {
            return Err(GridError::InvalidConfig(
                "queryParams must not set dataKey, use the dataKey field".into(),
            ));
        }
        if self.page_size == 0 {
            return Err(GridError::InvalidPageSize(0));
        }
        if self.page_size_options.contains(&0) {
            return Err(GridError::InvalidConfig(
                "pageSizeOptions must be positive".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for sort in &self.default_sort {
            if !seen.insert(sort.field.as_str()) {
                return Err(GridError::InvalidConfig(format!(
                    "defaultSort lists {:?} twice",
                    sort.field
                )));
            }
        }
        Ok(())
    }
}
