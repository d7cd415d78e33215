use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The widget's native filter model: field name to predicate object, in the
/// order the user applied them.
pub type FilterModel = Map<String, Value>;

/// One entry of the controller's ordered `filters` sequence.
///
/// It is the widget predicate with its field name folded in, which is the shape the list
/// endpoints accept. Keys the crate does not know about (e.g. `operator`/`conditions` of
/// compound filters) survive in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterEntry {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_to: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterType {
    Text,
    Number,
    Date,
    Set,
    Other,
}

impl FilterEntry {
    pub fn new(field: impl Into<String>) -> Self {
        FilterEntry {
            field: field.into(),
            filter_type: None,
            kind: None,
            filter: None,
            filter_to: None,
            date_from: None,
            date_to: None,
            values: None,
            extra: Map::new(),
        }
    }

    /// Shorthand for the common `{filterType, type, filter}` predicate.
    pub fn simple(
        field: impl Into<String>,
        filter_type: &str,
        kind: &str,
        filter: impl Into<Value>,
    ) -> Self {
        let mut entry = FilterEntry::new(field);
        entry.filter_type = Some(filter_type.to_string());
        entry.kind = Some(kind.to_string());
        entry.filter = Some(filter.into());
        entry
    }

    /// Builds an entry from one `field -> predicate` pair of a raw filter model.
    ///
    /// A predicate that does not fit the known keys is kept verbatim in `extra`
    /// rather than dropped.
    pub fn from_model_entry(field: &str, predicate: &Value) -> Self {
        let Value::Object(map) = predicate else {
            let mut entry = FilterEntry::new(field);
            entry.filter = Some(predicate.clone());
            return entry;
        };

        let mut object = map.clone();
        object.insert("field".to_string(), Value::String(field.to_string()));
        match serde_json::from_value::<FilterEntry>(Value::Object(object)) {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("filter predicate for {field:?} has unexpected shape: {err}");
                let mut entry = FilterEntry::new(field);
                entry.extra = map.clone();
                entry
            }
        }
    }

    pub fn filter_type(&self) -> FilterType {
        match self.filter_type.as_deref() {
            Some("text") => FilterType::Text,
            Some("number") => FilterType::Number,
            Some("date") => FilterType::Date,
            Some("set") => FilterType::Set,
            _ => FilterType::Other,
        }
    }
}

/// User filters in model iteration order, then the configured defaults.
///
/// Entries are never deduplicated: a default on a field the user also filtered is sent twice.
pub fn filters_from_model(model: &FilterModel, defaults: &[FilterEntry]) -> Vec<FilterEntry> {
    model
        .iter()
        .map(|(field, predicate)| FilterEntry::from_model_entry(field, predicate))
        .chain(defaults.iter().cloned())
        .collect()
}
