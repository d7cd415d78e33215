use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::fmt;

use crate::widget::GridApi;

/// A bare option identity.
///
/// `==` is structural. Identity lookups go through [`Scalar::matches`].
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(Number),
    Bool(bool),
}

impl Scalar {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Number(n) => Some(Scalar::Number(n.clone())),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Text(s) => Value::String(s.clone()),
            Scalar::Number(n) => Value::Number(n.clone()),
            Scalar::Bool(b) => Value::Bool(*b),
        }
    }

    /// Identity comparison.
    ///
    /// Numbers compare by value, and a text identity matches a number when it parses to
    /// it, so `"2"` (from a comma-joined list) resolves to an option with value `2`.
    pub fn matches(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Text(a), Scalar::Text(b)) => a == b,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Number(a), Scalar::Number(b)) => numbers_equal(a, b),
            (Scalar::Text(t), Scalar::Number(n)) | (Scalar::Number(n), Scalar::Text(t)) => t
                .trim()
                .parse::<f64>()
                .ok()
                .zip(n.as_f64())
                .is_some_and(|(a, b)| a == b),
            _ => false,
        }
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    matches!((a.as_f64(), b.as_f64()), (Some(x), Some(y)) if x == y)
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n.into())
    }
}

/// An option object: an identity plus whatever display and payload fields it carries.
#[derive(Clone, Debug, PartialEq)]
pub struct OptionObject {
    pub value: Scalar,
    pub label: Option<String>,
    pub name: Option<String>,
    /// Remaining fields, kept so `returnObject` hands back what came in.
    pub extra: Map<String, Value>,
}

impl OptionObject {
    pub fn new(value: impl Into<Scalar>, label: impl Into<String>) -> Self {
        OptionObject {
            value: value.into(),
            label: Some(label.into()),
            name: None,
            extra: Map::new(),
        }
    }

    /// `None` when the object has no scalar `value`.
    pub fn from_map(map: &Map<String, Value>) -> Option<Self> {
        let value = map.get("value").and_then(Scalar::from_json)?;
        let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
        let extra = map
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "value" | "label" | "name"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Some(OptionObject {
            value,
            label: text("label"),
            name: text("name"),
            extra,
        })
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("value".to_string(), self.value.to_json());
        if let Some(label) = &self.label {
            map.insert("label".to_string(), Value::String(label.clone()));
        }
        if let Some(name) = &self.name {
            map.insert("name".to_string(), Value::String(name.clone()));
        }
        for (k, v) in &self.extra {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }
}

/// One selectable item in an editor's option catalog.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum OptionItem {
    Primitive(Scalar),
    Object(OptionObject),
}

impl TryFrom<Value> for OptionItem {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::Object(map) => OptionObject::from_map(map)
                .map(OptionItem::Object)
                .ok_or_else(|| format!("option object without a scalar value: {value}")),
            other => Scalar::from_json(other)
                .map(OptionItem::Primitive)
                .ok_or_else(|| format!("unsupported option: {value}")),
        }
    }
}

impl OptionItem {
    pub fn identity(&self) -> &Scalar {
        match self {
            OptionItem::Primitive(s) => s,
            OptionItem::Object(o) => &o.value,
        }
    }

    /// `label`, then `name`, then the identity itself.
    pub fn display_label(&self) -> String {
        match self {
            OptionItem::Primitive(s) => s.to_string(),
            OptionItem::Object(o) => o
                .label
                .clone()
                .or_else(|| o.name.clone())
                .unwrap_or_else(|| o.value.to_string()),
        }
    }

    /// Equal iff the identities match, whether either side is a bare primitive or an object.
    pub fn same_identity(&self, other: &OptionItem) -> bool {
        self.identity().matches(other.identity())
    }

    pub fn to_json(&self) -> Value {
        match self {
            OptionItem::Primitive(s) => s.to_json(),
            OptionItem::Object(o) => o.to_json(),
        }
    }
}

/// The external cell value, decoded once into one of the shapes it can arrive in.
#[derive(Clone, Debug, PartialEq)]
pub enum RawCellValue {
    Absent,
    Scalar(Scalar),
    Object(OptionObject),
    List(Vec<RawCellValue>),
}

impl RawCellValue {
    /// `null`, `""` and objects without a scalar `value` decode as [`RawCellValue::Absent`].
    pub fn decode(value: &Value) -> Self {
        match value {
            Value::Null => RawCellValue::Absent,
            Value::String(s) if s.is_empty() => RawCellValue::Absent,
            Value::Array(items) => RawCellValue::List(items.iter().map(decode_element).collect()),
            other => decode_element(other),
        }
    }
}

fn decode_element(value: &Value) -> RawCellValue {
    match value {
        Value::Object(map) => match OptionObject::from_map(map) {
            Some(object) => RawCellValue::Object(object),
            None => {
                log::warn!("ignoring cell value object without a scalar value: {value}");
                RawCellValue::Absent
            }
        },
        Value::Array(_) => RawCellValue::Absent,
        other => Scalar::from_json(other).map_or(RawCellValue::Absent, RawCellValue::Scalar),
    }
}

/// The editor's internal value. Multiple mode always holds a list, possibly empty.
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    Single(Option<OptionItem>),
    Multiple(Vec<OptionItem>),
}

impl Selection {
    fn into_mode(self, multiple: bool) -> Selection {
        match (self, multiple) {
            (Selection::Single(item), true) => Selection::Multiple(item.into_iter().collect()),
            (Selection::Multiple(items), false) => {
                Selection::Single(items.into_iter().next())
            }
            (selection, _) => selection,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Per-column editor parameters.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorParams {
    #[serde(default)]
    pub options: Vec<OptionItem>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub free_solo: bool,
    #[serde(default)]
    pub disable_close_on_select: bool,
    #[serde(default = "default_true")]
    pub open_on_focus: bool,
    #[serde(default)]
    pub return_object: bool,
    #[serde(default)]
    pub limit_tags: Option<usize>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub no_label: bool,
}

impl EditorParams {
    pub fn new(options: Vec<OptionItem>) -> Self {
        EditorParams {
            options,
            open_on_focus: true,
            ..EditorParams::default()
        }
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn free_solo(mut self) -> Self {
        self.free_solo = true;
        self
    }

    pub fn return_object(mut self) -> Self {
        self.return_object = true;
        self
    }

    pub fn display_label(&self) -> Option<&str> {
        if self.no_label {
            None
        } else {
            self.label.as_deref()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListState {
    Closed,
    Open,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Enter,
    Tab,
    Escape,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub shift: bool,
}

impl KeyPress {
    pub fn new(key: Key) -> Self {
        KeyPress { key, shift: false }
    }

    pub fn shifted(key: Key) -> Self {
        KeyPress { key, shift: true }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The editor consumed the key.
    Handled,
    /// Value committed and editing stopped; `moved` says whether another cell took over.
    Committed { moved: bool },
    /// Let the grid handle it.
    Ignored,
}

type ChangeListener = Box<dyn FnMut(&Value)>;

/// Autocomplete cell editor state: option resolution, selection, typed text and the
/// open/closed list, for one edit session.
pub struct CellValueNormalizer {
    params: EditorParams,
    selection: Selection,
    input: String,
    list: ListState,
    on_change: Option<ChangeListener>,
}

impl fmt::Debug for CellValueNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellValueNormalizer")
            .field("selection", &self.selection)
            .field("input", &self.input)
            .field("list", &self.list)
            .finish_non_exhaustive()
    }
}

impl CellValueNormalizer {
    pub fn new(params: EditorParams, external: &Value) -> Self {
        let mut editor = CellValueNormalizer {
            selection: Selection::Single(None),
            input: String::new(),
            list: ListState::Closed,
            on_change: None,
            params,
        };
        editor.parse_initial_value(&RawCellValue::decode(external));
        editor
    }

    /// Registers the grid's value-change callback.
    pub fn with_change_listener(mut self, listener: impl FnMut(&Value) + 'static) -> Self {
        self.on_change = Some(Box::new(listener));
        self
    }

    pub fn params(&self) -> &EditorParams {
        &self.params
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn list_state(&self) -> ListState {
        self.list
    }

    fn resolve(&self, raw: &Scalar) -> Option<OptionItem> {
        self.params
            .options
            .iter()
            .find(|option| option.identity().matches(raw))
            .cloned()
    }

    fn resolve_raw(&self, raw: &RawCellValue) -> Option<OptionItem> {
        match raw {
            RawCellValue::Object(object) => Some(OptionItem::Object(object.clone())),
            RawCellValue::Scalar(scalar) => self.resolve(scalar),
            RawCellValue::Absent | RawCellValue::List(_) => None,
        }
    }

    /// Rebuilds the selection from an external value. Ids with no matching option are dropped.
    pub fn parse_initial_value(&mut self, raw: &RawCellValue) {
        self.input.clear();

        if self.params.multiple {
            let items = match raw {
                RawCellValue::Absent => Vec::new(),
                RawCellValue::List(items) => {
                    items.iter().filter_map(|item| self.resolve_raw(item)).collect()
                }
                RawCellValue::Scalar(Scalar::Text(joined)) => joined
                    .split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .filter_map(|part| self.resolve(&Scalar::Text(part.to_string())))
                    .collect(),
                other => self.resolve_raw(other).into_iter().collect(),
            };
            self.selection = Selection::Multiple(items);
            return;
        }

        let item = match raw {
            RawCellValue::Scalar(Scalar::Text(text)) => {
                // Only the lookup uses the first comma part; free text is kept whole.
                let first = text.split(',').next().unwrap_or_default().trim();
                let resolved = self.resolve(&Scalar::Text(first.to_string()));
                if resolved.is_none() && self.params.free_solo {
                    self.input = text.clone();
                }
                resolved
            }
            RawCellValue::List(items) => items.first().and_then(|item| self.resolve_raw(item)),
            other => self.resolve_raw(other),
        };
        if self.params.free_solo {
            if let Some(item) = &item {
                self.input = item.display_label();
            }
        }
        self.selection = Selection::Single(item);
    }

    /// The option list reports a new selection.
    pub fn on_select(&mut self, selection: Selection) {
        self.selection = selection.into_mode(self.params.multiple);

        if self.params.free_solo && !self.params.multiple {
            self.input = match &self.selection {
                Selection::Single(Some(item)) => item.display_label(),
                _ => String::new(),
            };
        }
        if !self.params.disable_close_on_select {
            self.list = ListState::Closed;
        }
        self.emit();
    }

    /// Text typed into the input box.
    pub fn on_input_change(&mut self, text: &str) {
        self.input = text.to_string();
    }

    pub fn is_option_selected(&self, option: &OptionItem) -> bool {
        match &self.selection {
            Selection::Single(Some(item)) => item.same_identity(option),
            Selection::Single(None) => false,
            Selection::Multiple(items) => items.iter().any(|item| item.same_identity(option)),
        }
    }

    /// Options whose label contains the typed text, ignoring case.
    pub fn filtered_options(&self) -> Vec<&OptionItem> {
        let needle = self.input.trim().to_lowercase();
        self.params
            .options
            .iter()
            .filter(|option| {
                needle.is_empty() || option.display_label().to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Labels of the tags to show and how many more are hidden behind `limitTags`.
    pub fn visible_tags(&self) -> (Vec<String>, usize) {
        let Selection::Multiple(items) = &self.selection else {
            return (Vec::new(), 0);
        };
        let limit = self.params.limit_tags.unwrap_or(items.len());
        let shown = items.iter().take(limit).map(OptionItem::display_label).collect();
        (shown, items.len().saturating_sub(limit))
    }

    fn reduce(&self, item: &OptionItem) -> Value {
        if self.params.return_object {
            item.to_json()
        } else {
            item.identity().to_json()
        }
    }

    /// The value in the shape the column expects back.
    pub fn get_current_value(&self) -> Value {
        match &self.selection {
            Selection::Multiple(items) => {
                Value::Array(items.iter().map(|item| self.reduce(item)).collect())
            }
            Selection::Single(Some(item)) => self.reduce(item),
            Selection::Single(None) if self.params.free_solo => Value::String(self.input.clone()),
            Selection::Single(None) if self.params.return_object => Value::Null,
            Selection::Single(None) => Value::String(String::new()),
        }
    }

    fn emit(&mut self) {
        let value = self.get_current_value();
        if let Some(listener) = self.on_change.as_mut() {
            listener(&value);
        }
    }

    pub fn on_focus(&mut self) {
        if self.params.open_on_focus {
            self.list = ListState::Open;
        }
    }

    /// Focus left by any path other than Tab. The value was already emitted on selection.
    pub fn on_blur(&mut self, grid: &mut dyn GridApi) {
        self.list = ListState::Closed;
        grid.stop_editing();
    }

    pub fn on_key(&mut self, press: KeyPress, grid: &mut dyn GridApi) -> KeyOutcome {
        match press.key {
            Key::Enter => {
                self.list = match self.list {
                    ListState::Open => ListState::Closed,
                    ListState::Closed => ListState::Open,
                };
                KeyOutcome::Handled
            }
            Key::Escape if self.list == ListState::Open => {
                self.list = ListState::Closed;
                KeyOutcome::Handled
            }
            Key::Tab => {
                self.emit();
                self.list = ListState::Closed;
                grid.stop_editing();

                let moved = if press.shift {
                    grid.tab_to_previous_cell()
                } else {
                    grid.tab_to_next_cell()
                };
                if moved {
                    if let Some(cell) = grid.focused_cell() {
                        grid.start_editing_cell(&cell);
                    }
                }
                KeyOutcome::Committed { moved }
            }
            Key::Escape | Key::Other => KeyOutcome::Ignored,
        }
    }
}
