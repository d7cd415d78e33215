use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::filter::FilterModel;
use crate::query::SortDirection;

/// Per-column state as the grid widget reports and re-applies it.
///
/// Persisted whole, so column order and width survive alongside sort.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnState {
    pub col_id: String,
    #[serde(default)]
    pub sort: Option<SortDirection>,
    #[serde(default)]
    pub sort_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ColumnState {
    pub fn new(col_id: impl Into<String>) -> Self {
        ColumnState {
            col_id: col_id.into(),
            sort: None,
            sort_index: None,
            hide: None,
            width: None,
            extra: Map::new(),
        }
    }

    pub fn sorted(col_id: impl Into<String>, direction: SortDirection, sort_index: u32) -> Self {
        let mut state = ColumnState::new(col_id);
        state.sort = Some(direction);
        state.sort_index = Some(sort_index);
        state
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Reorder columns to match the order of the supplied state.
    pub apply_order: bool,
    /// Clear sort on every column the supplied state does not mention.
    pub clear_unlisted_sort: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellPosition {
    pub row_index: usize,
    pub col_id: String,
}

impl CellPosition {
    pub fn new(row_index: usize, col_id: impl Into<String>) -> Self {
        CellPosition {
            row_index,
            col_id: col_id.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Overlay {
    #[default]
    None,
    Loading,
    NoRows,
}

/// Capabilities the controller and the cell editor need from a grid widget.
pub trait GridApi {
    fn filter_model(&self) -> FilterModel;
    /// `None` clears every column filter.
    fn set_filter_model(&mut self, model: Option<&FilterModel>);

    fn column_state(&self) -> Vec<ColumnState>;
    fn apply_column_state(&mut self, state: &[ColumnState], options: ApplyOptions);

    fn set_rows(&mut self, rows: &[Value]);
    fn show_loading_overlay(&mut self);
    fn hide_overlay(&mut self);

    fn focused_cell(&self) -> Option<CellPosition>;
    fn start_editing_cell(&mut self, cell: &CellPosition);
    fn stop_editing(&mut self);
    /// Moves focus forward; `false` when there is no next cell.
    fn tab_to_next_cell(&mut self) -> bool;
    /// Moves focus backward; `false` when there is no previous cell.
    fn tab_to_previous_cell(&mut self) -> bool;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub col_id: String,
    pub editable: bool,
}

impl ColumnDef {
    pub fn new(col_id: impl Into<String>) -> Self {
        ColumnDef {
            col_id: col_id.into(),
            editable: false,
        }
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }
}

/// A grid widget without a screen: enough behaviour to drive the controller and editors.
#[derive(Clone, Debug, Default)]
pub struct HeadlessGrid {
    columns: Vec<ColumnDef>,
    state: Vec<ColumnState>,
    filter_model: FilterModel,
    rows: Vec<Value>,
    overlay: Overlay,
    focused: Option<CellPosition>,
    editing: Option<CellPosition>,
}

impl HeadlessGrid {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        let state = columns.iter().map(|c| ColumnState::new(&c.col_id)).collect();
        HeadlessGrid {
            columns,
            state,
            ..HeadlessGrid::default()
        }
    }

    pub fn with_columns(ids: &[&str]) -> Self {
        HeadlessGrid::new(ids.iter().map(|id| ColumnDef::new(*id)).collect())
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    pub fn overlay(&self) -> Overlay {
        self.overlay
    }

    pub fn editing_cell(&self) -> Option<&CellPosition> {
        self.editing.as_ref()
    }

    pub fn column_order(&self) -> Vec<&str> {
        self.state.iter().map(|s| s.col_id.as_str()).collect()
    }

    pub fn column(&self, col_id: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.col_id == col_id)
    }

    /// Simulates the user typing into a column's floating filter.
    pub fn set_column_filter(&mut self, col_id: &str, predicate: Value) {
        self.filter_model.insert(col_id.to_string(), predicate);
    }

    pub fn clear_column_filter(&mut self, col_id: &str) {
        self.filter_model.shift_remove(col_id);
    }

    /// Simulates a header click. With `multi` the column is added after the existing sorts,
    /// otherwise it replaces them.
    pub fn sort_column(&mut self, col_id: &str, direction: Option<SortDirection>, multi: bool) {
        if !multi {
            for s in self.state.iter_mut().filter(|s| s.col_id != col_id) {
                s.sort = None;
                s.sort_index = None;
            }
        }

        let next_index = self
            .state
            .iter()
            .filter(|s| s.col_id != col_id)
            .filter_map(|s| s.sort_index)
            .max()
            .map_or(0, |m| m + 1);

        if let Some(s) = self.state.iter_mut().find(|s| s.col_id == col_id) {
            match direction {
                Some(direction) => {
                    if s.sort_index.is_none() {
                        s.sort_index = Some(next_index);
                    }
                    s.sort = Some(direction);
                }
                None => {
                    s.sort = None;
                    s.sort_index = None;
                }
            }
        }
        self.compact_sort_indexes();
    }

    pub fn move_column(&mut self, col_id: &str, to: usize) {
        if let Some(from) = self.state.iter().position(|s| s.col_id == col_id) {
            let moved = self.state.remove(from);
            let to = to.min(self.state.len());
            self.state.insert(to, moved);
        }
    }

    pub fn focus_cell(&mut self, cell: CellPosition) {
        self.focused = Some(cell);
    }

    fn compact_sort_indexes(&mut self) {
        let mut sorted: Vec<usize> = (0..self.state.len())
            .filter(|&i| self.state[i].sort.is_some())
            .collect();
        sorted.sort_by_key(|&i| self.state[i].sort_index.unwrap_or(u32::MAX));
        for (rank, i) in sorted.into_iter().enumerate() {
            self.state[i].sort_index = Some(rank as u32);
        }
    }

    fn visible_columns(&self) -> Vec<&str> {
        self.state
            .iter()
            .filter(|s| s.hide != Some(true))
            .map(|s| s.col_id.as_str())
            .collect()
    }

    fn step_focus(&mut self, forward: bool) -> bool {
        let Some(current) = self.focused.clone() else {
            return false;
        };
        let columns = self.visible_columns();
        let Some(col) = columns.iter().position(|c| *c == current.col_id) else {
            return false;
        };

        let next = if forward {
            if col + 1 < columns.len() {
                Some((current.row_index, col + 1))
            } else if current.row_index + 1 < self.rows.len() {
                Some((current.row_index + 1, 0))
            } else {
                None
            }
        } else if col > 0 {
            Some((current.row_index, col - 1))
        } else if current.row_index > 0 {
            Some((current.row_index - 1, columns.len() - 1))
        } else {
            None
        };

        match next {
            Some((row, col)) => {
                let col_id = columns[col].to_string();
                self.focused = Some(CellPosition::new(row, col_id));
                true
            }
            None => false,
        }
    }
}

impl GridApi for HeadlessGrid {
    fn filter_model(&self) -> FilterModel {
        self.filter_model.clone()
    }

    fn set_filter_model(&mut self, model: Option<&FilterModel>) {
        self.filter_model = model.cloned().unwrap_or_default();
    }

    fn column_state(&self) -> Vec<ColumnState> {
        self.state.clone()
    }

    fn apply_column_state(&mut self, state: &[ColumnState], options: ApplyOptions) {
        for s in self.state.iter_mut() {
            match state.iter().find(|incoming| incoming.col_id == s.col_id) {
                Some(incoming) => {
                    s.sort = incoming.sort;
                    s.sort_index = incoming.sort.and(incoming.sort_index);
                    if incoming.hide.is_some() {
                        s.hide = incoming.hide;
                    }
                    if incoming.width.is_some() {
                        s.width = incoming.width;
                    }
                    for (k, v) in &incoming.extra {
                        s.extra.insert(k.clone(), v.clone());
                    }
                }
                None if options.clear_unlisted_sort => {
                    s.sort = None;
                    s.sort_index = None;
                }
                None => {}
            }
        }

        if options.apply_order {
            let mut reordered: Vec<ColumnState> = state
                .iter()
                .filter_map(|incoming| self.state.iter().find(|s| s.col_id == incoming.col_id))
                .cloned()
                .collect();
            for s in &self.state {
                if !reordered.iter().any(|r| r.col_id == s.col_id) {
                    reordered.push(s.clone());
                }
            }
            self.state = reordered;
        }
        self.compact_sort_indexes();
    }

    fn set_rows(&mut self, rows: &[Value]) {
        self.rows = rows.to_vec();
        self.overlay = if rows.is_empty() {
            Overlay::NoRows
        } else {
            Overlay::None
        };
    }

    fn show_loading_overlay(&mut self) {
        self.overlay = Overlay::Loading;
    }

    fn hide_overlay(&mut self) {
        self.overlay = Overlay::None;
    }

    fn focused_cell(&self) -> Option<CellPosition> {
        self.focused.clone()
    }

    fn start_editing_cell(&mut self, cell: &CellPosition) {
        self.focused = Some(cell.clone());
        self.editing = Some(cell.clone());
    }

    fn stop_editing(&mut self) {
        self.editing = None;
    }

    fn tab_to_next_cell(&mut self) -> bool {
        self.step_focus(true)
    }

    fn tab_to_previous_cell(&mut self) -> bool {
        self.step_focus(false)
    }
}
