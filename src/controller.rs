use log::debug;
use serde_json::{Map, Value};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::config::GridConfig;
use crate::error::{FetchError, GridError};
use crate::filter::filters_from_model;
use crate::pagination::PaginationFooter;
use crate::query::{FetchOutcome, FetchRequest, GridQuery, PaginationEnvelope, SortOrder};
use crate::storage::{GridIdentity, GridStorage, SessionStore};
use crate::widget::{ApplyOptions, ColumnState, GridApi};

/// What the hosting view should currently render in place of the grid.
#[derive(Clone, Debug, PartialEq)]
pub enum GridView {
    /// Nothing requested yet.
    Idle,
    Loading,
    Ready(PaginationEnvelope),
    /// Blocking error panel; the grid is not shown.
    Failed(FetchError),
}

impl GridView {
    pub fn rows(&self) -> &[Value] {
        match self {
            GridView::Ready(envelope) => &envelope.rows,
            _ => &[],
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            GridView::Failed(err) => Some(&err.message),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, GridView::Loading)
    }
}

/// Requests a hosting view can make without owning the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridCommand {
    Reset,
    SetPage(u32),
    SetPageSize(u32),
}

/// Cloneable handle for controls that live outside the grid, e.g. a "Reset" button.
#[derive(Clone, Debug)]
pub struct GridHandle {
    tx: UnboundedSender<GridCommand>,
}

impl GridHandle {
    /// Returns `false` once the controller is gone.
    pub fn request_reset(&self) -> bool {
        self.tx.send(GridCommand::Reset).is_ok()
    }

    pub fn request_page(&self, page: u32) -> bool {
        self.tx.send(GridCommand::SetPage(page)).is_ok()
    }

    pub fn request_page_size(&self, size: u32) -> bool {
        self.tx.send(GridCommand::SetPageSize(size)).is_ok()
    }
}

/// Pagination, sort and filter state for one server-paginated grid.
///
/// Every state change returns the single [`FetchRequest`] built from the new state. The
/// caller runs it and reports back through [`complete`](Self::complete); completions for
/// anything but the most recent request are dropped.
pub struct GridStateController<S> {
    config: GridConfig,
    storage: GridStorage<S>,
    query: GridQuery,
    next_seq: u64,
    latest: Option<u64>,
    view: GridView,
    pagination: Option<PaginationFooter>,
    first_render_done: bool,
    commands: UnboundedReceiver<GridCommand>,
    command_tx: UnboundedSender<GridCommand>,
}

impl<S: SessionStore> GridStateController<S> {
    pub fn new(config: GridConfig, store: S) -> Result<Self, GridError> {
        config.validate()?;
        let identity = GridIdentity::new(config.grid_key.as_str())?;
        Ok(GridStateController::with_identity(config, identity, store))
    }

    /// Uses an identity already claimed from an [`IdentityRegistry`](crate::storage::IdentityRegistry).
    pub fn with_identity(config: GridConfig, identity: GridIdentity, store: S) -> Self {
        let mut query = GridQuery::first_page(config.page_size, config.default_sort.clone());
        query.filters = config.default_filters.clone();
        let (command_tx, commands) = unbounded_channel();

        GridStateController {
            storage: GridStorage::new(identity, store),
            config,
            query,
            next_seq: 0,
            latest: None,
            view: GridView::Idle,
            pagination: None,
            first_render_done: false,
            commands,
            command_tx,
        }
    }

    pub fn identity(&self) -> &GridIdentity {
        self.storage.identity()
    }

    pub fn storage(&self) -> &GridStorage<S> {
        &self.storage
    }

    pub fn query(&self) -> &GridQuery {
        &self.query
    }

    pub fn view(&self) -> &GridView {
        &self.view
    }

    pub fn footer(&self) -> Option<&PaginationFooter> {
        self.pagination.as_ref()
    }

    /// Sequence number of the request whose result will be shown.
    pub fn latest_seq(&self) -> Option<u64> {
        self.latest
    }

    pub fn handle(&self) -> GridHandle {
        GridHandle {
            tx: self.command_tx.clone(),
        }
    }

    /// First mount: rehydrate from session storage, or fall back to the configured defaults.
    pub fn on_grid_ready(&mut self, grid: &mut dyn GridApi) -> FetchRequest {
        if let Some(model) = self.storage.load_filter_model() {
            debug!("{}: restoring {} persisted filters", self.identity(), model.len());
            grid.set_filter_model(Some(&model));
            self.query.filters = filters_from_model(&model, &self.config.default_filters);
        }

        match self.storage.load_column_state() {
            Some(state) => {
                debug!("{}: restoring persisted column state", self.identity());
                grid.apply_column_state(
                    &state,
                    ApplyOptions {
                        apply_order: true,
                        clear_unlisted_sort: false,
                    },
                );
                self.query.sort_orders = sort_orders_from_state(&grid.column_state());
            }
            None => {
                self.apply_default_sort(grid);
                self.query.sort_orders = self.config.default_sort.clone();
            }
        }

        self.query.page = 1;
        self.issue(grid)
    }

    pub fn set_page(&mut self, page: u32, grid: &mut dyn GridApi) -> Result<FetchRequest, GridError> {
        if page == 0 {
            return Err(GridError::InvalidPage(page));
        }
        self.query.page = page;
        Ok(self.issue(grid))
    }

    pub fn set_page_size(
        &mut self,
        size: u32,
        grid: &mut dyn GridApi,
    ) -> Result<FetchRequest, GridError> {
        if size == 0 {
            return Err(GridError::InvalidPageSize(size));
        }
        self.query.size = size;
        self.query.page = 1;
        Ok(self.issue(grid))
    }

    pub fn on_filter_changed(&mut self, grid: &mut dyn GridApi) -> FetchRequest {
        let model = grid.filter_model();
        self.query.filters = filters_from_model(&model, &self.config.default_filters);
        self.query.page = 1;
        self.storage.save_filter_model(&model);
        self.issue(grid)
    }

    pub fn on_sort_changed(&mut self, grid: &mut dyn GridApi) -> FetchRequest {
        let state = grid.column_state();
        self.query.sort_orders = sort_orders_from_state(&state);
        self.query.page = 1;
        self.storage.save_column_state(&state);
        self.issue(grid)
    }

    pub fn reset_grid(&mut self, grid: &mut dyn GridApi) -> FetchRequest {
        debug!("{}: reset", self.identity());
        self.storage.clear();
        self.query = GridQuery::first_page(self.config.page_size, self.config.default_sort.clone());
        grid.set_filter_model(None);
        self.apply_default_sort(grid);
        self.issue(grid)
    }

    /// Drains commands sent through [`GridHandle`]s.
    ///
    /// Each command changes state and supersedes the previous one, so only the request of
    /// the last applied command is returned.
    pub fn process_commands(&mut self, grid: &mut dyn GridApi) -> Option<FetchRequest> {
        let mut request = None;
        while let Ok(command) = self.commands.try_recv() {
            let issued = match command {
                GridCommand::Reset => Ok(self.reset_grid(grid)),
                GridCommand::SetPage(page) => self.set_page(page, grid),
                GridCommand::SetPageSize(size) => self.set_page_size(size, grid),
            };
            match issued {
                Ok(issued) => request = Some(issued),
                Err(err) => debug!("{}: ignoring {command:?}: {err}", self.identity()),
            }
        }
        request
    }

    /// Applies a finished fetch. Returns `false` when `seq` is not the latest request.
    pub fn complete(&mut self, seq: u64, outcome: FetchOutcome, grid: &mut dyn GridApi) -> bool {
        if self.latest != Some(seq) {
            debug!(
                "{}: discarding stale response {seq} (latest {:?})",
                self.identity(),
                self.latest
            );
            return false;
        }

        let envelope = match outcome {
            Ok(envelope) => envelope,
            Err(err) if err.is_not_found() => {
                PaginationEnvelope::empty(self.query.page, self.query.size)
            }
            Err(err) => {
                debug!("{}: fetch {seq} failed: {err}", self.identity());
                self.pagination = None;
                self.view = GridView::Failed(err);
                return true;
            }
        };

        grid.set_rows(&envelope.rows);
        if !self.first_render_done {
            grid.hide_overlay();
            self.first_render_done = true;
        }
        self.pagination = Some(PaginationFooter::new(
            envelope.pagination,
            &self.config.page_size_options,
        ));
        self.view = GridView::Ready(envelope);
        true
    }

    fn apply_default_sort(&self, grid: &mut dyn GridApi) {
        let state: Vec<ColumnState> = self
            .config
            .default_sort
            .iter()
            .enumerate()
            .map(|(i, sort)| ColumnState::sorted(&sort.field, sort.direction, i as u32))
            .collect();
        grid.apply_column_state(
            &state,
            ApplyOptions {
                apply_order: false,
                clear_unlisted_sort: true,
            },
        );
    }

    fn issue(&mut self, grid: &mut dyn GridApi) -> FetchRequest {
        self.next_seq += 1;
        self.latest = Some(self.next_seq);
        self.view = GridView::Loading;
        grid.show_loading_overlay();

        debug!(
            "{}: fetch {} page={} size={} sorts={} filters={}",
            self.identity(),
            self.next_seq,
            self.query.page,
            self.query.size,
            self.query.sort_orders.len(),
            self.query.filters.len()
        );

        FetchRequest {
            seq: self.next_seq,
            query: self.query.clone(),
            params: self.params(),
        }
    }

    fn params(&self) -> Map<String, Value> {
        let mut params = self.config.query_params.clone();
        params.insert(
            "dataKey".to_string(),
            Value::String(self.config.data_key.clone()),
        );
        params
    }
}

/// Sorted columns only, primary sort first.
pub fn sort_orders_from_state(state: &[ColumnState]) -> Vec<SortOrder> {
    let mut sorted: Vec<&ColumnState> = state.iter().filter(|s| s.sort.is_some()).collect();
    sorted.sort_by_key(|s| s.sort_index.unwrap_or(u32::MAX));
    sorted
        .into_iter()
        .filter_map(|s| s.sort.map(|direction| SortOrder::new(&s.col_id, direction)))
        .collect()
}

