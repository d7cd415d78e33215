/*!
# Grid State

State handling for server-paginated list views, written against an abstract grid widget.

## Overview

A list view in the reporting front end is a data grid fed page by page from a REST endpoint.
Every such view repeats the same bookkeeping: which page and page size are showing, which
columns are sorted and in which priority, which column filters are active, what survives a
reload of the browser tab, and which response is allowed to land on screen when the user
clicks faster than the server answers. Editable columns backed by an autocomplete add a
second piece of shared logic: turning whatever the row carries (an id, a comma-joined list of
ids, an option object or a list of them) into option objects and back.

This crate holds both pieces and nothing view-specific.

## Architecture

### Grid state controller
- **controller**: `GridStateController` owns `{page, size, sortOrders, filters}`, turns every
  change into exactly one `FetchRequest`, and applies completions latest-request-wins
- **storage**: `SessionStore` trait, `MemoryStore`, grid identities and the
  `<id>-filter` / `<id>-column` slots
- **filter**: the widget's raw filter model and its conversion into ordered filter entries
- **query**: `GridQuery`, sort orders and the pagination envelope
- **pagination**: footer model derived from the reported totals
- **config**: per-grid JSON configuration

### Cell value normalizer
- **normalizer**: `CellValueNormalizer`, the autocomplete editor's value model with
  single/multiple, strict/free-text and object/identity modes, plus its keyboard handling

### Collaborators
- **widget**: `GridApi`, the capabilities needed from a grid widget, and `HeadlessGrid`
- **driver**: `DataSource` and a tokio `FetchDriver` that runs fetches concurrently
- **source**: `InMemorySource`, a reference data source answering queries from JSON rows

## Error Handling

Fetch failures are data, not errors: a 404 renders as an empty grid, anything else as an
error panel carrying the server's message. Corrupt persisted state reads as absent. Option
ids that match nothing in the catalog are treated as no selection.
*/

pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod filter;
pub mod normalizer;
pub mod pagination;
pub mod query;
pub mod source;
pub mod storage;
pub mod widget;

/// Re-export everything from these modules to make it easier to use
pub use config::*;
pub use controller::*;
pub use driver::*;
pub use error::*;
pub use filter::*;
pub use normalizer::*;
pub use pagination::*;
pub use query::*;
pub use source::*;
pub use storage::*;
pub use widget::*;
