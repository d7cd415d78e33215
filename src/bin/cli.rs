#![cfg(not(tarpaulin_include))]

use gridstate::{
    FetchDriver, FetchRequest, GridApi, GridConfig, GridStateController, GridView, HeadlessGrid,
    IdentityRegistry, InMemorySource, MemoryStore, SortDirection,
};
use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use serde_json::{Value, json};
use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

lazy_static! {
    static ref PAGE_RE: Regex = Regex::new(r"^(page|size)\s+(\d+)$").unwrap();
    static ref FILTER_RE: Regex = Regex::new(r"^filter\s+(\S+)\s+(\S+)\s+(.+)$").unwrap();
    static ref CLEAR_RE: Regex = Regex::new(r"^clear(?:\s+(\S+))?$").unwrap();
    static ref SORT_RE: Regex = Regex::new(r"^sort\s+(\S+)\s+(asc|desc|none)(\s+\+)?$").unwrap();
}

struct Args {
    rows: PathBuf,
    page_size: Option<u32>,
    session: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Option<Args> {
    let mut rows = None;
    let mut page_size = None;
    let mut session = None;
    let mut config = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--page-size" => page_size = Some(iter.next()?.parse().ok()?),
            "--session" => session = Some(PathBuf::from(iter.next()?)),
            "--config" => config = Some(PathBuf::from(iter.next()?)),
            other if rows.is_none() && !other.starts_with("--") => rows = Some(PathBuf::from(other)),
            _ => return None,
        }
    }

    Some(Args {
        rows: rows?,
        page_size,
        session,
        config,
    })
}

/// Rows come either as a bare array or wrapped under the grid's data key.
fn load_rows(path: &Path, data_key: &str) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)?;
    match value {
        Value::Array(rows) => Ok(rows),
        other => other
            .get(data_key)
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| format!("expected an array or an object with \"{data_key}\"").into()),
    }
}

async fn run_fetch(
    request: FetchRequest,
    ctl: &mut GridStateController<Rc<MemoryStore>>,
    grid: &mut HeadlessGrid,
    driver: &mut FetchDriver<InMemorySource>,
) {
    driver.dispatch(request);
    while let Some(done) = driver.next_completion().await {
        ctl.complete(done.seq, done.outcome, grid);
    }
}

fn display(ctl: &GridStateController<Rc<MemoryStore>>, grid: &HeadlessGrid) {
    if let GridView::Failed(err) = ctl.view() {
        println!("error: {err}");
        return;
    }

    let columns = grid.column_order();
    let header: Vec<String> = columns
        .iter()
        .map(|col| {
            let sort = grid
                .column_state()
                .into_iter()
                .find(|s| s.col_id == *col)
                .and_then(|s| s.sort.map(|d| (d, s.sort_index.unwrap_or(0))));
            match sort {
                Some((SortDirection::Asc, i)) => format!("{col} ^{}", i + 1),
                Some((SortDirection::Desc, i)) => format!("{col} v{}", i + 1),
                None => col.to_string(),
            }
        })
        .collect();
    println!("{}", header.join(" | "));

    for row in ctl.view().rows() {
        let cells: Vec<String> = columns
            .iter()
            .map(|col| match row.get(*col) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect();
        println!("{}", cells.join(" | "));
    }

    if let Some(footer) = ctl.footer() {
        println!("{}", footer.label());
    }
    let model = grid.filter_model();
    if !model.is_empty() {
        println!("filters: {}", Value::Object(model));
    }
}

/// Builds the widget's filter model entry for a typed command.
fn filter_predicate(kind: &str, value: &str) -> Value {
    match value.parse::<f64>() {
        Ok(number) => json!({"filterType": "number", "type": kind, "filter": number}),
        Err(_) => json!({"filterType": "text", "type": kind, "filter": value}),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let s = Instant::now();
    let argv: Vec<String> = env::args().collect();
    let Some(args) = parse_args(&argv) else {
        eprintln!(
            "Usage: {} <rows.json> [--page-size N] [--session FILE] [--config FILE]",
            argv[0]
        );
        return Ok(());
    };

    let mut config = match &args.config {
        Some(path) => GridConfig::from_path(path)?,
        None => GridConfig::new("grid-cli", "rows"),
    };
    if let Some(size) = args.page_size {
        config = config.with_page_size(size);
    }
    config.validate()?;

    let rows = load_rows(&args.rows, &config.data_key)?;
    let columns: Vec<String> = rows
        .first()
        .and_then(Value::as_object)
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default();
    let column_ids: Vec<&str> = columns.iter().map(String::as_str).collect();
    info!("loaded {} rows with {} columns", rows.len(), columns.len());

    let store = match &args.session {
        Some(path) if path.exists() => match MemoryStore::load_snapshot(path) {
            Ok(store) => {
                info!("restored session from {}", path.display());
                store
            }
            Err(err) => {
                warn!("ignoring unreadable session {}: {err}", path.display());
                MemoryStore::new()
            }
        },
        _ => MemoryStore::new(),
    };
    let store = Rc::new(store);

    let mut registry = IdentityRegistry::new();
    let identity = registry.claim(&config.grid_key)?;
    let mut ctl = GridStateController::with_identity(config, identity, Rc::clone(&store));
    let handle = ctl.handle();
    let mut grid = HeadlessGrid::with_columns(&column_ids);
    let mut driver = FetchDriver::new(InMemorySource::new(rows));

    let request = ctl.on_grid_ready(&mut grid);
    run_fetch(request, &mut ctl, &mut grid, &mut driver).await;

    let mut start_time = Instant::now();
    let mut status = String::from("ok");
    let mut show = true;
    loop {
        if show {
            display(&ctl, &grid);
        }

        let elapsed_time = start_time.elapsed().as_secs_f64();
        print!("[{:.1}] ({}) > ", elapsed_time, status);
        io::stdout().flush()?;

        let mut command = String::new();
        if io::stdin().read_line(&mut command)? == 0 {
            break;
        }
        let command = command.trim();
        start_time = Instant::now();
        show = true;

        let request = if command == "q" {
            break;
        } else if command == "help" {
            println!("Commands:");
            println!("  q: Quit");
            println!("  show: Print the current page");
            println!("  page <n>: Go to page n");
            println!("  size <n>: Change the page size");
            println!("  filter <column> <type> <value>: Filter a column, e.g. filter code contains FC");
            println!("  clear [column]: Clear one column filter, or all of them");
            println!("  sort <column> asc|desc|none [+]: Sort a column, '+' adds to the current sort");
            println!("  reset: Restore the default page, sort and filters");
            show = false;
            status = String::from("ok");
            continue;
        } else if command == "show" {
            status = String::from("ok");
            continue;
        } else if command == "reset" {
            handle.request_reset();
            ctl.process_commands(&mut grid)
        } else if let Some(caps) = PAGE_RE.captures(command) {
            let n: u32 = caps[2].parse().unwrap_or(0);
            let requested = match &caps[1] {
                "page" => ctl.set_page(n, &mut grid),
                _ => ctl.set_page_size(n, &mut grid),
            };
            match requested {
                Ok(request) => Some(request),
                Err(err) => {
                    status = err.to_string();
                    show = false;
                    continue;
                }
            }
        } else if let Some(caps) = FILTER_RE.captures(command) {
            grid.set_column_filter(&caps[1], filter_predicate(&caps[2], caps[3].trim()));
            Some(ctl.on_filter_changed(&mut grid))
        } else if let Some(caps) = CLEAR_RE.captures(command) {
            match caps.get(1) {
                Some(col) => grid.clear_column_filter(col.as_str()),
                None => grid.set_filter_model(None),
            }
            Some(ctl.on_filter_changed(&mut grid))
        } else if let Some(caps) = SORT_RE.captures(command) {
            if grid.column(&caps[1]).is_none() {
                status = String::from("unknown column");
                show = false;
                continue;
            }
            let direction = SortDirection::from_str_opt(&caps[2]);
            grid.sort_column(&caps[1], direction, caps.get(3).is_some());
            Some(ctl.on_sort_changed(&mut grid))
        } else {
            status = String::from("invalid command");
            show = false;
            continue;
        };

        if let Some(request) = request {
            run_fetch(request, &mut ctl, &mut grid, &mut driver).await;
        }
        status = String::from("ok");
    }

    if let Some(path) = &args.session {
        store.save_snapshot(path)?;
        info!("saved session to {}", path.display());
    }
    registry.release(ctl.identity());

    let e = s.elapsed().as_secs_f64();
    println!("Total elapsed time: {:.1} seconds", e);

    Ok(())
}
