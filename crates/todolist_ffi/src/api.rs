//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the list screen intents (add, toggle, delete, filter) to Dart.
//! - Return ready-to-render item lists, filtered and sorted in core.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Failed calls return `ok=false`, a message, and the unchanged list when
//!   storage is readable.

use log::warn;
use std::path::PathBuf;
use std::sync::OnceLock;
use todolist_core::db::open_db;
use todolist_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Item, ItemFilter, ItemRepository, ListCommand, ListController, ListError,
    SqliteItemRepository,
};

const DB_FILE_NAME: &str = "todolist.sqlite3";
const DB_PATH_ENV: &str = "TODOLIST_DB_PATH";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// One row of the rendered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoItemView {
    pub id: i64,
    pub content: String,
    pub complete: bool,
    /// Creation time in epoch milliseconds.
    pub time_stamp: i64,
}

/// Response envelope shared by all list calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoListResponse {
    /// Whether the requested action succeeded.
    pub ok: bool,
    /// Items for `filter`, newest first.
    pub items: Vec<TodoItemView>,
    /// Applied filter label (`all|uncomplete|complete`).
    pub filter: String,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

/// Loads the list for `filter`. Unknown filter labels show all items.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn todo_list(filter: String) -> TodoListResponse {
    with_list_controller(&filter, "todo_list", "Loaded.", |_| Ok(()))
}

/// Adds one item from the input box text.
///
/// Blank text is rejected without touching storage.
#[flutter_rust_bridge::frb(sync)]
pub fn todo_add(content: String, filter: String) -> TodoListResponse {
    with_list_controller(&filter, "todo_add", "Item added.", |controller| {
        controller.dispatch(ListCommand::SetDraft(content))?;
        controller.dispatch(ListCommand::Add)
    })
}

/// Sets the completion flag of one item.
#[flutter_rust_bridge::frb(sync)]
pub fn todo_set_complete(id: i64, complete: bool, filter: String) -> TodoListResponse {
    with_list_controller(&filter, "todo_set_complete", "Item updated.", |controller| {
        controller.dispatch(ListCommand::SetComplete { id, complete })
    })
}

/// Deletes one item. Deleting an absent id succeeds.
#[flutter_rust_bridge::frb(sync)]
pub fn todo_delete(id: i64, filter: String) -> TodoListResponse {
    with_list_controller(&filter, "todo_delete", "Item deleted.", |controller| {
        controller.dispatch(ListCommand::Delete(id))
    })
}

/// Drops all items and recreates an empty table.
#[flutter_rust_bridge::frb(sync)]
pub fn todo_reset(filter: String) -> TodoListResponse {
    let applied = ItemFilter::from_label(&filter);
    match reset_items() {
        Ok(()) => with_list_controller(applied.label(), "todo_reset", "List cleared.", |_| Ok(())),
        Err(message) => {
            warn!("event=ffi_call module=ffi status=error call=todo_reset");
            failure(applied, Vec::new(), format!("todo_reset failed: {message}"))
        }
    }
}

fn reset_items() -> Result<(), String> {
    let conn = open_db(resolve_db_path()).map_err(|err| format!("DB open failed: {err}"))?;
    let repo = SqliteItemRepository::new(&conn);
    repo.drop_schema().map_err(|err| err.to_string())?;
    repo.ensure_schema().map_err(|err| err.to_string())?;
    Ok(())
}

fn with_list_controller(
    filter: &str,
    call: &'static str,
    success_message: &str,
    f: impl FnOnce(&mut ListController<SqliteItemRepository<'_>>) -> Result<(), ListError>,
) -> TodoListResponse {
    let applied = ItemFilter::from_label(filter);
    let conn = match open_db(resolve_db_path()) {
        Ok(conn) => conn,
        Err(err) => {
            return failure(
                applied,
                Vec::new(),
                format!("{call} failed: DB open failed: {err}"),
            );
        }
    };
    let mut controller = match SqliteItemRepository::try_new(&conn)
        .map_err(ListError::from)
        .and_then(ListController::load)
    {
        Ok(controller) => controller,
        Err(err) => return failure(applied, Vec::new(), format!("{call} failed: {err}")),
    };

    if let Err(err) = controller.dispatch(ListCommand::SetFilter(applied)) {
        return failure(applied, Vec::new(), format!("{call} failed: {err}"));
    }
    let outcome = f(&mut controller);
    let items = controller
        .visible_items()
        .into_iter()
        .map(to_item_view)
        .collect::<Vec<_>>();

    match outcome {
        Ok(()) => TodoListResponse {
            ok: true,
            items,
            filter: applied.label().to_string(),
            message: success_message.to_string(),
        },
        Err(err) => {
            warn!("event=ffi_call module=ffi status=error call={call}");
            failure(applied, items, format!("{call} failed: {err}"))
        }
    }
}

fn failure(filter: ItemFilter, items: Vec<TodoItemView>, message: String) -> TodoListResponse {
    TodoListResponse {
        ok: false,
        items,
        filter: filter.label().to_string(),
        message,
    }
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn to_item_view(item: &Item) -> TodoItemView {
    TodoItemView {
        id: item.id,
        content: item.content.clone(),
        complete: item.complete,
        time_stamp: item.timestamp,
    }
}
