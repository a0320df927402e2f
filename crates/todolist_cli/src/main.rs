//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `todolist_core` linkage without the Flutter/FFI runtime.
//! - Exercise one add/toggle/list cycle against an in-memory store.

use std::process::ExitCode;
use todolist_core::db::open_db_in_memory;
use todolist_core::{ItemFilter, ListCommand, ListController, SqliteItemRepository};

fn main() -> ExitCode {
    println!("todolist_core ping={}", todolist_core::ping());
    println!("todolist_core version={}", todolist_core::core_version());

    match run_smoke_cycle() {
        Ok(summary) => {
            println!("todolist_core smoke={summary}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("todolist_core smoke failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_smoke_cycle() -> Result<String, Box<dyn std::error::Error>> {
    let conn = open_db_in_memory()?;
    let repo = SqliteItemRepository::try_new(&conn)?;
    let mut controller = ListController::load(repo)?;

    controller.dispatch(ListCommand::SetDraft("smoke item".to_string()))?;
    controller.dispatch(ListCommand::Add)?;
    let id = controller
        .state()
        .items
        .first()
        .map(|item| item.id)
        .ok_or("added item missing from list")?;
    controller.dispatch(ListCommand::Toggle(id))?;
    controller.dispatch(ListCommand::SetFilter(ItemFilter::Complete))?;

    Ok(format!(
        "ok items={} complete={}",
        controller.state().items.len(),
        controller.visible_items().len()
    ))
}
