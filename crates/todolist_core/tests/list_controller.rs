use rusqlite::Connection;
use std::cell::Cell;
use std::rc::Rc;
use todolist_core::db::{open_db_in_memory, DbError};
use todolist_core::{
    Item, ItemFilter, ItemId, ItemRepository, ListCommand, ListController, ListError, NewItem,
    RepoError, RepoResult, SqliteItemRepository,
};

/// Failure switches shared between a test and its repository.
#[derive(Default)]
struct Faults {
    writes: Cell<bool>,
    reads: Cell<bool>,
}

/// Repository wrapper whose reads and writes can be switched to fail.
struct FlakyRepository<'conn> {
    inner: SqliteItemRepository<'conn>,
    faults: Rc<Faults>,
    fail_schema: bool,
}

impl<'conn> FlakyRepository<'conn> {
    fn new(conn: &'conn Connection, faults: Rc<Faults>) -> Self {
        Self {
            inner: SqliteItemRepository::new(conn),
            faults,
            fail_schema: false,
        }
    }

    fn check_write(&self, statement: &'static str) -> RepoResult<()> {
        if self.faults.writes.get() {
            return Err(storage_failure(statement));
        }
        Ok(())
    }
}

fn storage_failure(statement: &'static str) -> RepoError {
    RepoError::Storage {
        statement,
        source: DbError::Sqlite(rusqlite::Error::InvalidQuery),
    }
}

impl ItemRepository for FlakyRepository<'_> {
    fn ensure_schema(&self) -> RepoResult<()> {
        if self.fail_schema {
            return Err(storage_failure("create_table"));
        }
        self.inner.ensure_schema()
    }

    fn drop_schema(&self) -> RepoResult<()> {
        self.check_write("drop_table")?;
        self.inner.drop_schema()
    }

    fn list_all(&self) -> RepoResult<Vec<Item>> {
        if self.faults.reads.get() {
            return Err(storage_failure("select_items"));
        }
        self.inner.list_all()
    }

    fn next_id(&self) -> RepoResult<ItemId> {
        self.inner.next_id()
    }

    fn create(&self, item: &NewItem) -> RepoResult<Item> {
        self.check_write("insert_item")?;
        self.inner.create(item)
    }

    fn insert(&self, item: &Item) -> RepoResult<()> {
        self.check_write("insert_item")?;
        self.inner.insert(item)
    }

    fn update(&self, item: &Item) -> RepoResult<()> {
        self.check_write("update_item_complete")?;
        self.inner.update(item)
    }

    fn delete(&self, id: ItemId) -> RepoResult<()> {
        self.check_write("delete_item")?;
        self.inner.delete(id)
    }

    fn get(&self, id: ItemId) -> RepoResult<Option<Item>> {
        self.inner.get(id)
    }
}

fn ticking_clock(start: i64) -> impl Fn() -> i64 {
    let next = Cell::new(start);
    move || {
        let now = next.get();
        next.set(now + 1_000);
        now
    }
}

fn add(controller: &mut ListController<impl ItemRepository>, content: &str) -> ItemId {
    controller
        .dispatch(ListCommand::SetDraft(content.to_string()))
        .unwrap();
    controller.dispatch(ListCommand::Add).unwrap();
    controller
        .state()
        .items
        .iter()
        .find(|item| item.content == content)
        .map(|item| item.id)
        .expect("added item should be in state")
}

fn visible_contents(controller: &ListController<impl ItemRepository>) -> Vec<String> {
    controller
        .visible_items()
        .into_iter()
        .map(|item| item.content.clone())
        .collect()
}

#[test]
fn load_creates_schema_on_empty_database() {
    let conn = Connection::open_in_memory().unwrap();
    let controller = ListController::load(SqliteItemRepository::new(&conn)).unwrap();

    assert!(controller.state().items.is_empty());
    assert_eq!(controller.state().filter, ItemFilter::All);
    assert!(SqliteItemRepository::try_new(&conn).is_ok());
}

#[test]
fn load_fails_when_schema_cannot_be_created() {
    let conn = Connection::open_in_memory().unwrap();
    let mut repo = FlakyRepository::new(&conn, Rc::default());
    repo.fail_schema = true;

    let err = ListController::load(repo).err().expect("load should fail");
    assert!(matches!(
        err,
        ListError::Repo(RepoError::Storage {
            statement: "create_table",
            ..
        })
    ));
}

#[test]
fn todo_walkthrough_add_toggle_filter_delete() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let mut controller = ListController::with_clock(repo, ticking_clock(1_000)).unwrap();

    let milk = add(&mut controller, "buy milk");
    let mom = add(&mut controller, "call mom");
    assert_ne!(milk, mom);
    assert!(controller.state().draft.is_empty());
    assert_eq!(visible_contents(&controller), vec!["call mom", "buy milk"]);

    controller
        .dispatch(ListCommand::SetFilter(ItemFilter::Uncomplete))
        .unwrap();
    assert_eq!(visible_contents(&controller).len(), 2);

    controller.dispatch(ListCommand::Toggle(milk)).unwrap();
    controller
        .dispatch(ListCommand::SetFilter(ItemFilter::Complete))
        .unwrap();
    assert_eq!(visible_contents(&controller), vec!["buy milk"]);

    controller.dispatch(ListCommand::Delete(mom)).unwrap();
    controller
        .dispatch(ListCommand::SetFilter(ItemFilter::All))
        .unwrap();
    assert_eq!(visible_contents(&controller), vec!["buy milk"]);

    let stored = SqliteItemRepository::try_new(&conn)
        .unwrap()
        .list_all()
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, milk);
    assert!(stored[0].complete);
}

#[test]
fn add_keeps_submitted_text_and_stamps_clock_time() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let mut controller = ListController::with_clock(repo, || 42_000).unwrap();

    controller
        .dispatch(ListCommand::SetDraft("  read book \n".to_string()))
        .unwrap();
    controller.dispatch(ListCommand::Add).unwrap();

    let item = &controller.state().items[0];
    assert_eq!(item.content, "  read book \n");
    assert_eq!(item.timestamp, 42_000);
    assert!(!item.complete);
}

#[test]
fn add_rejects_blank_draft_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let mut controller = ListController::load(repo).unwrap();

    controller
        .dispatch(ListCommand::SetDraft("   ".to_string()))
        .unwrap();
    let err = controller.dispatch(ListCommand::Add).unwrap_err();

    assert!(matches!(err, ListError::EmptyDraft));
    assert!(controller.state().notice.is_some());
    assert_eq!(controller.state().draft, "   ");
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM items;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn set_complete_is_persisted_and_keeps_other_fields() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let mut controller = ListController::with_clock(repo, || 7_000).unwrap();
    let id = add(&mut controller, "file taxes");

    controller
        .dispatch(ListCommand::SetComplete { id, complete: true })
        .unwrap();
    controller
        .dispatch(ListCommand::SetComplete { id, complete: true })
        .unwrap();

    let stored = SqliteItemRepository::try_new(&conn)
        .unwrap()
        .get(id)
        .unwrap()
        .unwrap();
    assert!(stored.complete);
    assert_eq!(stored.content, "file taxes");
    assert_eq!(stored.timestamp, 7_000);
}

#[test]
fn commands_on_unknown_items_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let mut controller = ListController::load(repo).unwrap();

    let err = controller.dispatch(ListCommand::Toggle(404)).unwrap_err();
    assert!(matches!(err, ListError::UnknownItem(404)));

    controller.dispatch(ListCommand::Delete(404)).unwrap();
    assert!(controller.state().notice.is_none());
}

#[test]
fn failed_writes_leave_state_unchanged_and_set_notice() {
    let conn = Connection::open_in_memory().unwrap();
    let faults = Rc::new(Faults::default());
    let repo = FlakyRepository::new(&conn, Rc::clone(&faults));
    let mut controller = ListController::with_clock(repo, ticking_clock(1)).unwrap();
    let id = add(&mut controller, "stable");
    let before = controller.state().items.clone();

    faults.writes.set(true);
    let toggle_err = controller.dispatch(ListCommand::Toggle(id)).unwrap_err();
    assert!(matches!(
        toggle_err,
        ListError::Repo(RepoError::Storage {
            statement: "update_item_complete",
            ..
        })
    ));
    assert_eq!(controller.state().items, before);
    assert!(controller
        .state()
        .notice
        .as_deref()
        .unwrap()
        .contains("update_item_complete"));

    controller
        .dispatch(ListCommand::SetDraft("lost?".to_string()))
        .unwrap();
    assert!(controller.dispatch(ListCommand::Add).is_err());
    assert_eq!(controller.state().draft, "lost?");
    assert!(controller.dispatch(ListCommand::Delete(id)).is_err());
    assert_eq!(controller.state().items, before);

    faults.writes.set(false);
    controller.dispatch(ListCommand::Toggle(id)).unwrap();
    assert!(controller.state().notice.is_none());
    assert!(controller.state().items[0].complete);
}

#[test]
fn reload_picks_up_rows_written_elsewhere() {
    let conn = open_db_in_memory().unwrap();
    let mut controller =
        ListController::load(SqliteItemRepository::try_new(&conn).unwrap()).unwrap();
    assert!(controller.state().items.is_empty());

    SqliteItemRepository::try_new(&conn)
        .unwrap()
        .create(&NewItem::new("from elsewhere", 1).unwrap())
        .unwrap();
    controller.dispatch(ListCommand::Reload).unwrap();

    assert_eq!(visible_contents(&controller), vec!["from elsewhere"]);
}

#[test]
fn committed_add_is_kept_when_reload_fails() {
    let conn = Connection::open_in_memory().unwrap();
    let faults = Rc::new(Faults::default());
    let repo = FlakyRepository::new(&conn, Rc::clone(&faults));
    let mut controller = ListController::with_clock(repo, || 5_000).unwrap();

    controller
        .dispatch(ListCommand::SetDraft("buy milk".to_string()))
        .unwrap();
    faults.reads.set(true);
    let err = controller.dispatch(ListCommand::Add).unwrap_err();
    assert!(matches!(
        err,
        ListError::Repo(RepoError::Storage {
            statement: "select_items",
            ..
        })
    ));

    assert!(controller.state().draft.is_empty());
    assert_eq!(controller.state().items.len(), 1);
    assert_eq!(controller.state().items[0].content, "buy milk");
    assert!(controller.state().notice.is_some());

    // Resubmitting the now-empty draft must not write a second row.
    assert!(matches!(
        controller.dispatch(ListCommand::Add).unwrap_err(),
        ListError::EmptyDraft
    ));
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM items;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn committed_toggle_and_delete_are_applied_when_reload_fails() {
    let conn = Connection::open_in_memory().unwrap();
    let faults = Rc::new(Faults::default());
    let repo = FlakyRepository::new(&conn, Rc::clone(&faults));
    let mut controller = ListController::with_clock(repo, ticking_clock(1)).unwrap();
    let keep = add(&mut controller, "keep");
    let gone = add(&mut controller, "gone");

    faults.reads.set(true);
    assert!(controller.dispatch(ListCommand::Toggle(keep)).is_err());
    assert!(controller.dispatch(ListCommand::Delete(gone)).is_err());

    let items = &controller.state().items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, keep);
    assert!(items[0].complete);

    faults.reads.set(false);
    controller.dispatch(ListCommand::Reload).unwrap();
    assert_eq!(controller.state().items.len(), 1);
    assert!(controller.state().items[0].complete);
}
