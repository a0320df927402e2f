//! Item repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Translate typed item operations into SQL against the `items` table.
//! - Adapt rows back into `Item` values.
//!
//! # Invariants
//! - Write paths call `Item::validate()` / `NewItem::validate()` before SQL.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - Ids come from the storage engine (`AUTOINCREMENT`) and are never reused.
//! - Item content is never written to logs.

use crate::db::migrations::{apply_migrations, latest_version, reset_schema};
use crate::db::{DbError, DbResult};
use crate::model::item::{Item, ItemId, ItemValidationError, NewItem};
use log::{debug, info};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ITEMS_TABLE: &str = "items";
const ITEM_SELECT_SQL: &str = "SELECT
    id,
    content,
    complete,
    timeStamp
FROM items";

pub type RepoResult<T> = Result<T, RepoError>;

/// Error returned by every item repository operation.
#[derive(Debug)]
pub enum RepoError {
    /// Item fields failed validation before any SQL ran.
    Validation(ItemValidationError),
    /// A statement failed inside the storage engine.
    Storage {
        statement: &'static str,
        source: DbError,
    },
    /// Explicit insert hit an existing primary key.
    DuplicateId(ItemId),
    /// Update targeted an id with no row.
    NotFound(ItemId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted row cannot be converted into a valid `Item`.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Storage { statement, source } => {
                write!(f, "storage statement `{statement}` failed: {source}")
            }
            Self::DuplicateId(id) => write!(f, "item id already exists: {id}"),
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "item repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "item repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "item repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage { source, .. } => Some(source),
            Self::DuplicateId(_)
            | Self::NotFound(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<ItemValidationError> for RepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Tags a storage failure with the statement that produced it.
trait StatementContext<T> {
    fn during(self, statement: &'static str) -> RepoResult<T>;
}

impl<T> StatementContext<T> for rusqlite::Result<T> {
    fn during(self, statement: &'static str) -> RepoResult<T> {
        self.map_err(|err| RepoError::Storage {
            statement,
            source: DbError::Sqlite(err),
        })
    }
}

impl<T> StatementContext<T> for DbResult<T> {
    fn during(self, statement: &'static str) -> RepoResult<T> {
        self.map_err(|source| RepoError::Storage { statement, source })
    }
}

/// Repository interface for item persistence.
pub trait ItemRepository {
    /// Creates the item table when absent. Idempotent.
    fn ensure_schema(&self) -> RepoResult<()>;
    /// Drops the item table and all rows. Succeeds when already absent.
    fn drop_schema(&self) -> RepoResult<()>;
    /// Loads every item. Callers must sort for display.
    fn list_all(&self) -> RepoResult<Vec<Item>>;
    /// Predicts the id the next `create` will assign.
    ///
    /// Advisory only: another writer may claim it first. Use `create` when
    /// the id must be allocated and persisted atomically.
    fn next_id(&self) -> RepoResult<ItemId>;
    /// Persists a new item and returns it with its storage-assigned id.
    fn create(&self, item: &NewItem) -> RepoResult<Item>;
    /// Persists an item with a caller-chosen id.
    fn insert(&self, item: &Item) -> RepoResult<()>;
    /// Persists the completion flag of `item`. Other fields are ignored.
    fn update(&self, item: &Item) -> RepoResult<()>;
    /// Removes the item with `id`. Missing rows are not an error.
    fn delete(&self, id: ItemId) -> RepoResult<()>;
    /// Loads one item by id.
    fn get(&self, id: ItemId) -> RepoResult<Option<Item>>;
}

/// SQLite-backed item repository.
pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemRepository<'conn> {
    /// Wraps any connection, including one without the item table.
    ///
    /// Use this before `ensure_schema`; data operations fail with
    /// `RepoError::Storage` until the table exists.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Wraps a connection that is already migrated to the latest schema.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_item_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn ensure_schema(&self) -> RepoResult<()> {
        apply_migrations(self.conn).during("create_table")?;
        debug!("event=item_schema_ensure module=repo status=ok");
        Ok(())
    }

    fn drop_schema(&self) -> RepoResult<()> {
        reset_schema(self.conn).during("drop_table")?;
        info!("event=item_schema_drop module=repo status=ok");
        Ok(())
    }

    fn list_all(&self) -> RepoResult<Vec<Item>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ITEM_SELECT_SQL} ORDER BY id ASC;"))
            .during("select_items")?;
        let mut rows = stmt.query([]).during("select_items")?;
        let mut items = Vec::new();

        while let Some(row) = rows.next().during("select_items")? {
            items.push(parse_item_row(row)?);
        }

        debug!(
            "event=item_list module=repo status=ok count={}",
            items.len()
        );
        Ok(items)
    }

    fn next_id(&self) -> RepoResult<ItemId> {
        let max_id: ItemId = self
            .conn
            .query_row("SELECT COALESCE(MAX(id), 0) FROM items;", [], |row| {
                row.get(0)
            })
            .during("select_next_id")?;

        // `sqlite_sequence` only exists once an AUTOINCREMENT table was created.
        let sequence: ItemId = if table_exists(self.conn, "sqlite_sequence")? {
            self.conn
                .query_row(
                    "SELECT COALESCE(MAX(seq), 0) FROM sqlite_sequence WHERE name = ?1;",
                    [ITEMS_TABLE],
                    |row| row.get(0),
                )
                .during("select_next_id")?
        } else {
            0
        };

        Ok(max_id.max(sequence) + 1)
    }

    fn create(&self, item: &NewItem) -> RepoResult<Item> {
        item.validate()?;

        self.conn
            .execute(
                "INSERT INTO items (content, complete, timeStamp) VALUES (?1, ?2, ?3);",
                params![
                    item.content.as_str(),
                    bool_to_int(item.complete),
                    item.timestamp
                ],
            )
            .during("insert_item")?;
        let id = self.conn.last_insert_rowid();

        debug!("event=item_create module=repo status=ok id={id}");
        Ok(item.clone().into_item(id))
    }

    fn insert(&self, item: &Item) -> RepoResult<()> {
        item.validate()?;

        let result = self.conn.execute(
            "INSERT INTO items (id, content, complete, timeStamp) VALUES (?1, ?2, ?3, ?4);",
            params![
                item.id,
                item.content.as_str(),
                bool_to_int(item.complete),
                item.timestamp
            ],
        );
        match result {
            Ok(_) => {
                debug!("event=item_insert module=repo status=ok id={}", item.id);
                Ok(())
            }
            Err(err) if is_primary_key_conflict(&err) => Err(RepoError::DuplicateId(item.id)),
            Err(err) => Err::<(), _>(err).during("insert_item"),
        }
    }

    fn update(&self, item: &Item) -> RepoResult<()> {
        item.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE items SET complete = ?1 WHERE id = ?2;",
                params![bool_to_int(item.complete), item.id],
            )
            .during("update_item_complete")?;

        if changed == 0 {
            return Err(RepoError::NotFound(item.id));
        }

        debug!(
            "event=item_update module=repo status=ok id={} complete={}",
            item.id, item.complete
        );
        Ok(())
    }

    fn delete(&self, id: ItemId) -> RepoResult<()> {
        let removed = self
            .conn
            .execute("DELETE FROM items WHERE id = ?1;", [id])
            .during("delete_item")?;

        debug!("event=item_delete module=repo status=ok id={id} removed={removed}");
        Ok(())
    }

    fn get(&self, id: ItemId) -> RepoResult<Option<Item>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ITEM_SELECT_SQL} WHERE id = ?1;"))
            .during("select_item")?;
        let row = stmt
            .query_row([id], |row| {
                Ok((
                    row.get::<_, ItemId>("id")?,
                    row.get::<_, String>("content")?,
                    row.get::<_, i64>("complete")?,
                    row.get::<_, i64>("timeStamp")?,
                ))
            })
            .optional()
            .during("select_item")?;

        row.map(|(id, content, complete, timestamp)| {
            build_item(id, content, complete, timestamp)
        })
        .transpose()
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    build_item(
        row.get("id").during("select_items")?,
        row.get("content").during("select_items")?,
        row.get("complete").during("select_items")?,
        row.get("timeStamp").during("select_items")?,
    )
}

fn build_item(id: ItemId, content: String, complete: i64, timestamp: i64) -> RepoResult<Item> {
    let complete = match complete {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid complete value `{other}` in items.complete for id {id}"
            )));
        }
    };

    let item = Item {
        id,
        content,
        complete,
        timestamp,
    };
    item.validate()
        .map_err(|err| RepoError::InvalidData(format!("item {id}: {err}")))?;
    Ok(item)
}

fn is_primary_key_conflict(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        }
        _ => false,
    }
}

fn ensure_item_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .during("schema_check")?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, ITEMS_TABLE)? {
        return Err(RepoError::MissingRequiredTable(ITEMS_TABLE));
    }

    for column in ["id", "content", "complete", "timeStamp"] {
        if !table_has_column(conn, ITEMS_TABLE, column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: ITEMS_TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )
        .during("schema_check")?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table});"))
        .during("schema_check")?;
    let mut rows = stmt.query([]).during("schema_check")?;
    while let Some(row) = rows.next().during("schema_check")? {
        let current: String = row.get(1).during("schema_check")?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
