//! To-do list screen controller.
//!
//! # Responsibility
//! - Own in-memory screen state: items, active filter, draft input, notice.
//! - Apply user intents expressed as [`ListCommand`] values.
//! - Keep in-memory items mirrored from the repository.
//!
//! # Invariants
//! - Items are replaced by a successful `list_all` read after a write.
//! - A command whose write fails leaves `items`, `filter` and `draft`
//!   unchanged and records a notice.
//! - A committed write whose re-read fails is applied to `items` locally
//!   (and clears the draft for `Add`) before the error is reported, so a
//!   retry never repeats the write.
//! - Schema setup failure during `load` is fatal: no controller is returned.

use crate::model::filter::{visible_items, ItemFilter};
use crate::model::item::{Item, ItemId, NewItem};
use crate::repo::item_repo::{ItemRepository, RepoError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of creation timestamps in epoch milliseconds.
pub type Clock = Box<dyn Fn() -> i64>;

/// One user intent emitted by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListCommand {
    /// Replaces the draft input text.
    SetDraft(String),
    /// Submits the draft as a new item.
    Add,
    /// Sets the completion flag of one item.
    SetComplete { id: ItemId, complete: bool },
    /// Flips the completion flag of one item.
    Toggle(ItemId),
    /// Removes one item.
    Delete(ItemId),
    /// Changes the display filter.
    SetFilter(ItemFilter),
    /// Re-reads all items from storage.
    Reload,
}

impl ListCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::SetDraft(_) => "set_draft",
            Self::Add => "add",
            Self::SetComplete { .. } => "set_complete",
            Self::Toggle(_) => "toggle",
            Self::Delete(_) => "delete",
            Self::SetFilter(_) => "set_filter",
            Self::Reload => "reload",
        }
    }
}

/// Screen state rendered by the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListState {
    /// Last items read from storage, in repository order.
    pub items: Vec<Item>,
    pub filter: ItemFilter,
    /// Text currently typed into the input box.
    pub draft: String,
    /// Message of the last failed command, cleared by the next success.
    pub notice: Option<String>,
}

/// Errors from list controller commands.
#[derive(Debug)]
pub enum ListError {
    /// `Add` was submitted with a blank draft.
    EmptyDraft,
    /// Command referenced an id missing from the in-memory list.
    UnknownItem(ItemId),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for ListError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDraft => write!(f, "cannot add an empty item"),
            Self::UnknownItem(id) => write!(f, "item not in list: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ListError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ListError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Controller over one item repository.
pub struct ListController<R: ItemRepository> {
    repo: R,
    state: ListState,
    clock: Clock,
}

impl<R: ItemRepository> ListController<R> {
    /// Prepares storage and loads all items using the system clock.
    ///
    /// # Errors
    /// - Schema setup or the initial read failed; the screen has no usable
    ///   state in that case.
    pub fn load(repo: R) -> Result<Self, ListError> {
        Self::with_clock(repo, system_clock_ms)
    }

    /// Same as [`ListController::load`] with an explicit timestamp source.
    pub fn with_clock(repo: R, clock: impl Fn() -> i64 + 'static) -> Result<Self, ListError> {
        if let Err(err) = repo.ensure_schema() {
            error!("event=list_load module=list status=error error_code=schema_failed error={err}");
            return Err(err.into());
        }

        let items = repo.list_all()?;
        info!("event=list_load module=list status=ok count={}", items.len());

        Ok(Self {
            repo,
            state: ListState {
                items,
                ..ListState::default()
            },
            clock: Box::new(clock),
        })
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    /// Items for the active filter, newest first.
    pub fn visible_items(&self) -> Vec<&Item> {
        visible_items(&self.state.items, self.state.filter)
    }

    /// Applies one command.
    ///
    /// On error the notice is set and returned. Other state is untouched
    /// unless the write itself committed.
    pub fn dispatch(&mut self, command: ListCommand) -> Result<(), ListError> {
        let name = command.name();
        match self.apply(command) {
            Ok(()) => {
                self.state.notice = None;
                info!("event=list_command module=list status=ok command={name}");
                Ok(())
            }
            Err(err) => {
                warn!("event=list_command module=list status=error command={name} error={err}");
                self.state.notice = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn apply(&mut self, command: ListCommand) -> Result<(), ListError> {
        match command {
            ListCommand::SetDraft(text) => {
                self.state.draft = text;
                Ok(())
            }
            ListCommand::SetFilter(filter) => {
                self.state.filter = filter;
                Ok(())
            }
            ListCommand::Add => self.add_draft(),
            ListCommand::SetComplete { id, complete } => self.set_complete(id, complete),
            ListCommand::Toggle(id) => {
                let complete = self.find(id)?.complete;
                self.set_complete(id, !complete)
            }
            ListCommand::Delete(id) => {
                self.repo.delete(id)?;
                self.refresh_after_write(|items| items.retain(|item| item.id != id))
            }
            ListCommand::Reload => self.refresh(),
        }
    }

    fn add_draft(&mut self) -> Result<(), ListError> {
        if self.state.draft.trim().is_empty() {
            return Err(ListError::EmptyDraft);
        }

        let draft = NewItem::new(self.state.draft.clone(), (self.clock)())
            .map_err(RepoError::from)?;
        let created = self.repo.create(&draft)?;
        self.state.draft.clear();
        self.refresh_after_write(|items| items.push(created))
    }

    fn set_complete(&mut self, id: ItemId, complete: bool) -> Result<(), ListError> {
        let updated = self.find(id)?.with_complete(complete);
        self.repo.update(&updated)?;
        self.refresh_after_write(|items| {
            if let Some(item) = items.iter_mut().find(|item| item.id == id) {
                item.complete = complete;
            }
        })
    }

    /// Re-reads items after a committed write, falling back to `apply_locally`
    /// when the read fails.
    fn refresh_after_write(
        &mut self,
        apply_locally: impl FnOnce(&mut Vec<Item>),
    ) -> Result<(), ListError> {
        if let Err(err) = self.refresh() {
            apply_locally(&mut self.state.items);
            return Err(err);
        }
        Ok(())
    }

    fn find(&self, id: ItemId) -> Result<&Item, ListError> {
        self.state
            .items
            .iter()
            .find(|item| item.id == id)
            .ok_or(ListError::UnknownItem(id))
    }

    fn refresh(&mut self) -> Result<(), ListError> {
        self.state.items = self.repo.list_all()?;
        Ok(())
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn system_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
