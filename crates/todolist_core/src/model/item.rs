//! Item domain model.
//!
//! # Responsibility
//! - Define the single to-do entry shape shared by storage, controller and FFI.
//! - Validate item fields before they reach persistence.
//!
//! # Invariants
//! - `id` is positive and never reused for another item.
//! - `content` is never blank.
//! - `timestamp` is epoch milliseconds and never changes after insert.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-assigned identifier of one item.
pub type ItemId = i64;

/// Validation errors for item fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    /// Ids are assigned from 1 upwards by the storage engine.
    NonPositiveId(ItemId),
    /// Content is empty or whitespace only.
    BlankContent,
    /// Creation time before the unix epoch.
    NegativeTimestamp(i64),
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveId(id) => write!(f, "item id must be positive, got {id}"),
            Self::BlankContent => write!(f, "item content must not be blank"),
            Self::NegativeTimestamp(value) => {
                write!(f, "item timeStamp must be >= 0, got {value}")
            }
        }
    }
}

impl Error for ItemValidationError {}

/// One persisted to-do entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ItemWire")]
pub struct Item {
    pub id: ItemId,
    pub content: String,
    pub complete: bool,
    /// Creation time in epoch milliseconds. Serialized as `timeStamp` to
    /// match the storage column name.
    #[serde(rename = "timeStamp")]
    pub timestamp: i64,
}

#[derive(Deserialize)]
struct ItemWire {
    id: ItemId,
    content: String,
    #[serde(default)]
    complete: bool,
    #[serde(rename = "timeStamp")]
    timestamp: i64,
}

impl TryFrom<ItemWire> for Item {
    type Error = ItemValidationError;

    fn try_from(value: ItemWire) -> Result<Self, Self::Error> {
        let item = Self {
            id: value.id,
            content: value.content,
            complete: value.complete,
            timestamp: value.timestamp,
        };
        item.validate()?;
        Ok(item)
    }
}

impl Item {
    /// Creates an open (not completed) item with a known id.
    ///
    /// # Errors
    /// - Any field violating [`Item::validate`].
    pub fn new(
        id: ItemId,
        content: impl Into<String>,
        timestamp: i64,
    ) -> Result<Self, ItemValidationError> {
        let item = Self {
            id,
            content: content.into(),
            complete: false,
            timestamp,
        };
        item.validate()?;
        Ok(item)
    }

    /// Checks field-level invariants.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.id <= 0 {
            return Err(ItemValidationError::NonPositiveId(self.id));
        }
        validate_content(&self.content)?;
        validate_timestamp(self.timestamp)
    }

    /// Returns a copy carrying a different completion flag.
    pub fn with_complete(&self, complete: bool) -> Self {
        Self {
            complete,
            ..self.clone()
        }
    }
}

/// Item payload before the storage engine assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub content: String,
    pub complete: bool,
    pub timestamp: i64,
}

impl NewItem {
    /// Creates an open item payload.
    pub fn new(content: impl Into<String>, timestamp: i64) -> Result<Self, ItemValidationError> {
        let draft = Self {
            content: content.into(),
            complete: false,
            timestamp,
        };
        draft.validate()?;
        Ok(draft)
    }

    pub fn validate(&self) -> Result<(), ItemValidationError> {
        validate_content(&self.content)?;
        validate_timestamp(self.timestamp)
    }

    /// Attaches a storage-assigned id.
    pub fn into_item(self, id: ItemId) -> Item {
        Item {
            id,
            content: self.content,
            complete: self.complete,
            timestamp: self.timestamp,
        }
    }
}

fn validate_content(content: &str) -> Result<(), ItemValidationError> {
    if content.trim().is_empty() {
        return Err(ItemValidationError::BlankContent);
    }
    Ok(())
}

fn validate_timestamp(timestamp: i64) -> Result<(), ItemValidationError> {
    if timestamp < 0 {
        return Err(ItemValidationError::NegativeTimestamp(timestamp));
    }
    Ok(())
}
