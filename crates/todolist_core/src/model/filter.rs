//! Display filter and ordering for the item list.
//!
//! # Invariants
//! - Filtering never mutates or reorders the source collection.
//! - Display order is `timestamp DESC`; ties keep source order (stable sort).

use crate::model::item::Item;
use serde::{Deserialize, Serialize};

/// Completion-state predicate selected on the list screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemFilter {
    /// Every item.
    #[default]
    All,
    /// Items with `complete == false`.
    Uncomplete,
    /// Items with `complete == true`.
    Complete,
}

impl ItemFilter {
    /// Parses a filter label case-insensitively.
    ///
    /// Unknown labels fall back to [`ItemFilter::All`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "uncomplete" => Self::Uncomplete,
            "complete" => Self::Complete,
            _ => Self::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Uncomplete => "uncomplete",
            Self::Complete => "complete",
        }
    }

    pub fn matches(self, item: &Item) -> bool {
        match self {
            Self::All => true,
            Self::Uncomplete => !item.complete,
            Self::Complete => item.complete,
        }
    }
}

/// Returns the items shown for `filter`, newest first.
pub fn visible_items(items: &[Item], filter: ItemFilter) -> Vec<&Item> {
    let mut visible = items
        .iter()
        .filter(|item| filter.matches(item))
        .collect::<Vec<_>>();
    visible.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
    visible
}
