//! Group capacity limits and the packing rank used when choosing a group.
//!
//! The allocator reads candidate groups under a write-intent lock and hands
//! them to [`Capacity::choose`]. The rank prefers the group with the most
//! active members, so synchronized groups fill up and start together instead
//! of spreading participants thin across many half-empty groups.

use std::cmp::Ordering;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::GroupResult;
use crate::enums::GroupState;
use crate::errors::CoreError;

/// Member limits of the groups in one batch. `None` = unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Capacity {
    pub max_active: Option<u32>,
    pub max_total: Option<u32>,
}

impl Capacity {
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_active: None,
            max_total: None,
        }
    }

    /// Reject limits no group could ever satisfy.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if a limit is zero or the active limit
    /// exceeds the total limit.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_active == Some(0) || self.max_total == Some(0) {
            return Err(CoreError::Validation(
                "group member limits must be at least 1".into(),
            ));
        }
        if let (Some(active), Some(total)) = (self.max_active, self.max_total) {
            if active > total {
                return Err(CoreError::Validation(format!(
                    "max_active_members ({active}) exceeds max_total_members ({total})"
                )));
            }
        }
        Ok(())
    }

    /// Whether one more member may join `group` without breaking a limit.
    #[must_use]
    pub fn admits(&self, group: &GroupResult) -> bool {
        group.state == GroupState::Started
            && self
                .max_active
                .is_none_or(|max| group.active_member_count < max)
            && self
                .max_total
                .is_none_or(|max| group.total_member_count() < max)
    }

    /// Pick the group the next member should join, if any admits one.
    #[must_use]
    pub fn choose<'a>(&self, candidates: &'a [GroupResult]) -> Option<&'a GroupResult> {
        candidates
            .iter()
            .filter(|group| self.admits(group))
            .min_by(|a, b| packing_order(a, b))
    }
}

/// Total order over groups, best candidate first.
///
/// Most active members first, then most history members, then the oldest
/// group, then the smallest id.
#[must_use]
pub fn packing_order(a: &GroupResult, b: &GroupResult) -> Ordering {
    b.active_member_count
        .cmp(&a.active_member_count)
        .then_with(|| b.history_member_count.cmp(&a.history_member_count))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}
