//! Persistence behind the ledger. Lookups of missing records return `None`
//! or `false`; turning those into not-found errors is the caller's job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::currency::Currency;
use crate::error::Result;
use crate::schemas::{Expense, Group, Member};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Editable fields of a group. Members are changed through the roster
/// operations only.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupDetails {
    pub name: String,
    pub description: Option<String>,
    pub currency: Currency,
    pub updated_at: DateTime<Utc>,
}

/// Result of a roster edit. Checks and write happen as one step in the
/// store, so concurrent edits cannot overwrite each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RosterChange {
    Applied,
    GroupNotFound,
    MemberNotFound,
    /// A member with the same name, compared case-insensitively, exists.
    DuplicateName,
    GroupFull,
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn insert_group(&self, group: Group) -> Result<()>;
    async fn get_group(&self, id: Uuid) -> Result<Option<Group>>;
    /// Newest first.
    async fn list_groups(&self) -> Result<Vec<Group>>;
    /// Updates name, description and currency, leaving the roster alone.
    /// Returns the updated group, or `None` if it does not exist.
    async fn update_group_details(&self, id: Uuid, details: GroupDetails) -> Result<Option<Group>>;
    /// Removes the group together with its expenses.
    async fn delete_group(&self, id: Uuid) -> Result<bool>;

    /// Appends `member` unless the roster already holds `max_members`
    /// members or a member of the same name.
    async fn add_member(
        &self,
        group_id: Uuid,
        member: Member,
        max_members: usize,
    ) -> Result<RosterChange>;
    async fn remove_member(
        &self,
        group_id: Uuid,
        member_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<RosterChange>;

    async fn insert_expense(&self, expense: Expense) -> Result<()>;
    async fn get_expense(&self, id: Uuid) -> Result<Option<Expense>>;
    /// Expenses of a group, oldest first.
    async fn list_expenses(&self, group_id: Uuid) -> Result<Vec<Expense>>;
    async fn save_expense(&self, expense: Expense) -> Result<bool>;
    async fn delete_expense(&self, id: Uuid) -> Result<bool>;

    async fn ping(&self) -> Result<()>;
}

pub(crate) fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
