use async_trait::async_trait;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Client, Collection, Database};
use tracing::info;
use uuid::Uuid;

use super::{same_name, GroupDetails, GroupStore, RosterChange};
use crate::error::Result;
use crate::schemas::{Expense, Group, Member};

const GROUPS: &str = "groups";
const EXPENSES: &str = "expenses";

// Ids are stored in their hyphenated string form.
fn by_id(field: &str, id: Uuid) -> Document {
    let mut filter = Document::new();
    filter.insert(field, id.to_string());
    filter
}

/// MongoDB backed store. Groups embed their members; expenses live in their
/// own collection keyed by `groupId`.
#[derive(Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        info!(database, "connected to MongoDB");
        Ok(Self::new(client.database(database)))
    }

    pub fn new(database: Database) -> Self {
        Self { database }
    }

    fn groups(&self) -> Collection<Group> {
        self.database.collection(GROUPS)
    }

    fn expenses(&self) -> Collection<Expense> {
        self.database.collection(EXPENSES)
    }
}

#[async_trait]
impl GroupStore for MongoStore {
    async fn insert_group(&self, group: Group) -> Result<()> {
        self.groups().insert_one(group, None).await?;
        Ok(())
    }

    async fn get_group(&self, id: Uuid) -> Result<Option<Group>> {
        Ok(self.groups().find_one(by_id("id", id), None).await?)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let mut groups: Vec<Group> = self.groups().find(None, None).await?.try_collect().await?;
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn update_group_details(&self, id: Uuid, details: GroupDetails) -> Result<Option<Group>> {
        let mut set = doc! {
            "name": details.name,
            "currency": bson::to_bson(&details.currency)?,
            "updatedAt": bson::to_bson(&details.updated_at)?,
        };
        let mut update = Document::new();
        match details.description {
            Some(description) => {
                set.insert("description", description);
            }
            None => {
                update.insert("$unset", doc! { "description": "" });
            }
        }
        update.insert("$set", set);

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .groups()
            .find_one_and_update(by_id("id", id), update, options)
            .await?)
    }

    async fn delete_group(&self, id: Uuid) -> Result<bool> {
        self.expenses()
            .delete_many(by_id("groupId", id), None)
            .await?;
        let result = self.groups().delete_one(by_id("id", id), None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn add_member(
        &self,
        group_id: Uuid,
        member: Member,
        max_members: usize,
    ) -> Result<RosterChange> {
        // The limit and the name check are part of the filter, so the push
        // only lands on a roster that still has room for this name.
        let mut filter = by_id("id", group_id);
        filter.insert(
            format!("members.{}", max_members.saturating_sub(1)),
            doc! { "$exists": false },
        );
        filter.insert(
            "members.name",
            doc! {
                "$not": {
                    "$regex": format!("^{}$", regex::escape(&member.name)),
                    "$options": "i",
                }
            },
        );
        let update = doc! {
            "$push": { "members": bson::to_bson(&member)? },
            "$set": { "updatedAt": bson::to_bson(&member.joined_at)? },
        };

        let result = self.groups().update_one(filter, update, None).await?;
        if result.matched_count > 0 {
            return Ok(RosterChange::Applied);
        }

        Ok(match self.get_group(group_id).await? {
            None => RosterChange::GroupNotFound,
            Some(group) if group.members.len() >= max_members => RosterChange::GroupFull,
            Some(group) if group.members.iter().any(|m| same_name(&m.name, &member.name)) => {
                RosterChange::DuplicateName
            }
            // The roster changed between the update and the lookup.
            Some(_) => RosterChange::GroupFull,
        })
    }

    async fn remove_member(
        &self,
        group_id: Uuid,
        member_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<RosterChange> {
        let mut filter = by_id("id", group_id);
        filter.insert("members.id", member_id.to_string());
        let update = doc! {
            "$pull": { "members": { "id": member_id.to_string() } },
            "$set": { "updatedAt": bson::to_bson(&at)? },
        };

        let result = self.groups().update_one(filter, update, None).await?;
        if result.matched_count > 0 {
            return Ok(RosterChange::Applied);
        }
        Ok(match self.get_group(group_id).await? {
            None => RosterChange::GroupNotFound,
            Some(_) => RosterChange::MemberNotFound,
        })
    }

    async fn insert_expense(&self, expense: Expense) -> Result<()> {
        self.expenses().insert_one(expense, None).await?;
        Ok(())
    }

    async fn get_expense(&self, id: Uuid) -> Result<Option<Expense>> {
        Ok(self.expenses().find_one(by_id("id", id), None).await?)
    }

    async fn list_expenses(&self, group_id: Uuid) -> Result<Vec<Expense>> {
        let filter = by_id("groupId", group_id);
        let mut expenses: Vec<Expense> =
            self.expenses().find(filter, None).await?.try_collect().await?;
        expenses.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(expenses)
    }

    async fn save_expense(&self, expense: Expense) -> Result<bool> {
        let filter = by_id("id", expense.id);
        let result = self.expenses().replace_one(filter, expense, None).await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_expense(&self, id: Uuid) -> Result<bool> {
        let result = self.expenses().delete_one(by_id("id", id), None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn ping(&self) -> Result<()> {
        self.database.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}
