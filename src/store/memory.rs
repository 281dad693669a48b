use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{same_name, GroupDetails, GroupStore, RosterChange};
use crate::error::Result;
use crate::schemas::{Expense, Group, Member};

#[derive(Default)]
struct Tables {
    groups: HashMap<Uuid, Group>,
    // Keyed by group id, insertion ordered.
    expenses: HashMap<Uuid, Vec<Expense>>,
}

/// Process-local store, used in development and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn insert_group(&self, group: Group) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.expenses.entry(group.id).or_default();
        tables.groups.insert(group.id, group);
        Ok(())
    }

    async fn get_group(&self, id: Uuid) -> Result<Option<Group>> {
        Ok(self.tables.read().await.groups.get(&id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let mut groups: Vec<Group> = self.tables.read().await.groups.values().cloned().collect();
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn update_group_details(&self, id: Uuid, details: GroupDetails) -> Result<Option<Group>> {
        let mut tables = self.tables.write().await;
        Ok(tables.groups.get_mut(&id).map(|group| {
            group.name = details.name;
            group.description = details.description;
            group.currency = details.currency;
            group.updated_at = Some(details.updated_at);
            group.clone()
        }))
    }

    async fn delete_group(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        tables.expenses.remove(&id);
        Ok(tables.groups.remove(&id).is_some())
    }

    async fn add_member(
        &self,
        group_id: Uuid,
        member: Member,
        max_members: usize,
    ) -> Result<RosterChange> {
        let mut tables = self.tables.write().await;
        let Some(group) = tables.groups.get_mut(&group_id) else {
            return Ok(RosterChange::GroupNotFound);
        };
        if group.members.len() >= max_members {
            return Ok(RosterChange::GroupFull);
        }
        if group.members.iter().any(|m| same_name(&m.name, &member.name)) {
            return Ok(RosterChange::DuplicateName);
        }
        group.updated_at = Some(member.joined_at);
        group.members.push(member);
        Ok(RosterChange::Applied)
    }

    async fn remove_member(
        &self,
        group_id: Uuid,
        member_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<RosterChange> {
        let mut tables = self.tables.write().await;
        let Some(group) = tables.groups.get_mut(&group_id) else {
            return Ok(RosterChange::GroupNotFound);
        };
        let before = group.members.len();
        group.members.retain(|m| m.id != member_id);
        if group.members.len() == before {
            return Ok(RosterChange::MemberNotFound);
        }
        group.updated_at = Some(at);
        Ok(RosterChange::Applied)
    }

    async fn insert_expense(&self, expense: Expense) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.expenses.entry(expense.group_id).or_default().push(expense);
        Ok(())
    }

    async fn get_expense(&self, id: Uuid) -> Result<Option<Expense>> {
        let tables = self.tables.read().await;
        Ok(tables
            .expenses
            .values()
            .flatten()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn list_expenses(&self, group_id: Uuid) -> Result<Vec<Expense>> {
        let tables = self.tables.read().await;
        Ok(tables.expenses.get(&group_id).cloned().unwrap_or_default())
    }

    async fn save_expense(&self, expense: Expense) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .expenses
            .get_mut(&expense.group_id)
            .and_then(|list| list.iter_mut().find(|e| e.id == expense.id));
        match slot {
            Some(existing) => {
                *existing = expense;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_expense(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        for list in tables.expenses.values_mut() {
            let before = list.len();
            list.retain(|e| e.id != id);
            if list.len() < before {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::currency::Currency;
    use crate::testing::{expense_for, group_of};

    #[tokio::test]
    async fn test_group_round_trip() {
        let store = MemoryStore::new();
        let group = group_of(&["A", "B"], Currency::Jpy);

        store.insert_group(group.clone()).await.unwrap();
        assert_eq!(store.get_group(group.id).await.unwrap(), Some(group.clone()));
        assert_eq!(store.list_groups().await.unwrap().len(), 1);

        let details = GroupDetails {
            name: "Renamed".into(),
            description: None,
            currency: Currency::Eur,
            updated_at: Utc::now(),
        };
        let updated = store
            .update_group_details(group.id, details)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.currency, Currency::Eur);
        assert_eq!(updated.members, group.members);
        assert_eq!(store.get_group(group.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_update_missing_group_reports_none() {
        let store = MemoryStore::new();
        let details = GroupDetails {
            name: "Nobody".into(),
            description: None,
            currency: Currency::Jpy,
            updated_at: Utc::now(),
        };
        assert!(store
            .update_group_details(Uuid::new_v4(), details)
            .await
            .unwrap()
            .is_none());
    }

    fn member(name: &str) -> Member {
        Member {
            id: Uuid::new_v4(),
            name: name.into(),
            email: None,
            joined_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_roster_edits() {
        let store = MemoryStore::new();
        let group = group_of(&["A"], Currency::Jpy);
        store.insert_group(group.clone()).await.unwrap();

        let b = member("B");
        assert_eq!(
            store.add_member(group.id, b.clone(), 50).await.unwrap(),
            RosterChange::Applied
        );
        assert_eq!(
            store.add_member(group.id, member("b"), 50).await.unwrap(),
            RosterChange::DuplicateName
        );
        assert_eq!(
            store.add_member(group.id, member("C"), 2).await.unwrap(),
            RosterChange::GroupFull
        );
        assert_eq!(
            store.add_member(Uuid::new_v4(), member("C"), 50).await.unwrap(),
            RosterChange::GroupNotFound
        );

        assert_eq!(
            store.remove_member(group.id, b.id, Utc::now()).await.unwrap(),
            RosterChange::Applied
        );
        assert_eq!(
            store.remove_member(group.id, b.id, Utc::now()).await.unwrap(),
            RosterChange::MemberNotFound
        );
        assert_eq!(store.get_group(group.id).await.unwrap().unwrap().members.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_keep_every_member_and_the_limit() {
        let store = Arc::new(MemoryStore::new());
        let group = group_of(&[], Currency::Jpy);
        store.insert_group(group.clone()).await.unwrap();
        let group_id = group.id;

        let tasks: Vec<_> = (0..60)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .add_member(group_id, member(&format!("m{i}")), 50)
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut applied = 0;
        let mut full = 0;
        for task in tasks {
            match task.await.unwrap() {
                RosterChange::Applied => applied += 1,
                RosterChange::GroupFull => full += 1,
                other => panic!("unexpected {other:?}"),
            }
        }

        assert_eq!((applied, full), (50, 10));
        assert_eq!(store.get_group(group.id).await.unwrap().unwrap().members.len(), 50);
    }

    #[tokio::test]
    async fn test_delete_group_drops_expenses() {
        let store = MemoryStore::new();
        let group = group_of(&["A", "B"], Currency::Jpy);
        let expense = expense_for(&group, 0, 1000.0);
        store.insert_group(group.clone()).await.unwrap();
        store.insert_expense(expense.clone()).await.unwrap();

        assert!(store.delete_group(group.id).await.unwrap());
        assert!(store.get_expense(expense.id).await.unwrap().is_none());
        assert!(!store.delete_group(group.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_expense_lifecycle() {
        let store = MemoryStore::new();
        let group = group_of(&["A", "B"], Currency::Jpy);
        store.insert_group(group.clone()).await.unwrap();

        let first = expense_for(&group, 0, 1000.0);
        let second = expense_for(&group, 1, 500.0);
        store.insert_expense(first.clone()).await.unwrap();
        store.insert_expense(second.clone()).await.unwrap();

        let listed = store.list_expenses(group.id).await.unwrap();
        assert_eq!(listed, vec![first.clone(), second.clone()]);

        let changed = Expense {
            amount: 2000.0,
            ..first.clone()
        };
        assert!(store.save_expense(changed).await.unwrap());
        assert_eq!(store.get_expense(first.id).await.unwrap().unwrap().amount, 2000.0);

        assert!(store.delete_expense(first.id).await.unwrap());
        assert!(!store.delete_expense(first.id).await.unwrap());
        assert_eq!(store.list_expenses(group.id).await.unwrap(), vec![second]);
    }
}
