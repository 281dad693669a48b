//! Application ports and the in-process `Ledger` that implements them on
//! top of a [`GroupStore`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::analytics::{self, GroupAnalytics};
use crate::currency::Currency;
use crate::error::{Result, WarikanError};
use crate::exchange::calculate_settlements;
use crate::schemas::{
    AddMemberInput, CreateGroupInput, Expense, ExpenseDraft, ExpenseInput, Group, Member,
    SettlementResult, SplitMember, UpdateGroupInput,
};
use crate::store::{GroupDetails, GroupStore, RosterChange};
use crate::validation::{self, MAX_MEMBERS_PER_GROUP};

#[async_trait]
pub trait GroupService: Send + Sync {
    async fn create_group(&self, input: CreateGroupInput) -> Result<Group>;
    async fn get_group(&self, id: Uuid) -> Result<Group>;
    async fn list_groups(&self) -> Result<Vec<Group>>;
    async fn update_group(&self, id: Uuid, input: UpdateGroupInput) -> Result<Group>;
    async fn delete_group(&self, id: Uuid) -> Result<()>;
    async fn add_member(&self, group_id: Uuid, input: AddMemberInput) -> Result<Member>;
    async fn remove_member(&self, group_id: Uuid, member_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ExpenseService: Send + Sync {
    async fn add_expense(&self, group_id: Uuid, draft: ExpenseDraft) -> Result<Expense>;
    async fn list_expenses(&self, group_id: Uuid) -> Result<Vec<Expense>>;
    async fn update_expense(&self, expense_id: Uuid, draft: ExpenseDraft) -> Result<Expense>;
    async fn update_group_expense(
        &self,
        group_id: Uuid,
        expense_id: Uuid,
        draft: ExpenseDraft,
    ) -> Result<Expense>;
    async fn delete_expense(&self, expense_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait SettlementService: Send + Sync {
    async fn calculate_settlements(
        &self,
        group_id: Uuid,
        expenses: Vec<ExpenseInput>,
    ) -> Result<SettlementResult>;
    async fn group_settlements(&self, group_id: Uuid) -> Result<SettlementResult>;
    async fn group_analytics(&self, group_id: Uuid) -> Result<GroupAnalytics>;
}

/// Splits `amount` evenly across `members`, in minor units, handing the
/// remainder out one unit at a time from the front so the shares add up to
/// exactly `amount`.
pub fn split_evenly(amount: f64, members: &[&Member], currency: Currency) -> Vec<SplitMember> {
    if members.is_empty() {
        return Vec::new();
    }
    let total = currency.to_minor_units(amount);
    let count = members.len() as i64;
    let base = total.div_euclid(count);
    let remainder = total.rem_euclid(count);

    members
        .iter()
        .enumerate()
        .map(|(index, member)| {
            let extra = if (index as i64) < remainder { 1 } else { 0 };
            SplitMember {
                member_id: member.id,
                member_name: member.name.clone(),
                amount: currency.from_minor_units(base + extra),
            }
        })
        .collect()
}

pub struct Ledger {
    store: Arc<dyn GroupStore>,
    default_currency: Currency,
}

impl Ledger {
    pub fn new(store: Arc<dyn GroupStore>, default_currency: Currency) -> Self {
        Self {
            store,
            default_currency,
        }
    }

    pub fn store(&self) -> &Arc<dyn GroupStore> {
        &self.store
    }

    async fn require_group(&self, id: Uuid) -> Result<Group> {
        self.store
            .get_group(id)
            .await?
            .ok_or_else(|| WarikanError::not_found("group", id))
    }

    async fn require_expense(&self, id: Uuid) -> Result<Expense> {
        self.store
            .get_expense(id)
            .await?
            .ok_or_else(|| WarikanError::not_found("expense", id))
    }

    /// Resolves payer and split members of a draft against the group roster.
    fn resolve_draft<'g>(
        group: &'g Group,
        draft: &ExpenseDraft,
    ) -> Result<(&'g Member, Vec<&'g Member>)> {
        validation::expense_draft(draft)?;

        let payer = group.member(&draft.paid_by_id).ok_or_else(|| {
            WarikanError::validation(
                "paidById",
                format!("{} is not a member of this group", draft.paid_by_id),
            )
        })?;

        let split = draft
            .split_member_ids
            .iter()
            .map(|id| {
                group.member(id).ok_or_else(|| {
                    WarikanError::validation(
                        "splitMemberIds",
                        format!("{id} is not a member of this group"),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((payer, split))
    }

    async fn rewrite_expense(&self, existing: Expense, draft: ExpenseDraft) -> Result<Expense> {
        let group = self.require_group(existing.group_id).await?;
        let (payer, split) = Self::resolve_draft(&group, &draft)?;

        let expense = Expense {
            amount: draft.amount,
            description: draft.description.trim().to_string(),
            paid_by_id: payer.id,
            paid_by_name: payer.name.clone(),
            split_members: split_evenly(draft.amount, &split, group.currency),
            updated_at: Some(Utc::now()),
            ..existing
        };

        if !self.store.save_expense(expense.clone()).await? {
            return Err(WarikanError::not_found("expense", expense.id));
        }
        info!(expense_id = %expense.id, group_id = %expense.group_id, "expense updated");
        Ok(expense)
    }
}

#[async_trait]
impl GroupService for Ledger {
    async fn create_group(&self, input: CreateGroupInput) -> Result<Group> {
        let currency = validation::create_group(&input, self.default_currency)?;
        let now = Utc::now();

        let members = input
            .member_names
            .iter()
            .map(|name| Member {
                id: Uuid::new_v4(),
                name: name.trim().to_string(),
                email: None,
                joined_at: now,
            })
            .collect();

        let group = Group {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            description: input
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            currency,
            created_at: now,
            updated_at: None,
            members,
        };

        self.store.insert_group(group.clone()).await?;
        info!(group_id = %group.id, members = group.members.len(), "group created");
        Ok(group)
    }

    async fn get_group(&self, id: Uuid) -> Result<Group> {
        self.require_group(id).await
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        self.store.list_groups().await
    }

    async fn update_group(&self, id: Uuid, input: UpdateGroupInput) -> Result<Group> {
        let currency = validation::update_group(&input)?;
        let details = GroupDetails {
            name: input.name.trim().to_string(),
            description: input
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            currency,
            updated_at: Utc::now(),
        };

        let group = self
            .store
            .update_group_details(id, details)
            .await?
            .ok_or_else(|| WarikanError::not_found("group", id))?;
        info!(group_id = %id, "group updated");
        Ok(group)
    }

    async fn delete_group(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_group(id).await? {
            return Err(WarikanError::not_found("group", id));
        }
        info!(group_id = %id, "group deleted");
        Ok(())
    }

    async fn add_member(&self, group_id: Uuid, input: AddMemberInput) -> Result<Member> {
        validation::add_member(&input)?;

        let member = Member {
            id: Uuid::new_v4(),
            name: input.member_name.trim().to_string(),
            email: input
                .member_email
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
            joined_at: Utc::now(),
        };

        match self
            .store
            .add_member(group_id, member.clone(), MAX_MEMBERS_PER_GROUP)
            .await?
        {
            RosterChange::Applied => {
                info!(%group_id, member_id = %member.id, "member added");
                Ok(member)
            }
            RosterChange::DuplicateName => Err(WarikanError::Conflict(format!(
                "member {} already exists in this group",
                member.name
            ))),
            RosterChange::GroupFull => Err(WarikanError::validation(
                "memberName",
                format!("a group can have at most {MAX_MEMBERS_PER_GROUP} members"),
            )),
            RosterChange::GroupNotFound | RosterChange::MemberNotFound => {
                Err(WarikanError::not_found("group", group_id))
            }
        }
    }

    async fn remove_member(&self, group_id: Uuid, member_id: Uuid) -> Result<()> {
        match self
            .store
            .remove_member(group_id, member_id, Utc::now())
            .await?
        {
            RosterChange::Applied => {
                info!(%group_id, %member_id, "member removed");
                Ok(())
            }
            RosterChange::MemberNotFound => Err(WarikanError::not_found("member", member_id)),
            _ => Err(WarikanError::not_found("group", group_id)),
        }
    }
}

#[async_trait]
impl ExpenseService for Ledger {
    async fn add_expense(&self, group_id: Uuid, draft: ExpenseDraft) -> Result<Expense> {
        let group = self.require_group(group_id).await?;
        let (payer, split) = Self::resolve_draft(&group, &draft)?;

        let expense = Expense {
            id: Uuid::new_v4(),
            group_id,
            amount: draft.amount,
            description: draft.description.trim().to_string(),
            paid_by_id: payer.id,
            paid_by_name: payer.name.clone(),
            split_members: split_evenly(draft.amount, &split, group.currency),
            created_at: Utc::now(),
            updated_at: None,
        };

        self.store.insert_expense(expense.clone()).await?;
        info!(expense_id = %expense.id, %group_id, amount = expense.amount, "expense added");
        Ok(expense)
    }

    async fn list_expenses(&self, group_id: Uuid) -> Result<Vec<Expense>> {
        self.require_group(group_id).await?;
        self.store.list_expenses(group_id).await
    }

    async fn update_expense(&self, expense_id: Uuid, draft: ExpenseDraft) -> Result<Expense> {
        let existing = self.require_expense(expense_id).await?;
        self.rewrite_expense(existing, draft).await
    }

    async fn update_group_expense(
        &self,
        group_id: Uuid,
        expense_id: Uuid,
        draft: ExpenseDraft,
    ) -> Result<Expense> {
        self.require_group(group_id).await?;
        let existing = self.require_expense(expense_id).await?;
        if existing.group_id != group_id {
            return Err(WarikanError::not_found("expense", expense_id));
        }
        self.rewrite_expense(existing, draft).await
    }

    async fn delete_expense(&self, expense_id: Uuid) -> Result<()> {
        if !self.store.delete_expense(expense_id).await? {
            return Err(WarikanError::not_found("expense", expense_id));
        }
        info!(%expense_id, "expense deleted");
        Ok(())
    }
}

#[async_trait]
impl SettlementService for Ledger {
    async fn calculate_settlements(
        &self,
        group_id: Uuid,
        expenses: Vec<ExpenseInput>,
    ) -> Result<SettlementResult> {
        let group = self.require_group(group_id).await?;
        info!(%group_id, expenses = expenses.len(), "calculating settlements");
        calculate_settlements(&group, &expenses)
    }

    async fn group_settlements(&self, group_id: Uuid) -> Result<SettlementResult> {
        let group = self.require_group(group_id).await?;
        let stored = self.store.list_expenses(group_id).await?;

        // Expenses may still name members that were removed later; keep
        // those members so their share is accounted for.
        let mut roster = group;
        for expense in &stored {
            let involved = std::iter::once((expense.paid_by_id, &expense.paid_by_name)).chain(
                expense
                    .split_members
                    .iter()
                    .map(|split| (split.member_id, &split.member_name)),
            );
            for (id, name) in involved {
                if roster.member(&id).is_none() {
                    roster.members.push(Member {
                        id,
                        name: name.clone(),
                        email: None,
                        joined_at: expense.created_at,
                    });
                }
            }
        }

        let inputs: Vec<ExpenseInput> = stored.iter().map(Expense::to_input).collect();
        calculate_settlements(&roster, &inputs)
    }

    async fn group_analytics(&self, group_id: Uuid) -> Result<GroupAnalytics> {
        let group = self.require_group(group_id).await?;
        let expenses = self.store.list_expenses(group_id).await?;
        Ok(analytics::summarize(
            &group,
            &expenses,
            Utc::now().date_naive(),
        ))
    }
}
