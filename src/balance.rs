use std::collections::{HashMap, HashSet};

use crate::currency::Currency;
use crate::error::{Result, WarikanError};
use crate::schemas::{ExpenseInput, Group, MemberBalance, MemberId};
use crate::validation::MAX_EXPENSE_AMOUNT;

/// Paid and owed totals of a single member.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Tally {
    paid: f64,
    owed: f64,
}

/// Equal share of one split participant, rounded to the minor unit.
pub fn equal_share(amount: f64, participants: usize, currency: Currency) -> f64 {
    currency.round(amount / participants as f64)
}

/// Checks an expense against the group roster before it takes part in a
/// calculation.
pub fn check_expense(group: &Group, expense: &ExpenseInput) -> Result<()> {
    if !expense.amount.is_finite() || expense.amount <= 0.0 {
        return Err(WarikanError::validation(
            "amount",
            format!("expense {} must have a positive amount", expense.id),
        ));
    }
    if expense.amount > MAX_EXPENSE_AMOUNT {
        return Err(WarikanError::validation(
            "amount",
            format!("expense {} must be at most {MAX_EXPENSE_AMOUNT}", expense.id),
        ));
    }
    if expense.split_between.is_empty() {
        return Err(WarikanError::validation(
            "splitBetween",
            format!("expense {} has nobody to split between", expense.id),
        ));
    }
    if group.member(&expense.payer_id).is_none() {
        return Err(WarikanError::validation(
            "payerId",
            format!("{} is not a member of group {}", expense.payer_id, group.id),
        ));
    }
    let mut seen = HashSet::new();
    for member_id in &expense.split_between {
        if group.member(member_id).is_none() {
            return Err(WarikanError::validation(
                "splitBetween",
                format!("{} is not a member of group {}", member_id, group.id),
            ));
        }
        if !seen.insert(member_id) {
            return Err(WarikanError::validation(
                "splitBetween",
                format!("{} appears twice in expense {}", member_id, expense.id),
            ));
        }
    }
    Ok(())
}

/// Net position of every member involved in at least one expense, listed in
/// roster order. Positive means the member is owed money.
///
/// Shares are rounded per expense and the residual is kept as is, so the
/// balances may add up to a few minor units instead of zero.
pub fn compute_balances(group: &Group, expenses: &[ExpenseInput]) -> Result<Vec<MemberBalance>> {
    let currency = group.currency;
    let mut tallies: HashMap<MemberId, Tally> = HashMap::new();

    for expense in expenses {
        check_expense(group, expense)?;

        tallies.entry(expense.payer_id).or_default().paid += expense.amount;

        let share = equal_share(expense.amount, expense.split_between.len(), currency);
        for member_id in &expense.split_between {
            tallies.entry(*member_id).or_default().owed += share;
        }
    }

    let balances = group
        .members
        .iter()
        .filter_map(|member| {
            tallies.get(&member.id).map(|tally| MemberBalance {
                member_id: member.id,
                member_name: member.name.clone(),
                balance: currency.round(tally.paid - tally.owed),
            })
        })
        .collect();
    Ok(balances)
}
