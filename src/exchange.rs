use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::balance::compute_balances;
use crate::currency::Currency;
use crate::error::Result;
use crate::schemas::{ExpenseInput, Group, MemberBalance, MemberId, Settlement, SettlementResult};

#[derive(Clone, Debug)]
struct Position {
    id: MemberId,
    name: String,
    // Always non-negative: what a creditor is still owed or a debtor still owes.
    remaining: f64,
}

/// Rounds to the minor unit and snaps anything smaller than one minor unit
/// to zero.
fn settle_dust(amount: f64, currency: Currency) -> f64 {
    let rounded = currency.round(amount);
    if rounded.abs() < currency.minor_unit() {
        0.0
    } else {
        rounded
    }
}

// Largest remaining amount first, lowest member id on ties.
fn by_priority(a: &Position, b: &Position) -> Ordering {
    a.remaining
        .total_cmp(&b.remaining)
        .then_with(|| b.id.cmp(&a.id))
}

fn largest(positions: &[Position]) -> Option<usize> {
    positions
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| by_priority(a, b))
        .map(|(index, _)| index)
}

/// Pairs the largest creditor with the largest debtor until one side runs
/// out, producing at most `nonzero balances - 1` transfers. Balances that
/// do not round to a finite amount are left out.
///
/// Ties between equal balances go to the member with the lowest id
/// (`Uuid` ordering, which matches the lowercase string ordering), so the
/// output only depends on the input values.
pub fn simplify(balances: &[MemberBalance], currency: Currency) -> Vec<Settlement> {
    let mut creditors = Vec::new();
    let mut debtors = Vec::new();

    for balance in balances {
        let amount = settle_dust(balance.balance, currency);
        if !amount.is_finite() {
            warn!(member_id = %balance.member_id, "skipping non-finite balance");
            continue;
        }
        let position = Position {
            id: balance.member_id,
            name: balance.member_name.clone(),
            remaining: amount.abs(),
        };
        if amount > 0.0 {
            creditors.push(position);
        } else if amount < 0.0 {
            debtors.push(position);
        }
    }

    // Each transfer retires at least one position.
    let max_transfers = creditors.len() + debtors.len();
    let mut settlements = Vec::new();

    while settlements.len() < max_transfers {
        let (Some(c), Some(d)) = (largest(&creditors), largest(&debtors)) else {
            break;
        };
        let creditor = &creditors[c];
        let debtor = &debtors[d];
        let transfer = currency.round(creditor.remaining.min(debtor.remaining));

        settlements.push(Settlement {
            from_member_id: debtor.id,
            to_member_id: creditor.id,
            amount: transfer,
            from_name: debtor.name.clone(),
            to_name: creditor.name.clone(),
        });

        creditors[c].remaining = settle_dust(creditors[c].remaining - transfer, currency);
        debtors[d].remaining = settle_dust(debtors[d].remaining - transfer, currency);

        if creditors[c].remaining == 0.0 {
            creditors.swap_remove(c);
        }
        if debtors[d].remaining == 0.0 {
            debtors.swap_remove(d);
        }
    }

    if !creditors.is_empty() || !debtors.is_empty() {
        debug!(
            creditors = creditors.len(),
            debtors = debtors.len(),
            "rounding residual left unsettled"
        );
    }

    settlements
}

/// Balances and the minimal transfer plan for a set of equal-split
/// expenses of `group`.
pub fn calculate_settlements(group: &Group, expenses: &[ExpenseInput]) -> Result<SettlementResult> {
    let balances = compute_balances(group, expenses)?;
    let settlements = simplify(&balances, group.currency);

    debug!(
        group_id = %group.id,
        expenses = expenses.len(),
        settlements = settlements.len(),
        "settlements calculated"
    );

    Ok(SettlementResult {
        settlements,
        balances,
    })
}
