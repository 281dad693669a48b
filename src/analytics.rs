//! Spending aggregates behind the analytics charts.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::schemas::{Expense, Group, MemberId};

pub const DAILY_WINDOW_DAYS: i64 = 30;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTotal {
    /// `YYYY-MM`
    pub month: String,
    pub amount: f64,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotal {
    /// `YYYY-MM-DD`
    pub date: String,
    pub amount: f64,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberTotal {
    pub member_id: MemberId,
    pub member_name: String,
    pub total_paid: f64,
    pub expense_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Food,
    Transport,
    Lodging,
    Shopping,
    Entertainment,
    Other,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: Category,
    pub amount: f64,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAnalytics {
    pub by_month: Vec<MonthlyTotal>,
    pub by_day: Vec<DailyTotal>,
    pub by_member: Vec<MemberTotal>,
    pub by_category: Vec<CategoryTotal>,
}

const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Food,
        &["食事", "ランチ", "ディナー", "朝食", "レストラン", "カフェ", "lunch", "dinner", "breakfast", "restaurant", "cafe", "food"],
    ),
    (
        Category::Transport,
        &["交通", "電車", "バス", "タクシー", "ガソリン", "train", "bus", "taxi", "gas", "fuel"],
    ),
    (
        Category::Lodging,
        &["宿泊", "ホテル", "旅館", "hotel", "hostel"],
    ),
    (
        Category::Shopping,
        &["買い物", "ショッピング", "お土産", "shopping", "souvenir"],
    ),
    (
        Category::Entertainment,
        &["娯楽", "映画", "ゲーム", "アミューズメント", "movie", "cinema", "game", "karaoke"],
    ),
];

lazy_static! {
    static ref CATEGORY_PATTERNS: Vec<(Category, Regex)> = CATEGORY_KEYWORDS
        .iter()
        .map(|(category, keywords)| (*category, keyword_pattern(keywords)))
        .collect();
}

// ASCII keywords must match whole words (with an optional plural `s`), so
// "gas" does not fire on "Las Vegas". Japanese text has no word breaks and
// matches anywhere.
fn keyword_pattern(keywords: &[&str]) -> Regex {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|keyword| {
            let escaped = regex::escape(keyword);
            if keyword.is_ascii() {
                format!(r"\b{escaped}s?\b")
            } else {
                escaped
            }
        })
        .collect();
    Regex::new(&format!("(?i){}", alternatives.join("|"))).unwrap()
}

/// Guesses a category from an expense description. First matching keyword
/// group wins.
pub fn categorize(description: &str) -> Category {
    CATEGORY_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(description))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}

pub fn by_month(expenses: &[Expense]) -> Vec<MonthlyTotal> {
    let mut months: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for expense in expenses {
        let date = expense.created_at.date_naive();
        let key = format!("{:04}-{:02}", date.year(), date.month());
        let entry = months.entry(key).or_default();
        entry.0 += expense.amount;
        entry.1 += 1;
    }
    months
        .into_iter()
        .map(|(month, (amount, count))| MonthlyTotal { month, amount, count })
        .collect()
}

/// Totals for each of the last `DAILY_WINDOW_DAYS` days ending on `today`,
/// with empty days included.
pub fn by_day(expenses: &[Expense], today: NaiveDate) -> Vec<DailyTotal> {
    let first = today - Duration::days(DAILY_WINDOW_DAYS - 1);
    let mut days: BTreeMap<NaiveDate, (f64, usize)> = (0..DAILY_WINDOW_DAYS)
        .map(|offset| (first + Duration::days(offset), (0.0, 0)))
        .collect();

    for expense in expenses {
        if let Some(entry) = days.get_mut(&expense.created_at.date_naive()) {
            entry.0 += expense.amount;
            entry.1 += 1;
        }
    }

    days.into_iter()
        .map(|(date, (amount, count))| DailyTotal {
            date: date.format("%Y-%m-%d").to_string(),
            amount,
            count,
        })
        .collect()
}

/// What each member paid, payers only, biggest spender first.
pub fn by_member(expenses: &[Expense], group: &Group) -> Vec<MemberTotal> {
    let mut totals: HashMap<MemberId, (f64, usize)> = HashMap::new();
    for expense in expenses {
        let entry = totals.entry(expense.paid_by_id).or_default();
        entry.0 += expense.amount;
        entry.1 += 1;
    }

    let mut result: Vec<MemberTotal> = totals
        .into_iter()
        .filter(|(_, (total, _))| *total > 0.0)
        .map(|(member_id, (total_paid, expense_count))| {
            let member_name = group
                .member(&member_id)
                .map(|m| m.name.clone())
                .or_else(|| {
                    expenses
                        .iter()
                        .find(|e| e.paid_by_id == member_id)
                        .map(|e| e.paid_by_name.clone())
                })
                .unwrap_or_default();
            MemberTotal {
                member_id,
                member_name,
                total_paid,
                expense_count,
            }
        })
        .collect();

    result.sort_by(|a, b| {
        b.total_paid
            .total_cmp(&a.total_paid)
            .then_with(|| a.member_name.cmp(&b.member_name))
    });
    result
}

pub fn by_category(expenses: &[Expense]) -> Vec<CategoryTotal> {
    let mut categories: BTreeMap<Category, (f64, usize)> = BTreeMap::new();
    for expense in expenses {
        let entry = categories.entry(categorize(&expense.description)).or_default();
        entry.0 += expense.amount;
        entry.1 += 1;
    }

    let mut result: Vec<CategoryTotal> = categories
        .into_iter()
        .map(|(category, (amount, count))| CategoryTotal { category, amount, count })
        .collect();
    result.sort_by(|a, b| b.amount.total_cmp(&a.amount).then_with(|| a.category.cmp(&b.category)));
    result
}

pub fn summarize(group: &Group, expenses: &[Expense], today: NaiveDate) -> GroupAnalytics {
    GroupAnalytics {
        by_month: by_month(expenses),
        by_day: by_day(expenses, today),
        by_member: by_member(expenses, group),
        by_category: by_category(expenses),
    }
}
