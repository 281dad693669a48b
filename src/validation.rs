//! Input rules applied before anything reaches the store.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::currency::Currency;
use crate::error::{Result, WarikanError};
use crate::schemas::{AddMemberInput, CreateGroupInput, ExpenseDraft, MemberId, UpdateGroupInput};

pub const MAX_GROUP_NAME_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 500;
pub const MAX_MEMBER_NAME_LENGTH: usize = 50;
pub const MAX_EXPENSE_DESCRIPTION_LENGTH: usize = 200;
pub const MIN_EXPENSE_AMOUNT: f64 = 1.0;
pub const MAX_EXPENSE_AMOUNT: f64 = 999_999_999.0;
pub const MAX_MEMBERS_PER_GROUP: usize = 50;

lazy_static! {
    static ref DANGEROUS_CHARS: Regex = Regex::new(r#"[<>"'&]"#).unwrap();
}

fn check_text(field: &str, label: &str, value: &str, max_len: usize) -> Result<()> {
    if value.chars().count() > max_len {
        return Err(WarikanError::validation(
            field,
            format!("{label} must be at most {max_len} characters"),
        ));
    }
    if DANGEROUS_CHARS.is_match(value) {
        return Err(WarikanError::validation(
            field,
            format!("{label} contains characters that are not allowed"),
        ));
    }
    Ok(())
}

fn required_text(field: &str, label: &str, value: &str, max_len: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(WarikanError::validation(field, format!("{label} is required")));
    }
    check_text(field, label, value.trim(), max_len)
}

pub fn group_name(name: &str) -> Result<()> {
    required_text("name", "group name", name, MAX_GROUP_NAME_LENGTH)
}

pub fn description(description: Option<&str>) -> Result<()> {
    match description {
        Some(text) => check_text("description", "description", text.trim(), MAX_DESCRIPTION_LENGTH),
        None => Ok(()),
    }
}

pub fn currency(code: &str) -> Result<Currency> {
    if code.trim().is_empty() {
        return Err(WarikanError::validation("currency", "currency is required"));
    }
    code.parse()
}

pub fn member_name(name: &str) -> Result<()> {
    required_text("memberName", "member name", name, MAX_MEMBER_NAME_LENGTH)
}

pub fn member_names(names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Err(WarikanError::validation(
            "memberNames",
            "at least one member is required",
        ));
    }
    if names.len() > MAX_MEMBERS_PER_GROUP {
        return Err(WarikanError::validation(
            "memberNames",
            format!("a group can have at most {MAX_MEMBERS_PER_GROUP} members"),
        ));
    }

    let mut seen = HashSet::new();
    for name in names {
        required_text("memberNames", "member name", name, MAX_MEMBER_NAME_LENGTH)?;
        let trimmed = name.trim();
        if !seen.insert(trimmed.to_lowercase()) {
            return Err(WarikanError::validation(
                "memberNames",
                format!("duplicate member name: {trimmed}"),
            ));
        }
    }
    Ok(())
}

pub fn expense_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < MIN_EXPENSE_AMOUNT {
        return Err(WarikanError::validation(
            "amount",
            format!("amount must be at least {MIN_EXPENSE_AMOUNT}"),
        ));
    }
    if amount > MAX_EXPENSE_AMOUNT {
        return Err(WarikanError::validation(
            "amount",
            format!("amount must be at most {MAX_EXPENSE_AMOUNT}"),
        ));
    }
    Ok(())
}

pub fn expense_description(description: &str) -> Result<()> {
    required_text(
        "description",
        "expense description",
        description,
        MAX_EXPENSE_DESCRIPTION_LENGTH,
    )
}

pub fn split_member_ids(ids: &[MemberId]) -> Result<()> {
    if ids.is_empty() {
        return Err(WarikanError::validation(
            "splitMemberIds",
            "select at least one member to split with",
        ));
    }
    if ids.len() > MAX_MEMBERS_PER_GROUP {
        return Err(WarikanError::validation(
            "splitMemberIds",
            "too many split members",
        ));
    }
    let mut seen = HashSet::new();
    if ids.iter().any(|id| !seen.insert(id)) {
        return Err(WarikanError::validation(
            "splitMemberIds",
            "duplicate member id",
        ));
    }
    Ok(())
}

/// Validates a new group and resolves its currency, falling back to
/// `default_currency` when none is given.
pub fn create_group(input: &CreateGroupInput, default_currency: Currency) -> Result<Currency> {
    group_name(&input.name)?;
    description(input.description.as_deref())?;
    let currency = match input.currency.as_deref() {
        Some(code) if !code.trim().is_empty() => currency(code)?,
        _ => default_currency,
    };
    member_names(&input.member_names)?;
    Ok(currency)
}

pub fn update_group(input: &UpdateGroupInput) -> Result<Currency> {
    group_name(&input.name)?;
    description(input.description.as_deref())?;
    currency(&input.currency)
}

pub fn add_member(input: &AddMemberInput) -> Result<()> {
    member_name(&input.member_name)?;
    if let Some(email) = input.member_email.as_deref() {
        check_text("memberEmail", "email", email.trim(), MAX_DESCRIPTION_LENGTH)?;
    }
    Ok(())
}

pub fn expense_draft(draft: &ExpenseDraft) -> Result<()> {
    expense_amount(draft.amount)?;
    expense_description(&draft.description)?;
    split_member_ids(&draft.split_member_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_group_name_rules() {
        assert!(group_name("Kyoto trip").is_ok());
        assert!(group_name("   ").is_err());
        assert!(group_name(&"a".repeat(101)).is_err());
        assert!(group_name(&"旅".repeat(100)).is_ok());
        assert!(group_name("<script>").is_err());
        assert!(group_name("Tom & Jerry").is_err());
    }

    #[test]
    fn test_description_is_optional() {
        assert!(description(None).is_ok());
        assert!(description(Some("")).is_ok());
        assert!(description(Some(&"d".repeat(501))).is_err());
        assert!(description(Some("it's")).is_err());
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!(currency("jpy").unwrap(), Currency::Jpy);
        assert_eq!(currency("USD").unwrap(), Currency::Usd);
        assert!(currency("").is_err());
        assert!(currency("BTC").is_err());
    }

    #[test]
    fn test_member_names() {
        let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert!(member_names(&names(&["Alice", "Bob"])).is_ok());
        assert!(member_names(&[]).is_err());
        assert!(member_names(&names(&["Alice", " alice "])).is_err());
        assert!(member_names(&names(&["Alice", ""])).is_err());
        let long = "n".repeat(51);
        assert!(member_names(&names(&[long.as_str()])).is_err());

        let too_many: Vec<String> = (0..51).map(|i| format!("m{i}")).collect();
        assert!(member_names(&too_many).is_err());
    }

    #[test]
    fn test_expense_amount_bounds() {
        assert!(expense_amount(1.0).is_ok());
        assert!(expense_amount(999_999_999.0).is_ok());
        assert!(expense_amount(0.0).is_err());
        assert!(expense_amount(-5.0).is_err());
        assert!(expense_amount(1_000_000_000.0).is_err());
        assert!(expense_amount(f64::INFINITY).is_err());
    }

    #[test]
    fn test_split_member_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(split_member_ids(&[a, b]).is_ok());
        assert!(split_member_ids(&[]).is_err());
        assert!(split_member_ids(&[a, a]).is_err());
    }

    #[test]
    fn test_create_group_defaults_currency() {
        let input = CreateGroupInput {
            name: "Trip".into(),
            description: None,
            currency: None,
            member_names: vec!["A".into()],
        };
        assert_eq!(create_group(&input, Currency::Jpy).unwrap(), Currency::Jpy);

        let input = CreateGroupInput {
            currency: Some("eur".into()),
            ..input
        };
        assert_eq!(create_group(&input, Currency::Jpy).unwrap(), Currency::Eur);
    }

    #[test]
    fn test_validation_error_names_field() {
        let draft = ExpenseDraft {
            amount: 100.0,
            description: "".into(),
            paid_by_id: Uuid::new_v4(),
            split_member_ids: vec![Uuid::new_v4()],
        };
        match expense_draft(&draft).unwrap_err() {
            WarikanError::Validation { field, .. } => assert_eq!(field, "description"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
