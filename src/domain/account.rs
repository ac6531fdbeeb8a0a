use super::ids::AccountId;
use crate::error::{MarketError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::ops::{Neg, Sub};

const MAX_EMAIL_LEN: usize = 254;
const MAX_NAME_LEN: usize = 30;

/// Spendable in-app currency held by an account.
///
/// This is a wrapper around `rust_decimal::Decimal` so that balances cannot be
/// mixed up with listing prices or arbitrary amounts by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// A strictly positive amount of money moved into an account, at most
/// [`Amount::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const MAX: Decimal = dec!(2147483647);

    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(MarketError::ValidationError(
                "Amount must be positive".to_string(),
            ));
        }
        if value > Self::MAX {
            return Err(MarketError::ValidationError(format!(
                "Amount cannot exceed {}",
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = MarketError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Adds `rhs`, failing instead of overflowing.
    pub fn checked_add(self, rhs: Self) -> Result<Self> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or_else(|| MarketError::ValidationError("Balance limit exceeded.".to_string()))
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Balance {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

/// A registered marketplace participant.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    /// Unique, normalized login email.
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub balance: Balance,
    pub joined_at: DateTime<Utc>,
}

impl Account {
    pub fn new(id: AccountId, new: NewAccount) -> Self {
        Self {
            id,
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            balance: new.balance,
            joined_at: Utc::now(),
        }
    }

    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }

    /// Name shown next to listings and comments; falls back to the email.
    pub fn display_name(&self) -> String {
        let full_name = self.full_name();
        if full_name.is_empty() || full_name.eq_ignore_ascii_case("none none") {
            self.email.clone()
        } else {
            full_name
        }
    }

    /// Credits a top-up to the balance.
    pub fn deposit(&mut self, amount: Amount) -> Result<()> {
        self.balance = self.balance.checked_add(amount.into())?;
        Ok(())
    }

    pub fn apply(&mut self, patch: AccountPatch) {
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(first_name) = patch.first_name {
            self.first_name = non_empty(first_name);
        }
        if let Some(last_name) = patch.last_name {
            self.last_name = non_empty(last_name);
        }
    }
}

/// Registration payload.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NewAccount {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(skip, default)]
    pub balance: Balance,
}

impl NewAccount {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            first_name: None,
            last_name: None,
            balance: Balance::ZERO,
        }
    }

    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = Balance::new(balance);
        self
    }

    /// Validates and normalizes the payload before it reaches a store.
    pub fn validated(self) -> Result<Self> {
        if self.balance.is_negative() {
            return Err(MarketError::ValidationError(
                "Balance cannot be negative".to_string(),
            ));
        }
        Ok(Self {
            email: normalize_email(&self.email)?,
            first_name: validate_name(self.first_name)?,
            last_name: validate_name(self.last_name)?,
            balance: self.balance,
        })
    }
}

/// Partial profile update. Balance is deliberately absent; money only moves
/// through deposits and purchases.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct AccountPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl AccountPatch {
    pub fn validated(self) -> Result<Self> {
        let email = self.email.as_deref().map(normalize_email).transpose()?;
        for name in [&self.first_name, &self.last_name].into_iter().flatten() {
            if name.trim().chars().count() > MAX_NAME_LEN {
                return Err(MarketError::ValidationError(format!(
                    "Names are limited to {MAX_NAME_LEN} characters"
                )));
            }
        }
        Ok(Self { email, ..self })
    }
}

/// Lower-cases the domain part, leaving the local part untouched.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim();
    let invalid = || MarketError::ValidationError("Enter a valid email address.".to_string());
    if email.is_empty() || email.len() > MAX_EMAIL_LEN || email.contains(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.rsplit_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    Ok(format!("{local}@{}", domain.to_lowercase()))
}

fn validate_name(name: Option<String>) -> Result<Option<String>> {
    match name.and_then(non_empty) {
        Some(name) if name.chars().count() > MAX_NAME_LEN => Err(MarketError::ValidationError(
            format!("Names are limited to {MAX_NAME_LEN} characters"),
        )),
        other => Ok(other),
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
