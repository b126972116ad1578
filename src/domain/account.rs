//! Account records and identifier generation

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::amount::{AmountError, Balance};
use super::currency::Currency;
use super::error::DomainError;

/// Length of the random tail of an account identifier
pub const IBAN_ACCOUNT_PART_LEN: usize = 16;

const IBAN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A user-owned monetary account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub currency: Currency,
    pub balance: Balance,
    pub iban: String,
    pub swift_code: String,
    /// Incremented on every balance write
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// A fresh zero-balance account.
    pub fn open(owner_id: Uuid, currency: Currency, iban: String, swift_code: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            currency,
            balance: Balance::zero(),
            iban,
            swift_code,
            version: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    /// Apply a signed delta to the balance and bump the version.
    ///
    /// Leaves the account untouched and returns `InsufficientFunds` if the
    /// result would be negative, `InvalidAmount` if it would exceed the
    /// balance ceiling.
    pub fn apply_delta(&mut self, delta: Decimal) -> Result<Balance, DomainError> {
        let next = self.balance.apply(delta).map_err(|e| match e {
            AmountError::Negative(_) => DomainError::insufficient_funds(-delta, self.balance.value()),
            other => DomainError::InvalidAmount(other.to_string()),
        })?;
        self.balance = next;
        self.version += 1;
        Ok(next)
    }

    pub fn public_view(&self) -> PublicAccount {
        PublicAccount {
            id: self.id,
            iban: self.iban.clone(),
            swift_code: self.swift_code.clone(),
            currency: self.currency,
        }
    }
}

/// What a payer may learn about someone else's account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicAccount {
    pub id: Uuid,
    pub iban: String,
    pub swift_code: String,
    pub currency: Currency,
}

/// Source of candidate account identifiers.
pub trait IbanGenerator: Send + Sync {
    fn generate(&self, currency: Currency, bank_code: &str) -> String;
}

/// Country code + 2-digit control + bank code + 16 random uppercase alphanumerics.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIbanGenerator;

impl IbanGenerator for RandomIbanGenerator {
    fn generate(&self, currency: Currency, bank_code: &str) -> String {
        let mut rng = rand::thread_rng();
        let control: u8 = rng.gen_range(0..100);
        let account_part: String = (0..IBAN_ACCOUNT_PART_LEN)
            .map(|_| IBAN_ALPHABET[rng.gen_range(0..IBAN_ALPHABET.len())] as char)
            .collect();

        format!(
            "{}{:02}{}{}",
            currency.country_code(),
            control,
            bank_code,
            account_part
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_generated_iban_layout() {
        let iban = RandomIbanGenerator.generate(Currency::Usd, "RAXR");

        assert_eq!(iban.len(), 2 + 2 + 4 + IBAN_ACCOUNT_PART_LEN);
        assert!(iban.starts_with("US"));
        assert!(iban[2..4].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(&iban[4..8], "RAXR");
        assert!(iban[8..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_country_prefix_follows_currency() {
        assert!(RandomIbanGenerator.generate(Currency::Eur, "RAXR").starts_with("PT"));
        assert!(RandomIbanGenerator.generate(Currency::Pln, "RAXR").starts_with("PL"));
    }

    #[test]
    fn test_apply_delta() {
        let mut account = Account::open(Uuid::new_v4(), Currency::Eur, "PT00RAXR".into(), "RAXBANK".into());
        assert_eq!(account.version, 0);

        account.apply_delta(dec!(100)).unwrap();
        account.apply_delta(dec!(-40)).unwrap();
        assert_eq!(account.balance.value(), dec!(60.00));
        assert_eq!(account.version, 2);

        let err = account.apply_delta(dec!(-60.01)).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientFunds {
                required: dec!(60.01),
                available: dec!(60.00)
            }
        );
        // Failed delta leaves the row alone
        assert_eq!(account.balance.value(), dec!(60.00));
        assert_eq!(account.version, 2);
    }

    #[test]
    fn test_credit_past_maximum_is_invalid_amount() {
        let mut account = Account::open(Uuid::new_v4(), Currency::Eur, "PT00RAXR".into(), "RAXBANK".into());
        account.apply_delta(dec!(999999999999.00)).unwrap();

        let err = account.apply_delta(dec!(5.00)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidAmount(_)), "got {:?}", err);
        assert_eq!(account.balance.value(), dec!(999999999999.00));
        assert_eq!(account.version, 1);
    }

    #[test]
    fn test_public_view_hides_balance_and_owner() {
        let account = Account::open(Uuid::new_v4(), Currency::Gbp, "GB12RAXR".into(), "RAXBANK".into());
        let json = serde_json::to_value(account.public_view()).unwrap();

        assert!(json.get("balance").is_none());
        assert!(json.get("owner_id").is_none());
        assert_eq!(json["currency"], "GBP");
    }
}
