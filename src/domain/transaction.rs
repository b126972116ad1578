//! Transaction log records
//!
//! Immutable money-movement rows, top-up reconciliation rows and paging types
//! for statements.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::currency::Currency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    TransferInternal,
    TransferExternal,
    PurchaseFeature,
    Topup,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::TransferInternal => "TRANSFER_INTERNAL",
            TransactionType::TransferExternal => "TRANSFER_EXTERNAL",
            TransactionType::PurchaseFeature => "PURCHASE_FEATURE",
            TransactionType::Topup => "TOPUP",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TRANSFER_INTERNAL" => Ok(TransactionType::TransferInternal),
            "TRANSFER_EXTERNAL" => Ok(TransactionType::TransferExternal),
            "PURCHASE_FEATURE" => Ok(TransactionType::PurchaseFeature),
            "TOPUP" => Ok(TransactionType::Topup),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

/// Only completed movements are ever written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        "SUCCESS"
    }
}

/// A transaction about to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub initiator_id: Uuid,
    pub from_account_id: Option<Uuid>,
    pub to_account_id: Option<Uuid>,
    pub kind: TransactionType,
    pub amount_from: Option<Decimal>,
    pub currency_from: Option<Currency>,
    pub amount_to: Option<Decimal>,
    pub currency_to: Option<Currency>,
    pub fx_rate: Decimal,
    pub external_ref: Option<String>,
    pub description: String,
}

/// A persisted transaction row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub initiator_id: Uuid,
    pub from_account_id: Option<Uuid>,
    pub to_account_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub amount_from: Option<Decimal>,
    pub currency_from: Option<Currency>,
    pub amount_to: Option<Decimal>,
    pub currency_to: Option<Currency>,
    pub fx_rate: Decimal,
    pub external_ref: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn from_new(id: i64, tx: NewTransaction, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            initiator_id: tx.initiator_id,
            from_account_id: tx.from_account_id,
            to_account_id: tx.to_account_id,
            kind: tx.kind,
            status: TransactionStatus::Success,
            amount_from: tx.amount_from,
            currency_from: tx.currency_from,
            amount_to: tx.amount_to,
            currency_to: tx.currency_to,
            fx_rate: tx.fx_rate,
            external_ref: tx.external_ref,
            description: tx.description,
            created_at,
        }
    }

    pub fn touches(&self, account_id: Uuid) -> bool {
        self.from_account_id == Some(account_id) || self.to_account_id == Some(account_id)
    }
}

/// One reconciled payment session. The session id is the idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopUpLog {
    pub session_id: String,
    pub account_id: Uuid,
    pub amount_paid: Decimal,
    pub paid_currency: Currency,
    pub amount_credited: Decimal,
    pub credited_currency: Currency,
    pub processed_at: DateTime<Utc>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Statement page request. `page` is 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
    #[serde(default)]
    pub direction: SortDirection,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            direction: SortDirection::Desc,
        }
    }
}

impl PageRequest {
    /// Clamp the size into 1..=100
    pub fn normalized(self) -> Self {
        Self {
            size: self.size.clamp(1, MAX_PAGE_SIZE),
            ..self
        }
    }

    pub fn offset(&self) -> u64 {
        self.page as u64 * self.size as u64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
    pub last: bool,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        let size = request.size.max(1) as u64;
        let total_pages = total_elements.div_ceil(size) as u32;
        Self {
            content,
            page_number: request.page,
            page_size: request.size,
            total_elements,
            total_pages,
            last: request.page.saturating_add(1) >= total_pages,
        }
    }

    /// Slice an already ordered, fully loaded list.
    pub fn from_sorted(items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len() as u64;
        let content = items
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.size as usize)
            .collect();
        Self::new(content, request, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(TransactionType::Topup.to_string(), "TOPUP");
        assert_eq!(
            "PURCHASE_FEATURE".parse::<TransactionType>().unwrap(),
            TransactionType::PurchaseFeature
        );
        assert_eq!(
            serde_json::to_string(&TransactionType::TransferExternal).unwrap(),
            r#""TRANSFER_EXTERNAL""#
        );
    }

    #[test]
    fn test_page_request_defaults_and_clamp() {
        let req: PageRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, PageRequest::default());

        let req = PageRequest { page: 2, size: 500, direction: SortDirection::Asc }.normalized();
        assert_eq!(req.size, MAX_PAGE_SIZE);
        assert_eq!(req.offset(), 200);

        let req = PageRequest { page: 0, size: 0, direction: SortDirection::Desc }.normalized();
        assert_eq!(req.size, 1);
    }

    #[test]
    fn test_page_slicing() {
        let items: Vec<u32> = (0..25).collect();
        let req = PageRequest { page: 2, size: 10, direction: SortDirection::Asc };
        let page = Page::from_sorted(items, req);

        assert_eq!(page.content, vec![20, 21, 22, 23, 24]);
        assert_eq!(page.total_elements, 25);
        assert_eq!(page.total_pages, 3);
        assert!(page.last);
    }

    #[test]
    fn test_empty_page_is_last() {
        let page: Page<u32> = Page::from_sorted(vec![], PageRequest::default());
        assert_eq!(page.total_pages, 0);
        assert!(page.last);
    }

    #[test]
    fn test_highest_page_number_is_past_the_end() {
        let req = PageRequest { page: u32::MAX, size: 10, direction: SortDirection::Desc }.normalized();
        let page = Page::from_sorted(vec![1u32, 2, 3], req);

        assert!(page.content.is_empty());
        assert_eq!(page.page_number, u32::MAX);
        assert_eq!(page.total_pages, 1);
        assert!(page.last);
    }
}
