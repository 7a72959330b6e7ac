use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use invoicechain_core::Address;
use invoicechain_fhe::{EncryptedHandle, ExternalCiphertext, InputProof};
use invoicechain_infra::{AmountInput, NewInvoice, Page};
use invoicechain_invoicing::{
    ContractVariant, InvoiceId, InvoiceRecord, InvoiceStatus,
};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Encrypted input as returned by `POST /relayer/encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub ciphertext: ExternalCiphertext,
    pub proof: InputProof,
}

/// Exactly one of `amount` / `encrypted_amount` must be set, matching the
/// registry's variant.
#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub recipient: Address,
    #[serde(default)]
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub amount: Option<u64>,
    pub encrypted_amount: Option<EncryptedInput>,
}

impl CreateInvoiceRequest {
    pub fn into_new_invoice(self) -> Result<NewInvoice, axum::response::Response> {
        let amount = match (self.amount, self.encrypted_amount) {
            (Some(v), None) => AmountInput::Plain(v),
            (None, Some(input)) => AmountInput::Encrypted {
                ciphertext: input.ciphertext,
                proof: input.proof,
            },
            _ => {
                return Err(errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    "exactly one of amount or encrypted_amount is required",
                ));
            }
        };

        Ok(NewInvoice {
            recipient: self.recipient,
            amount,
            description: self.description,
            due_date: self.due_date,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub ciphertext: ExternalCiphertext,
    pub proof: InputProof,
}

#[derive(Debug, Deserialize)]
pub struct EncryptRequest {
    pub value: u64,
}

#[derive(Debug, Deserialize)]
pub struct DecryptRequest {
    pub handle: EncryptedHandle,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl PageQuery {
    pub fn to_page(&self) -> Page {
        Page::new(
            self.offset.unwrap_or(0),
            self.limit.unwrap_or(Page::DEFAULT_LIMIT),
        )
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CreatedInvoice {
    pub id: InvoiceId,
}

#[derive(Debug, Serialize)]
pub struct InvoiceView {
    pub id: InvoiceId,
    pub sender: Address,
    pub recipient: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_amount: Option<EncryptedHandle>,
    pub description: String,
    pub status: InvoiceStatus,
    pub variant: ContractVariant,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub version: u64,
}

impl From<InvoiceRecord> for InvoiceView {
    fn from(r: InvoiceRecord) -> Self {
        Self {
            id: r.id,
            sender: r.sender,
            recipient: r.recipient,
            amount: r.amount.as_plain(),
            encrypted_amount: r.amount.as_handle().copied(),
            description: r.description,
            status: r.status,
            variant: r.variant,
            created_at: r.created_at,
            updated_at: r.updated_at,
            due_date: r.due_date,
            version: r.version,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceIdsView {
    pub account: Address,
    pub offset: usize,
    pub ids: Vec<InvoiceId>,
}

#[derive(Debug, Serialize)]
pub struct HandleView {
    pub handle: EncryptedHandle,
}

/// Parse an invoice id path segment; non-numeric ids are a 400.
pub fn parse_invoice_id(raw: &str) -> Result<InvoiceId, axum::response::Response> {
    raw.trim().parse::<u64>().map(InvoiceId::new).map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid invoice id '{raw}'"),
        )
    })
}

pub fn parse_address(raw: &str) -> Result<Address, axum::response::Response> {
    raw.parse::<Address>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid address '{raw}'"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_needs_exactly_one_amount() {
        let both: CreateInvoiceRequest = serde_json::from_value(serde_json::json!({
            "recipient": Address::repeat_byte(1),
            "amount": 5,
            "encrypted_amount": { "ciphertext": "0x01", "proof": "0x02" },
        }))
        .unwrap();
        assert_eq!(
            both.into_new_invoice().unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );

        let neither: CreateInvoiceRequest = serde_json::from_value(serde_json::json!({
            "recipient": Address::repeat_byte(1),
        }))
        .unwrap();
        assert!(neither.into_new_invoice().is_err());

        let plain: CreateInvoiceRequest = serde_json::from_value(serde_json::json!({
            "recipient": Address::repeat_byte(1),
            "description": "rent",
            "amount": 5,
        }))
        .unwrap();
        let new = plain.into_new_invoice().unwrap();
        assert_eq!(new.amount, AmountInput::Plain(5));
        assert_eq!(new.description, "rent");
    }

    #[test]
    fn invoice_ids_must_be_numeric() {
        assert_eq!(parse_invoice_id("42").unwrap(), InvoiceId(42));
        assert!(parse_invoice_id("abc").is_err());
        assert!(parse_invoice_id("-1").is_err());
    }

    #[test]
    fn page_query_defaults() {
        let page = PageQuery::default().to_page();
        assert_eq!(page, Page::default());
    }
}
