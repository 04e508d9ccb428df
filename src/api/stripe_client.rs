// src/api/stripe_client.rs
//
// Minimal client for the payment processor's checkout API.
// Authorization: bearer secret key; bodies are form-encoded.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use uuid::Uuid;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug)]
pub enum StripeError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    InvalidResponse(String),
}

impl fmt::Display for StripeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StripeError::Http(e) => write!(f, "http error: {e}"),
            StripeError::Api { status, body } => {
                write!(f, "stripe api error status={status} body={body}")
            }
            StripeError::InvalidResponse(e) => write!(f, "invalid response: {e}"),
        }
    }
}

impl From<reqwest::Error> for StripeError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

#[derive(Debug)]
pub struct CreateCheckoutSession {
    pub amount: Decimal,
    pub currency: String,
    pub course_title: String,
    pub purchase_id: Uuid,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page the buyer is redirected to.
    pub url: Option<String>,
}

/// The processor wants amounts in minor units (cents). Conversion happens
/// here at the boundary; everywhere else money stays an exact decimal.
pub fn amount_minor_units(amount: Decimal) -> i64 {
    (amount * Decimal::ONE_HUNDRED).round().to_i64().unwrap_or(0)
}

/// Create a hosted checkout session. The ledger id rides along in the
/// session metadata and comes back in the completion webhook.
pub async fn create_checkout_session(
    api_base: &str,
    secret_key: &str,
    req: CreateCheckoutSession,
) -> Result<CheckoutSession, StripeError> {
    let client = reqwest::Client::new();

    let params = [
        ("mode", "payment".to_string()),
        ("success_url", req.success_url),
        ("cancel_url", req.cancel_url),
        ("line_items[0][quantity]", "1".to_string()),
        (
            "line_items[0][price_data][currency]",
            req.currency.to_lowercase(),
        ),
        (
            "line_items[0][price_data][unit_amount]",
            amount_minor_units(req.amount).to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            req.course_title,
        ),
        ("metadata[purchase_id]", req.purchase_id.to_string()),
    ];

    let resp = client
        .post(format!("{api_base}/v1/checkout/sessions"))
        .bearer_auth(secret_key)
        .form(&params)
        .send()
        .await?;

    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(StripeError::Api {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str::<CheckoutSession>(&body)
        .map_err(|e| StripeError::InvalidResponse(format!("{e}; body={body}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_units_from_decimal() {
        assert_eq!(amount_minor_units("49.99".parse().unwrap()), 4999);
        assert_eq!(amount_minor_units("0.00".parse().unwrap()), 0);
        assert_eq!(amount_minor_units("100".parse().unwrap()), 10000);
    }
}
