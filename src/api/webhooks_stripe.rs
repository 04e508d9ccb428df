// src/api/webhooks_stripe.rs
//
// Payment-processor webhook: the purchase-and-enrollment state machine.
// The processor signs the raw body; verification happens before any parse
// or storage access, and a rejected signature changes no state.

use actix_web::{post, web, HttpRequest, HttpResponse};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::{db, AppState};

/// Events older (or newer) than this window are rejected as replays.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, PartialEq, Eq)]
pub enum SignatureError {
    Malformed,
    Stale,
    Mismatch,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::Malformed => write!(f, "malformed signature header"),
            SignatureError::Stale => write!(f, "timestamp outside tolerance"),
            SignatureError::Mismatch => write!(f, "signature mismatch"),
        }
    }
}

/// `Stripe-Signature: t=<unix>,v1=<hex hmac>[,v1=...]`. Multiple `v1`
/// entries appear during signing-secret rotation.
pub fn parse_signature_header(header: &str) -> Option<(i64, Vec<&str>)> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp?;
    if signatures.is_empty() {
        return None;
    }
    Some((timestamp, signatures))
}

/// Hex HMAC-SHA256 over `"{timestamp}.{body}"`, the processor's signing
/// scheme. Exposed so tests and local tooling can build valid headers.
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_signature(
    secret: &str,
    header: &str,
    body: &[u8],
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let (timestamp, candidates) =
        parse_signature_header(header).ok_or(SignatureError::Malformed)?;

    if (now - timestamp).abs() > tolerance_secs {
        return Err(SignatureError::Stale);
    }

    for candidate in candidates {
        let Ok(candidate_bytes) = hex::decode(candidate) else {
            continue;
        };
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|_| SignatureError::Malformed)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        // verify_slice is constant-time
        if mac.verify_slice(&candidate_bytes).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StripeEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EventData {
    pub object: EventObject,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EventObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: EventMetadata,
}

/// Checkout sessions are created with the ledger id in their metadata, so
/// completion events come back carrying it.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct EventMetadata {
    #[serde(default)]
    pub purchase_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

pub fn payment_outcome(event_type: &str) -> Option<PaymentOutcome> {
    match event_type {
        "checkout.session.completed" => Some(PaymentOutcome::Succeeded),
        "checkout.session.expired" | "checkout.session.async_payment_failed" => {
            Some(PaymentOutcome::Failed)
        }
        _ => None,
    }
}

#[utoipa::path(
    post,
    path = "/stripe",
    tag = "webhooks",
    request_body = StripeEvent,
    responses(
        (status = 200, description = "Event applied, replayed or ignored"),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Signature rejected"),
        (status = 404, description = "Unknown purchase id")
    )
)]
#[post("/stripe")]
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let header = req
        .headers()
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Auth("missing Stripe-Signature header".to_string()))?;

    verify_signature(
        &state.stripe_webhook_secret,
        header,
        &body,
        Utc::now().timestamp(),
        SIGNATURE_TOLERANCE_SECS,
    )
    .map_err(|e| ApiError::Auth(format!("webhook signature rejected: {e}")))?;

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("malformed event payload: {e}")))?;

    let Some(outcome) = payment_outcome(&event.event_type) else {
        // Unhandled event types are acked so the processor stops resending.
        return Ok(HttpResponse::Ok().json(json!({"success": true, "ignored": true})));
    };

    let purchase_id = event
        .data
        .object
        .metadata
        .purchase_id
        .as_deref()
        .ok_or_else(|| ApiError::Validation("event carries no purchase id".to_string()))?;
    let purchase_id = Uuid::parse_str(purchase_id)
        .map_err(|_| ApiError::Validation("malformed purchase id".to_string()))?;

    // Redelivery of this event is the processor's responsibility; an
    // unknown id gets a not-found and nothing else happens.
    let purchase = db::find_purchase(&state.pool, purchase_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("purchase not found".to_string()))?;

    if db::is_final(purchase.status) {
        return Ok(HttpResponse::Ok().json(json!({"success": true, "idempotent": true})));
    }

    match outcome {
        PaymentOutcome::Succeeded => {
            let applied = db::complete_purchase_and_enroll(&state.pool, &purchase).await?;
            log::info!(
                "purchase {} completed, user {} enrolled in {} (applied={applied})",
                purchase.id,
                purchase.user_id,
                purchase.course_id
            );
            Ok(HttpResponse::Ok().json(json!({"success": true, "applied": applied})))
        }
        PaymentOutcome::Failed => {
            let applied = db::fail_purchase(&state.pool, purchase.id).await?;
            log::info!("purchase {} marked failed (applied={applied})", purchase.id);
            Ok(HttpResponse::Ok().json(json!({"success": true, "applied": applied})))
        }
    }
}
