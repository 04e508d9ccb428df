// src/api/webhooks_clerk.rs
//
// Identity-provider user-lifecycle webhook. The registry mirrors provider
// state; these events are the only writer of profile fields.

use actix_web::{post, web, HttpRequest, HttpResponse};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use utoipa::ToSchema;

use crate::api::webhooks_stripe::{SignatureError, SIGNATURE_TOLERANCE_SECS};
use crate::error::ApiError;
use crate::{db, AppState};

/// Verify a svix-style signature: base64 HMAC-SHA256 over
/// `"{msg_id}.{timestamp}.{body}"`, keyed with the decoded `whsec_`
/// secret. The header may list several space-separated `v1,<sig>`
/// candidates during secret rotation.
pub fn verify_svix_signature(
    secret: &str,
    msg_id: &str,
    timestamp: &str,
    signature_header: &str,
    body: &[u8],
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let ts: i64 = timestamp.parse().map_err(|_| SignatureError::Malformed)?;
    if (now - ts).abs() > tolerance_secs {
        return Err(SignatureError::Stale);
    }

    let key = BASE64
        .decode(secret.trim_start_matches("whsec_"))
        .map_err(|_| SignatureError::Malformed)?;

    for candidate in signature_header.split_whitespace() {
        let Some(sig) = candidate.strip_prefix("v1,") else {
            continue;
        };
        let Ok(sig_bytes) = BASE64.decode(sig) else {
            continue;
        };
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&key).map_err(|_| SignatureError::Malformed)?;
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        if mac.verify_slice(&sig_bytes).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

/// Counterpart of [`verify_svix_signature`] for tests and local tooling.
pub fn sign_svix_payload(secret: &str, msg_id: &str, timestamp: &str, body: &[u8]) -> String {
    let key = BASE64
        .decode(secret.trim_start_matches("whsec_"))
        .unwrap_or_default();
    let mut mac = Hmac::<Sha256>::new_from_slice(&key).expect("HMAC accepts any key size");
    mac.update(msg_id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    format!("v1,{}", BASE64.encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClerkEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: ClerkUserData,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClerkUserData {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<ClerkEmail>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClerkEmail {
    pub email_address: String,
}

impl ClerkUserData {
    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        let name = format!("{first} {last}");
        name.trim().to_string()
    }

    pub fn primary_email(&self) -> &str {
        self.email_addresses
            .first()
            .map(|e| e.email_address.as_str())
            .unwrap_or("")
    }
}

fn svix_header<'a>(req: &'a HttpRequest, name: &str) -> Result<&'a str, ApiError> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Auth(format!("missing {name} header")))
}

#[utoipa::path(
    post,
    path = "/clerk",
    tag = "webhooks",
    request_body = ClerkEvent,
    responses(
        (status = 200, description = "Registry updated or event ignored"),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Signature rejected")
    )
)]
#[post("/clerk")]
pub async fn clerk_webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let msg_id = svix_header(&req, "svix-id")?;
    let timestamp = svix_header(&req, "svix-timestamp")?;
    let signature = svix_header(&req, "svix-signature")?;

    verify_svix_signature(
        &state.clerk_webhook_secret,
        msg_id,
        timestamp,
        signature,
        &body,
        Utc::now().timestamp(),
        SIGNATURE_TOLERANCE_SECS,
    )
    .map_err(|e| ApiError::Auth(format!("webhook signature rejected: {e}")))?;

    let event: ClerkEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("malformed event payload: {e}")))?;

    match event.event_type.as_str() {
        "user.created" | "user.updated" => {
            db::upsert_user(
                &state.pool,
                &event.data.id,
                event.data.primary_email(),
                &event.data.display_name(),
                event.data.image_url.as_deref().unwrap_or(""),
            )
            .await?;
            log::info!("identity event {} applied for {}", event.event_type, event.data.id);
        }
        "user.deleted" => {
            db::delete_user(&state.pool, &event.data.id).await?;
            log::info!("user {} removed from registry", event.data.id);
        }
        other => {
            log::debug!("ignoring identity event type {other}");
        }
    }

    Ok(HttpResponse::Ok().json(json!({"success": true})))
}
