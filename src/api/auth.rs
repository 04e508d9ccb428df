// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::db;
use crate::error::ApiError;

/// Claims of the identity provider's session token. `sub` is the
/// provider-issued user id; the token is signed with a shared secret.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Newtype for the authenticated subject id injected into request
/// extensions, so handlers extract it as `web::ReqData<AuthedUser>`.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub String);

/// Middleware that:
/// - takes `Authorization: Bearer <jwt>`
/// - validates the session token against the shared secret
/// - puts [`AuthedUser`] into `req.extensions_mut()`
pub struct SessionAuth {
    secret: Rc<String>,
}

impl SessionAuth {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Rc::new(secret.into()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionAuthInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionAuthInner {
            service,
            secret: Rc::clone(&self.secret),
        }))
    }
}

pub struct SessionAuthInner<S> {
    service: S,
    secret: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for SessionAuthInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let auth_header = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");

        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            match decode::<Claims>(
                token,
                &DecodingKey::from_secret(self.secret.as_bytes()),
                &Validation::default(),
            ) {
                Ok(token_data) => {
                    req.extensions_mut()
                        .insert(AuthedUser(token_data.claims.sub));
                    let fut = self.service.call(req);
                    return Box::pin(async move { fut.await });
                }
                Err(_) => {
                    return Box::pin(async move {
                        Err(ApiError::Auth("invalid session token".to_string()).into())
                    })
                }
            }
        }

        Box::pin(async move {
            Err(ApiError::Auth("missing or invalid Authorization header".to_string()).into())
        })
    }
}

/// Educator-only endpoints check the registry's role flag; the session
/// token carries identity, not authorization.
pub async fn require_educator(pool: &PgPool, user_id: &str) -> Result<(), ApiError> {
    let user = db::find_user(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    if user.role != "educator" {
        return Err(ApiError::Forbidden(
            "educator role required".to_string(),
        ));
    }

    Ok(())
}
