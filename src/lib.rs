pub mod api;
pub mod client;
pub mod db;
pub mod docs;
pub mod error;
pub mod models;
pub mod s3_utils;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub s3_client: S3Client,
    pub s3_bucket: String,
    pub s3_public_base_url: String,
    pub stripe_api_base: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub clerk_webhook_secret: String,
    pub session_jwt_secret: String,
    pub currency: String,
}
