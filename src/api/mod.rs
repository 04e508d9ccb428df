pub mod auth;
pub mod course;
pub mod educator;
pub mod stripe_client;
pub mod user;
pub mod webhooks_clerk;
pub mod webhooks_stripe;
