// src/main.rs
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::Client as S3Client;
use dotenvy::dotenv;
use sqlx::PgPool;
use std::env;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use learnhub_backend::api::auth::SessionAuth;
use learnhub_backend::{api, docs, AppState};

async fn index() -> impl Responder {
    HttpResponse::Ok().body("API working")
}

fn build_cors(allowed_origins: &[String]) -> Cors {
    let base = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE]);

    // actix-cors rejects any-origin combined with credentials, so the
    // wildcard configuration stays credential-less.
    if allowed_origins.iter().any(|o| o == "*") {
        return base.allow_any_origin();
    }

    let mut cors = base.supports_credentials();
    for origin in allowed_origins {
        cors = cors.allowed_origin(origin);
    }
    cors
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let s3_bucket = env::var("S3_BUCKET").expect("S3_BUCKET required");
    let s3_endpoint = env::var("S3_ENDPOINT").ok();
    let s3_public_base_url = env::var("S3_PUBLIC_BASE_URL")
        .unwrap_or_else(|_| format!("https://{}.s3.amazonaws.com", s3_bucket));

    let stripe_secret_key = env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY required");
    let stripe_webhook_secret =
        env::var("STRIPE_WEBHOOK_SECRET").expect("STRIPE_WEBHOOK_SECRET required");
    let stripe_api_base = env::var("STRIPE_API_BASE_URL")
        .unwrap_or_else(|_| api::stripe_client::STRIPE_API_BASE.to_string());
    let clerk_webhook_secret =
        env::var("CLERK_WEBHOOK_SECRET").expect("CLERK_WEBHOOK_SECRET required");
    let session_jwt_secret = env::var("SESSION_JWT_SECRET").expect("SESSION_JWT_SECRET required");
    let currency = env::var("CURRENCY").unwrap_or_else(|_| "USD".to_string());
    let allowed_origins: Vec<String> = env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "*".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await;
    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);

    // Allow custom S3-compatible endpoints (e.g. MinIO)
    if let Some(endpoint) = s3_endpoint {
        s3_config_builder = s3_config_builder
            .endpoint_url(endpoint)
            .force_path_style(true);
    }

    let s3_client = S3Client::from_conf(s3_config_builder.build());

    let state = web::Data::new(AppState {
        pool,
        s3_client,
        s3_bucket,
        s3_public_base_url,
        stripe_api_base,
        stripe_secret_key,
        stripe_webhook_secret,
        clerk_webhook_secret,
        session_jwt_secret: session_jwt_secret.clone(),
        currency,
    });

    log::info!("starting server on {bind_addr}");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(build_cors(&allowed_origins))
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            // Webhooks are public; each verifies its own signature.
            .service(api::webhooks_clerk::clerk_webhook)
            .service(api::webhooks_stripe::stripe_webhook)
            // Public catalog
            .service(
                web::scope("/api/course")
                    .service(api::course::list_courses)
                    .service(api::course::get_course),
            )
            // Session-guarded routes
            .service(
                web::scope("/api/user")
                    .wrap(SessionAuth::new(session_jwt_secret.clone()))
                    .service(api::user::get_user_data)
                    .service(api::user::purchase_course)
                    .service(api::user::enrolled_courses)
                    .service(api::user::update_course_progress)
                    .service(api::user::get_course_progress)
                    .service(api::user::add_rating),
            )
            .service(
                web::scope("/api/educator")
                    .wrap(SessionAuth::new(session_jwt_secret.clone()))
                    .service(api::educator::update_role)
                    .service(api::educator::add_course)
                    .service(api::educator::educator_courses)
                    .service(api::educator::dashboard)
                    .service(api::educator::enrolled_students),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
