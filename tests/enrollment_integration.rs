use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use learnhub_backend::api::auth::{Claims, SessionAuth};
use learnhub_backend::api::webhooks_stripe::{sign_payload, stripe_webhook};
use learnhub_backend::models::PurchaseStatus;

mod support;

async fn seed_user(pool: &PgPool, id: &str, role: &str) {
    sqlx::query(
        r#"INSERT INTO users (id, email, name, role)
           VALUES ($1, $2, $3, $4)"#,
    )
    .bind(id)
    .bind(format!("{id}@example.com"))
    .bind(id)
    .bind(role)
    .execute(pool)
    .await
    .expect("insert user");
}

async fn seed_course(pool: &PgPool, educator_id: &str, title: &str, price: &str) -> Uuid {
    sqlx::query(
        r#"INSERT INTO courses (educator_id, title, price, discount)
           VALUES ($1, $2, $3::NUMERIC, 0)
           RETURNING id"#,
    )
    .bind(educator_id)
    .bind(title)
    .bind(price)
    .fetch_one(pool)
    .await
    .expect("insert course")
    .get("id")
}

async fn seed_purchase(
    pool: &PgPool,
    user_id: &str,
    course_id: Uuid,
    amount: &str,
    status: PurchaseStatus,
) -> Uuid {
    sqlx::query(
        r#"INSERT INTO purchases (user_id, course_id, amount, status)
           VALUES ($1, $2, $3::NUMERIC, $4)
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(amount)
    .bind(status)
    .fetch_one(pool)
    .await
    .expect("insert purchase")
    .get("id")
}

async fn purchase_status(pool: &PgPool, purchase_id: Uuid) -> String {
    sqlx::query("SELECT status::TEXT AS status FROM purchases WHERE id = $1")
        .bind(purchase_id)
        .fetch_one(pool)
        .await
        .expect("select purchase")
        .get("status")
}

async fn enrolled_students(pool: &PgPool, course_id: Uuid) -> Vec<String> {
    sqlx::query("SELECT enrolled_students FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_one(pool)
        .await
        .expect("select course")
        .get("enrolled_students")
}

fn signed_event(purchase_id: Uuid, event_type: &str) -> (Vec<u8>, String) {
    let payload = json!({
        "id": "evt_test",
        "type": event_type,
        "data": {
            "object": {
                "id": "cs_test",
                "metadata": { "purchase_id": purchase_id }
            }
        }
    });
    let body = serde_json::to_vec(&payload).expect("serialize event");
    let timestamp = Utc::now().timestamp();
    let signature = sign_payload(support::TEST_STRIPE_WEBHOOK_SECRET, timestamp, &body);
    (body, format!("t={timestamp},v1={signature}"))
}

#[actix_web::test]
async fn successful_event_enrolls_once_even_when_redelivered() {
    let Some(test_db) = support::try_init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().simple().to_string();
    let student = format!("user_{suffix}");
    let educator = format!("edu_{suffix}");

    seed_user(pool, &student, "student").await;
    seed_user(pool, &educator, "educator").await;
    let course_id = seed_course(pool, &educator, "Rust 101", "49.99").await;
    let purchase_id =
        seed_purchase(pool, &student, course_id, "49.99", PurchaseStatus::Pending).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_clerk").await);
    let app = test::init_service(App::new().app_data(state.clone()).service(stripe_webhook)).await;

    let (body, header) = signed_event(purchase_id, "checkout.session.completed");

    for round in 0..2 {
        let req = TestRequest::post()
            .uri("/stripe")
            .insert_header(("Stripe-Signature", header.clone()))
            .insert_header(("content-type", "application/json"))
            .set_payload(body.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success(), "delivery round {round}");
    }

    assert_eq!(purchase_status(pool, purchase_id).await, "completed");

    let enrolled = enrolled_students(pool, course_id).await;
    assert_eq!(enrolled, vec![student.clone()], "exactly one enrollment entry");

    let enrolled_courses: Vec<Uuid> =
        sqlx::query("SELECT enrolled_courses FROM users WHERE id = $1")
            .bind(&student)
            .fetch_one(pool)
            .await
            .expect("select user")
            .get("enrolled_courses");
    assert_eq!(enrolled_courses, vec![course_id]);
}

#[actix_web::test]
async fn invalid_signature_is_rejected_without_state_change() {
    let Some(test_db) = support::try_init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().simple().to_string();
    let student = format!("user_{suffix}");
    let educator = format!("edu_{suffix}");

    seed_user(pool, &student, "student").await;
    seed_user(pool, &educator, "educator").await;
    let course_id = seed_course(pool, &educator, "Rust 101", "49.99").await;
    let purchase_id =
        seed_purchase(pool, &student, course_id, "49.99", PurchaseStatus::Pending).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_clerk").await);
    let app = test::init_service(App::new().app_data(state.clone()).service(stripe_webhook)).await;

    let payload = json!({
        "type": "checkout.session.completed",
        "data": { "object": { "metadata": { "purchase_id": purchase_id } } }
    });
    let body = serde_json::to_vec(&payload).expect("serialize");
    let timestamp = Utc::now().timestamp();
    let forged = sign_payload("wrong-secret", timestamp, &body);

    let req = TestRequest::post()
        .uri("/stripe")
        .insert_header(("Stripe-Signature", format!("t={timestamp},v1={forged}")))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 401);
    assert_eq!(purchase_status(pool, purchase_id).await, "pending");
    assert!(enrolled_students(pool, course_id).await.is_empty());
}

#[actix_web::test]
async fn failed_event_marks_failed_and_never_reverses() {
    let Some(test_db) = support::try_init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().simple().to_string();
    let student = format!("user_{suffix}");
    let educator = format!("edu_{suffix}");

    seed_user(pool, &student, "student").await;
    seed_user(pool, &educator, "educator").await;
    let course_id = seed_course(pool, &educator, "Rust 101", "49.99").await;
    let purchase_id =
        seed_purchase(pool, &student, course_id, "49.99", PurchaseStatus::Pending).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_clerk").await);
    let app = test::init_service(App::new().app_data(state.clone()).service(stripe_webhook)).await;

    let (body, header) = signed_event(purchase_id, "checkout.session.expired");
    let req = TestRequest::post()
        .uri("/stripe")
        .insert_header(("Stripe-Signature", header))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    assert_eq!(purchase_status(pool, purchase_id).await, "failed");
    assert!(enrolled_students(pool, course_id).await.is_empty());

    // A late success event must not resurrect the purchase.
    let (body, header) = signed_event(purchase_id, "checkout.session.completed");
    let req = TestRequest::post()
        .uri("/stripe")
        .insert_header(("Stripe-Signature", header))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    assert_eq!(purchase_status(pool, purchase_id).await, "failed");
    assert!(enrolled_students(pool, course_id).await.is_empty());
}

#[actix_web::test]
async fn unknown_purchase_id_is_not_found() {
    let Some(test_db) = support::try_init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_clerk").await);
    let app = test::init_service(App::new().app_data(state.clone()).service(stripe_webhook)).await;

    let (body, header) = signed_event(Uuid::new_v4(), "checkout.session.completed");
    let req = TestRequest::post()
        .uri("/stripe")
        .insert_header(("Stripe-Signature", header))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn dashboard_totals_sum_completed_purchases_only() {
    let Some(test_db) = support::try_init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let suffix = Uuid::new_v4().simple().to_string();
    let educator = format!("edu_{suffix}");
    let buyer = format!("user_{suffix}");

    seed_user(pool, &educator, "educator").await;
    seed_user(pool, &buyer, "student").await;

    // Fixture: 3 courses, 5 purchases (3 completed, 2 pending).
    let c1 = seed_course(pool, &educator, "Course one", "19.99").await;
    let c2 = seed_course(pool, &educator, "Course two", "49.50").await;
    let c3 = seed_course(pool, &educator, "Course three", "10.00").await;

    seed_purchase(pool, &buyer, c1, "19.99", PurchaseStatus::Completed).await;
    seed_purchase(pool, &buyer, c1, "19.99", PurchaseStatus::Pending).await;
    seed_purchase(pool, &buyer, c2, "49.50", PurchaseStatus::Completed).await;
    seed_purchase(pool, &buyer, c3, "10.00", PurchaseStatus::Completed).await;
    seed_purchase(pool, &buyer, c3, "10.00", PurchaseStatus::Pending).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_clerk").await);
    let app = test::init_service(
        App::new().app_data(state.clone()).service(
            web::scope("/api/educator")
                .wrap(SessionAuth::new(support::TEST_SESSION_SECRET))
                .service(learnhub_backend::api::educator::dashboard),
        ),
    )
    .await;

    let claims = Claims {
        sub: educator.clone(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(support::TEST_SESSION_SECRET.as_bytes()),
    )
    .expect("mint token");

    let req = TestRequest::get()
        .uri("/api/educator/dashboard")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["dashboard"]["total_courses"], json!(3));
    assert_eq!(body["dashboard"]["total_earnings"], json!("79.49"));
}
