// src/api/user.rs

use actix_web::http::header;
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::AuthedUser;
use crate::api::stripe_client::{self, CreateCheckoutSession};
use crate::error::ApiError;
use crate::models::Rating;
use crate::{db, AppState};

#[utoipa::path(
    get,
    path = "/api/user/data",
    tag = "users",
    responses((status = 200, description = "Own registry profile"))
)]
#[get("/data")]
pub async fn get_user_data(
    user: web::ReqData<AuthedUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let profile = db::find_user(&state.pool, &user.0)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({"success": true, "user": profile})))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PurchaseRequest {
    pub course_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/user/purchase",
    tag = "users",
    request_body = PurchaseRequest,
    responses(
        (status = 200, description = "Pending purchase created, checkout URL returned"),
        (status = 400, description = "Already enrolled or invalid course"),
        (status = 502, description = "Payment processor unavailable")
    )
)]
#[post("/purchase")]
pub async fn purchase_course(
    req: HttpRequest,
    user: web::ReqData<AuthedUser>,
    payload: web::Json<PurchaseRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Validation("missing Origin header".to_string()))?
        .to_string();

    let profile = db::find_user(&state.pool, &user.0)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    let course = db::find_course(&state.pool, payload.course_id)
        .await?
        .filter(|c| c.is_published)
        .ok_or_else(|| ApiError::NotFound("course not found".to_string()))?;

    if profile.enrolled_courses.contains(&course.id) {
        return Err(ApiError::Validation("already enrolled".to_string()));
    }

    let amount = course.discounted_price();
    let purchase_id = db::create_purchase(&state.pool, &profile.id, course.id, amount).await?;

    let session = stripe_client::create_checkout_session(
        &state.stripe_api_base,
        &state.stripe_secret_key,
        CreateCheckoutSession {
            amount,
            currency: state.currency.clone(),
            course_title: course.title.clone(),
            purchase_id,
            success_url: format!("{origin}/loading/my-enrollments"),
            cancel_url: format!("{origin}/"),
        },
    )
    .await
    .map_err(|e| {
        log::error!("checkout session create failed for purchase {purchase_id}: {e}");
        ApiError::Upstream("checkout session create failed".to_string())
    })?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "purchase_id": purchase_id,
        "session_url": session.url,
    })))
}

#[utoipa::path(
    get,
    path = "/api/user/enrolled-courses",
    tag = "users",
    responses((status = 200, description = "Enrolled courses with full content"))
)]
#[get("/enrolled-courses")]
pub async fn enrolled_courses(
    user: web::ReqData<AuthedUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let profile = db::find_user(&state.pool, &user.0)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    let courses = db::list_courses_by_ids(&state.pool, &profile.enrolled_courses).await?;

    Ok(HttpResponse::Ok().json(json!({"success": true, "courses": courses})))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProgressUpdateRequest {
    pub course_id: Uuid,
    pub lecture_id: String,
}

#[utoipa::path(
    post,
    path = "/api/user/update-course-progress",
    tag = "users",
    request_body = ProgressUpdateRequest,
    responses((status = 200, description = "Lecture recorded as completed"))
)]
#[post("/update-course-progress")]
pub async fn update_course_progress(
    user: web::ReqData<AuthedUser>,
    payload: web::Json<ProgressUpdateRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    if payload.lecture_id.trim().is_empty() {
        return Err(ApiError::Validation("lecture id is required".to_string()));
    }

    db::record_lecture_completed(&state.pool, &user.0, payload.course_id, &payload.lecture_id)
        .await?;

    Ok(HttpResponse::Ok().json(json!({"success": true, "message": "progress recorded"})))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProgressQueryRequest {
    pub course_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/user/get-course-progress",
    tag = "users",
    request_body = ProgressQueryRequest,
    responses((status = 200, description = "Progress for the course, null when untouched"))
)]
#[post("/get-course-progress")]
pub async fn get_course_progress(
    user: web::ReqData<AuthedUser>,
    payload: web::Json<ProgressQueryRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let progress = db::get_progress(&state.pool, &user.0, payload.course_id).await?;

    Ok(HttpResponse::Ok().json(json!({"success": true, "progress": progress})))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RatingRequest {
    pub course_id: Uuid,
    pub rating: i32,
}

#[utoipa::path(
    post,
    path = "/api/user/add-rating",
    tag = "users",
    request_body = RatingRequest,
    responses(
        (status = 200, description = "Rating stored, one entry per user"),
        (status = 400, description = "Rating outside 1..=5"),
        (status = 403, description = "Not enrolled in the course")
    )
)]
#[post("/add-rating")]
pub async fn add_rating(
    user: web::ReqData<AuthedUser>,
    payload: web::Json<RatingRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    if !(1..=5).contains(&payload.rating) {
        return Err(ApiError::Validation(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    let course = db::find_course(&state.pool, payload.course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("course not found".to_string()))?;

    let profile = db::find_user(&state.pool, &user.0)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    if !profile.enrolled_courses.contains(&course.id) {
        return Err(ApiError::Forbidden(
            "course must be purchased before rating".to_string(),
        ));
    }

    // One rating per user; re-rating replaces the previous entry.
    let mut ratings: Vec<Rating> = course
        .ratings
        .into_iter()
        .filter(|r| r.user_id != profile.id)
        .collect();
    ratings.push(Rating {
        user_id: profile.id.clone(),
        rating: payload.rating,
    });

    db::set_course_ratings(&state.pool, course.id, &ratings).await?;

    Ok(HttpResponse::Ok().json(json!({"success": true, "message": "rating saved"})))
}
