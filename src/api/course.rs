// src/api/course.rs

use actix_web::{get, web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::{db, AppState};

#[utoipa::path(
    get,
    path = "/api/course/all",
    tag = "courses",
    responses((status = 200, description = "Published courses, content stripped"))
)]
#[get("/all")]
pub async fn list_courses(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let courses = db::list_published_summaries(&state.pool).await?;
    Ok(HttpResponse::Ok().json(json!({"success": true, "courses": courses})))
}

#[utoipa::path(
    get,
    path = "/api/course/{id}",
    tag = "courses",
    responses(
        (status = 200, description = "Course with locked lecture URLs blanked"),
        (status = 404, description = "Unknown course")
    )
)]
#[get("/{id}")]
pub async fn get_course(
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let course_id = path.into_inner();
    let mut course = db::find_course(&state.pool, course_id)
        .await?
        .filter(|c| c.is_published)
        .ok_or_else(|| ApiError::NotFound("course not found".to_string()))?;

    course.redact_locked_lectures();

    Ok(HttpResponse::Ok().json(json!({"success": true, "course": course})))
}
