// src/api/educator.rs

use actix_multipart::Multipart;
use actix_web::{get, post, web, HttpResponse};
use aws_sdk_s3::primitives::ByteStream;
use futures_util::StreamExt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::{require_educator, AuthedUser};
use crate::error::ApiError;
use crate::models::{Chapter, EnrolledStudent, Purchase, PurchaseStatus};
use crate::{db, s3_utils, AppState};

#[utoipa::path(
    get,
    path = "/api/educator/update-role",
    tag = "educators",
    responses((status = 200, description = "Caller upgraded to educator"))
)]
#[get("/update-role")]
pub async fn update_role(
    user: web::ReqData<AuthedUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let updated = db::set_user_role(&state.pool, &user.0, "educator").await?;
    if !updated {
        return Err(ApiError::NotFound("user not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "you can publish a course now",
    })))
}

/// Course payload carried in the `courseData` multipart part. Decoding
/// fails closed: unknown fields and shape mismatches are rejected.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount: i32,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl NewCourse {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.title.trim().is_empty() {
            return Err(ApiError::Validation("course title is required".to_string()));
        }
        if self.price.is_sign_negative() {
            return Err(ApiError::Validation(
                "price must not be negative".to_string(),
            ));
        }
        if !(0..=100).contains(&self.discount) {
            return Err(ApiError::Validation(
                "discount must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }
}

#[utoipa::path(
    post,
    path = "/api/educator/add-course",
    tag = "educators",
    responses(
        (status = 200, description = "Course created, thumbnail stored"),
        (status = 400, description = "Missing thumbnail or invalid course data"),
        (status = 403, description = "Caller is not an educator")
    )
)]
#[post("/add-course")]
pub async fn add_course(
    mut payload: Multipart,
    user: web::ReqData<AuthedUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    require_educator(&state.pool, &user.0).await?;

    let mut course_json: Option<String> = None;
    let mut image_bytes: Vec<u8> = Vec::new();
    let mut image_content_type = String::new();

    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(f) => f,
            Err(_) => continue,
        };

        let name = field.content_disposition().get_name().map(str::to_owned);
        let content_type = field.content_type().map(|m| m.to_string());

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            if let Ok(data) = chunk {
                bytes.extend_from_slice(&data);
            }
        }

        match name.as_deref() {
            Some("courseData") => {
                course_json = Some(String::from_utf8_lossy(&bytes).into_owned());
            }
            Some("image") => {
                image_bytes = bytes;
                image_content_type =
                    content_type.unwrap_or_else(|| "application/octet-stream".to_string());
            }
            _ => {}
        }
    }

    let course_json = course_json
        .ok_or_else(|| ApiError::Validation("courseData part is required".to_string()))?;
    if image_bytes.is_empty() {
        return Err(ApiError::Validation("thumbnail not attached".to_string()));
    }

    let new_course: NewCourse = serde_json::from_str(&course_json)
        .map_err(|e| ApiError::Validation(format!("invalid course data: {e}")))?;
    new_course.validate()?;

    let course_id = db::insert_course(
        &state.pool,
        &user.0,
        &new_course.title,
        &new_course.description,
        new_course.price,
        new_course.discount,
        &new_course.chapters,
    )
    .await?;

    let key = s3_utils::thumbnail_key(course_id, &image_content_type);
    state
        .s3_client
        .put_object()
        .bucket(&state.s3_bucket)
        .key(&key)
        .content_type(&image_content_type)
        .body(ByteStream::from(image_bytes))
        .send()
        .await
        .map_err(|e| {
            log::error!("thumbnail upload failed for course {course_id}: {e}");
            ApiError::Upstream("thumbnail upload failed".to_string())
        })?;

    let thumbnail_url = s3_utils::build_public_url(&state.s3_public_base_url, &state.s3_bucket, &key);
    db::set_course_thumbnail(&state.pool, course_id, &thumbnail_url).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "course_id": course_id,
        "message": "course added",
    })))
}

#[utoipa::path(
    get,
    path = "/api/educator/courses",
    tag = "educators",
    responses((status = 200, description = "Courses owned by the caller"))
)]
#[get("/courses")]
pub async fn educator_courses(
    user: web::ReqData<AuthedUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    require_educator(&state.pool, &user.0).await?;
    let courses = db::list_courses_by_educator(&state.pool, &user.0).await?;

    Ok(HttpResponse::Ok().json(json!({"success": true, "courses": courses})))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardData {
    pub total_earnings: Decimal,
    pub total_courses: i64,
    pub enrolled_students_data: Vec<EnrolledStudent>,
}

/// Earnings are the sum of completed purchases only; pending and failed
/// checkouts never count.
pub fn total_earnings(purchases: &[Purchase]) -> Decimal {
    purchases
        .iter()
        .filter(|p| p.status == PurchaseStatus::Completed)
        .map(|p| p.amount)
        .sum()
}

#[utoipa::path(
    get,
    path = "/api/educator/dashboard",
    tag = "educators",
    responses((status = 200, description = "Earnings, course count and enrolled students"))
)]
#[get("/dashboard")]
pub async fn dashboard(
    user: web::ReqData<AuthedUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    require_educator(&state.pool, &user.0).await?;

    let courses = db::list_courses_by_educator(&state.pool, &user.0).await?;
    let course_ids: Vec<Uuid> = courses.iter().map(|c| c.id).collect();
    let purchases = db::list_completed_for_courses(&state.pool, &course_ids).await?;
    let enrolled_students_data = db::enrolled_students_of_educator(&state.pool, &user.0).await?;

    let data = DashboardData {
        total_earnings: total_earnings(&purchases),
        total_courses: courses.len() as i64,
        enrolled_students_data,
    };

    Ok(HttpResponse::Ok().json(json!({"success": true, "dashboard": data})))
}

#[utoipa::path(
    get,
    path = "/api/educator/enrolled-students",
    tag = "educators",
    responses((status = 200, description = "Students with completed purchases and dates"))
)]
#[get("/enrolled-students")]
pub async fn enrolled_students(
    user: web::ReqData<AuthedUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    require_educator(&state.pool, &user.0).await?;
    let students = db::completed_purchase_students(&state.pool, &user.0).await?;

    Ok(HttpResponse::Ok().json(json!({"success": true, "enrolled_students": students})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn purchase(course_id: Uuid, amount: &str, status: PurchaseStatus) -> Purchase {
        Purchase {
            id: Uuid::new_v4(),
            user_id: "user_1".to_string(),
            course_id,
            amount: amount.parse().expect("decimal"),
            status,
            created_at: Some(Utc::now()),
        }
    }

    #[test]
    fn dashboard_totals_count_only_completed_purchases() {
        // 3 courses, 5 purchases: 3 completed, 2 pending
        let (c1, c2, c3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let purchases = vec![
            purchase(c1, "19.99", PurchaseStatus::Completed),
            purchase(c1, "19.99", PurchaseStatus::Pending),
            purchase(c2, "49.50", PurchaseStatus::Completed),
            purchase(c3, "10.00", PurchaseStatus::Completed),
            purchase(c3, "10.00", PurchaseStatus::Pending),
        ];

        assert_eq!(total_earnings(&purchases).to_string(), "79.49");
    }

    #[test]
    fn total_earnings_empty_ledger_is_zero() {
        assert_eq!(total_earnings(&[]), Decimal::ZERO);
    }

    #[test]
    fn new_course_validation_bounds() {
        let course = NewCourse {
            title: "Rust for educators".to_string(),
            description: String::new(),
            price: "49.99".parse().expect("decimal"),
            discount: 101,
            chapters: Vec::new(),
        };
        assert!(course.validate().is_err());

        let course = NewCourse {
            title: "  ".to_string(),
            description: String::new(),
            price: "49.99".parse().expect("decimal"),
            discount: 0,
            chapters: Vec::new(),
        };
        assert!(course.validate().is_err());
    }

    #[test]
    fn new_course_rejects_unknown_fields() {
        let raw = r#"{"title": "T", "price": "10.00", "publish_immediately": true}"#;
        assert!(serde_json::from_str::<NewCourse>(raw).is_err());
    }
}
