use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::course::list_courses,
        crate::api::course::get_course,
        crate::api::user::get_user_data,
        crate::api::user::purchase_course,
        crate::api::user::enrolled_courses,
        crate::api::user::update_course_progress,
        crate::api::user::get_course_progress,
        crate::api::user::add_rating,
        crate::api::educator::update_role,
        crate::api::educator::add_course,
        crate::api::educator::educator_courses,
        crate::api::educator::dashboard,
        crate::api::educator::enrolled_students,
        crate::api::webhooks_stripe::stripe_webhook,
        crate::api::webhooks_clerk::clerk_webhook
    ),
    components(
        schemas(
            crate::models::Course,
            crate::models::CourseSummary,
            crate::models::Chapter,
            crate::models::Lecture,
            crate::models::Rating,
            crate::models::User,
            crate::models::Purchase,
            crate::models::PurchaseStatus,
            crate::models::CourseProgress,
            crate::models::EnrolledStudent,
            crate::api::user::PurchaseRequest,
            crate::api::user::ProgressUpdateRequest,
            crate::api::user::ProgressQueryRequest,
            crate::api::user::RatingRequest,
            crate::api::educator::NewCourse,
            crate::api::educator::DashboardData,
            crate::api::webhooks_stripe::StripeEvent,
            crate::api::webhooks_stripe::EventData,
            crate::api::webhooks_stripe::EventObject,
            crate::api::webhooks_stripe::EventMetadata,
            crate::api::webhooks_clerk::ClerkEvent,
            crate::api::webhooks_clerk::ClerkUserData,
            crate::api::webhooks_clerk::ClerkEmail
        )
    ),
    tags(
        (name = "courses", description = "Public course catalog"),
        (name = "users", description = "Student profile, checkout and progress"),
        (name = "educators", description = "Course authoring and dashboard"),
        (name = "webhooks", description = "Payment processor and identity provider callbacks")
    )
)]
pub struct ApiDoc;
