// src/db.rs
//
// Thin persistence wrappers over the catalog, registry and ledger tables.
// All queries are runtime queries so the build does not depend on a live
// database. No retries here; storage failures surface to the caller.

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    Chapter, Course, CourseProgress, CourseSummary, EnrolledStudent, Purchase, PurchaseStatus,
    Rating, User,
};

fn map_course(row: &PgRow) -> Result<Course, sqlx::Error> {
    Ok(Course {
        id: row.try_get("id")?,
        educator_id: row.try_get("educator_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        price: row.try_get("price")?,
        discount: row.try_get("discount")?,
        is_published: row.try_get("is_published")?,
        chapters: row.try_get::<Json<Vec<Chapter>>, _>("chapters")?.0,
        ratings: row.try_get::<Json<Vec<Rating>>, _>("ratings")?.0,
        enrolled_students: row.try_get("enrolled_students")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_user(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        image_url: row.try_get("image_url")?,
        role: row.try_get("role")?,
        enrolled_courses: row.try_get("enrolled_courses")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_purchase(row: &PgRow) -> Result<Purchase, sqlx::Error> {
    Ok(Purchase {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        course_id: row.try_get("course_id")?,
        amount: row.try_get("amount")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
    })
}

// ---- course catalog ----

pub async fn insert_course(
    pool: &PgPool,
    educator_id: &str,
    title: &str,
    description: &str,
    price: Decimal,
    discount: i32,
    chapters: &[Chapter],
) -> Result<Uuid, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO courses (educator_id, title, description, price, discount, chapters)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id"#,
    )
    .bind(educator_id)
    .bind(title)
    .bind(description)
    .bind(price)
    .bind(discount)
    .bind(Json(chapters))
    .fetch_one(pool)
    .await?;

    row.try_get("id")
}

pub async fn set_course_thumbnail(
    pool: &PgPool,
    course_id: Uuid,
    thumbnail_url: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE courses SET thumbnail_url = $1, updated_at = NOW() WHERE id = $2")
        .bind(thumbnail_url)
        .bind(course_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn find_course(pool: &PgPool, course_id: Uuid) -> Result<Option<Course>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, educator_id, title, description, thumbnail_url, price, discount,
                  is_published, chapters, ratings, enrolled_students, created_at, updated_at
           FROM courses
           WHERE id = $1"#,
    )
    .bind(course_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_course).transpose()
}

/// Catalog listing: published courses joined to their educator, without
/// lecture content or the enrolled-student list.
pub async fn list_published_summaries(pool: &PgPool) -> Result<Vec<CourseSummary>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT c.id, c.educator_id, u.name AS educator_name, c.title, c.description,
                  c.thumbnail_url, c.price, c.discount, c.ratings,
                  CARDINALITY(c.enrolled_students)::BIGINT AS enrolled_count
           FROM courses c
           JOIN users u ON u.id = c.educator_id
           WHERE c.is_published = TRUE
           ORDER BY c.created_at DESC"#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| {
            Ok(CourseSummary {
                id: r.try_get("id")?,
                educator_id: r.try_get("educator_id")?,
                educator_name: r.try_get("educator_name")?,
                title: r.try_get("title")?,
                description: r.try_get("description")?,
                thumbnail_url: r.try_get("thumbnail_url")?,
                price: r.try_get("price")?,
                discount: r.try_get("discount")?,
                ratings: r.try_get::<Json<Vec<Rating>>, _>("ratings")?.0,
                enrolled_count: r.try_get("enrolled_count")?,
            })
        })
        .collect()
}

pub async fn list_courses_by_educator(
    pool: &PgPool,
    educator_id: &str,
) -> Result<Vec<Course>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, educator_id, title, description, thumbnail_url, price, discount,
                  is_published, chapters, ratings, enrolled_students, created_at, updated_at
           FROM courses
           WHERE educator_id = $1
           ORDER BY created_at DESC"#,
    )
    .bind(educator_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_course).collect()
}

pub async fn list_courses_by_ids(
    pool: &PgPool,
    course_ids: &[Uuid],
) -> Result<Vec<Course>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, educator_id, title, description, thumbnail_url, price, discount,
                  is_published, chapters, ratings, enrolled_students, created_at, updated_at
           FROM courses
           WHERE id = ANY($1)
           ORDER BY created_at DESC"#,
    )
    .bind(course_ids)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_course).collect()
}

pub async fn set_course_ratings(
    pool: &PgPool,
    course_id: Uuid,
    ratings: &[Rating],
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE courses SET ratings = $1, updated_at = NOW() WHERE id = $2")
        .bind(Json(ratings))
        .bind(course_id)
        .execute(pool)
        .await?;

    Ok(())
}

// ---- user registry ----

/// Insert-or-refresh a mirrored identity-provider profile. The role flag
/// and enrollment list are ours and survive provider updates.
pub async fn upsert_user(
    pool: &PgPool,
    id: &str,
    email: &str,
    name: &str,
    image_url: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO users (id, email, name, image_url)
           VALUES ($1, $2, $3, $4)
           ON CONFLICT (id) DO UPDATE SET
               email = EXCLUDED.email,
               name = EXCLUDED.name,
               image_url = EXCLUDED.image_url,
               updated_at = NOW()"#,
    )
    .bind(id)
    .bind(email)
    .bind(name)
    .bind(image_url)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_user(pool: &PgPool, user_id: &str) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, email, name, image_url, role, enrolled_courses, created_at
           FROM users
           WHERE id = $1"#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_user).transpose()
}

pub async fn delete_user(pool: &PgPool, user_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn set_user_role(pool: &PgPool, user_id: &str, role: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET role = $1, updated_at = NOW() WHERE id = $2")
        .bind(role)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

// ---- purchase ledger ----

pub async fn create_purchase(
    pool: &PgPool,
    user_id: &str,
    course_id: Uuid,
    amount: Decimal,
) -> Result<Uuid, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO purchases (user_id, course_id, amount, status)
           VALUES ($1, $2, $3, 'pending')
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(amount)
    .fetch_one(pool)
    .await?;

    row.try_get("id")
}

pub async fn find_purchase(
    pool: &PgPool,
    purchase_id: Uuid,
) -> Result<Option<Purchase>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, user_id, course_id, amount, status, created_at
           FROM purchases
           WHERE id = $1"#,
    )
    .bind(purchase_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_purchase).transpose()
}

/// Complete a pending purchase and enroll the buyer, atomically.
///
/// The ledger transition is a compare-and-set on `status = 'pending'`;
/// both membership appends are guarded so a row can never be duplicated.
/// Returns false without touching anything when the purchase already left
/// `pending` (duplicate webhook delivery).
pub async fn complete_purchase_and_enroll(
    pool: &PgPool,
    purchase: &Purchase,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"UPDATE purchases
           SET status = 'completed', updated_at = NOW()
           WHERE id = $1 AND status = 'pending'"#,
    )
    .bind(purchase.id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        r#"UPDATE courses
           SET enrolled_students = ARRAY_APPEND(enrolled_students, $2), updated_at = NOW()
           WHERE id = $1 AND NOT ($2 = ANY(enrolled_students))"#,
    )
    .bind(purchase.course_id)
    .bind(&purchase.user_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"UPDATE users
           SET enrolled_courses = ARRAY_APPEND(enrolled_courses, $2), updated_at = NOW()
           WHERE id = $1 AND NOT ($2 = ANY(enrolled_courses))"#,
    )
    .bind(&purchase.user_id)
    .bind(purchase.course_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Compare-and-set `pending -> failed`. Never reverses a final status.
pub async fn fail_purchase(pool: &PgPool, purchase_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE purchases
           SET status = 'failed', updated_at = NOW()
           WHERE id = $1 AND status = 'pending'"#,
    )
    .bind(purchase_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn list_completed_for_courses(
    pool: &PgPool,
    course_ids: &[Uuid],
) -> Result<Vec<Purchase>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, user_id, course_id, amount, status, created_at
           FROM purchases
           WHERE course_id = ANY($1) AND status = 'completed'
           ORDER BY created_at DESC"#,
    )
    .bind(course_ids)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_purchase).collect()
}

// ---- dashboard joins ----

pub async fn enrolled_students_of_educator(
    pool: &PgPool,
    educator_id: &str,
) -> Result<Vec<EnrolledStudent>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT u.name, u.image_url, c.title AS course_title
           FROM courses c
           JOIN users u ON u.id = ANY(c.enrolled_students)
           WHERE c.educator_id = $1
           ORDER BY c.created_at DESC, u.name"#,
    )
    .bind(educator_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| {
            Ok(EnrolledStudent {
                name: r.try_get("name")?,
                image_url: r.try_get("image_url")?,
                course_title: r.try_get("course_title")?,
                purchase_date: None,
            })
        })
        .collect()
}

pub async fn completed_purchase_students(
    pool: &PgPool,
    educator_id: &str,
) -> Result<Vec<EnrolledStudent>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT u.name, u.image_url, c.title AS course_title, p.created_at AS purchase_date
           FROM purchases p
           JOIN courses c ON c.id = p.course_id
           JOIN users u ON u.id = p.user_id
           WHERE c.educator_id = $1 AND p.status = 'completed'
           ORDER BY p.created_at DESC"#,
    )
    .bind(educator_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|r| {
            Ok(EnrolledStudent {
                name: r.try_get("name")?,
                image_url: r.try_get("image_url")?,
                course_title: r.try_get("course_title")?,
                purchase_date: r.try_get("purchase_date")?,
            })
        })
        .collect()
}

// ---- course progress ----

/// Record a completed lecture; appending an id that is already present is
/// a no-op, so redelivered client calls cannot duplicate entries.
pub async fn record_lecture_completed(
    pool: &PgPool,
    user_id: &str,
    course_id: Uuid,
    lecture_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO course_progress (user_id, course_id, lectures_completed)
           VALUES ($1, $2, ARRAY[$3::TEXT])
           ON CONFLICT (user_id, course_id) DO UPDATE SET
               lectures_completed = CASE
                   WHEN $3::TEXT = ANY(course_progress.lectures_completed)
                       THEN course_progress.lectures_completed
                   ELSE ARRAY_APPEND(course_progress.lectures_completed, $3::TEXT)
               END,
               updated_at = NOW()"#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(lecture_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_progress(
    pool: &PgPool,
    user_id: &str,
    course_id: Uuid,
) -> Result<Option<CourseProgress>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT user_id, course_id, completed, lectures_completed
           FROM course_progress
           WHERE user_id = $1 AND course_id = $2"#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| {
        Ok(CourseProgress {
            user_id: r.try_get("user_id")?,
            course_id: r.try_get("course_id")?,
            completed: r.try_get("completed")?,
            lectures_completed: r.try_get("lectures_completed")?,
        })
    })
    .transpose()
}

/// Terminal ledger states. The status only ever moves
/// pending -> completed | failed; a final status never changes again.
pub fn is_final(status: PurchaseStatus) -> bool {
    matches!(status, PurchaseStatus::Completed | PurchaseStatus::Failed)
}
