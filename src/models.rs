// src/models.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "purchase_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Lecture {
    pub lecture_id: String,
    pub title: String,
    /// Runtime in minutes, as entered by the educator.
    pub duration_minutes: i32,
    pub lecture_url: String,
    pub is_preview_free: bool,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Chapter {
    pub chapter_id: String,
    pub title: String,
    pub order: i32,
    pub lectures: Vec<Lecture>,
}

/// One rating per user; re-rating replaces the entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Rating {
    pub user_id: String,
    pub rating: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Course {
    pub id: Uuid,
    pub educator_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub price: Decimal,
    pub discount: i32,
    pub is_published: bool,
    pub chapters: Vec<Chapter>,
    pub ratings: Vec<Rating>,
    pub enrolled_students: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Course {
    /// Price after the educator's discount, kept at two fractional digits.
    pub fn discounted_price(&self) -> Decimal {
        let discount = self.price * Decimal::from(self.discount) / Decimal::from(100);
        (self.price - discount).round_dp(2)
    }

    pub fn rating_average(&self) -> f64 {
        if self.ratings.is_empty() {
            return 0.0;
        }
        let sum: i32 = self.ratings.iter().map(|r| r.rating).sum();
        f64::from(sum) / self.ratings.len() as f64
    }

    /// Blank out video URLs for lectures that are not free previews. The
    /// chapter/lecture structure stays intact so clients can render the
    /// outline of locked content.
    pub fn redact_locked_lectures(&mut self) {
        for chapter in &mut self.chapters {
            for lecture in &mut chapter.lectures {
                if !lecture.is_preview_free {
                    lecture.lecture_url = String::new();
                }
            }
        }
    }
}

/// Catalog listing shape: no lecture content, no enrolled-student list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseSummary {
    pub id: Uuid,
    pub educator_id: String,
    pub educator_name: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub price: Decimal,
    pub discount: i32,
    pub ratings: Vec<Rating>,
    pub enrolled_count: i64,
}

/// Mirror of an identity-provider user. The provider, not this table, is
/// the source of truth for identity; the `role` flag is ours.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub image_url: String,
    pub role: String, // student | educator
    pub enrolled_courses: Vec<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: String,
    pub course_id: Uuid,
    pub amount: Decimal,
    pub status: PurchaseStatus,
    pub created_at: Option<DateTime<Utc>>,
}

/// Dashboard row: a student joined to the course they bought.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EnrolledStudent {
    pub name: String,
    pub image_url: String,
    pub course_title: String,
    pub purchase_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CourseProgress {
    pub user_id: String,
    pub course_id: Uuid,
    pub completed: bool,
    pub lectures_completed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(price: &str, discount: i32) -> Course {
        Course {
            id: Uuid::new_v4(),
            educator_id: "edu_1".to_string(),
            title: "Test".to_string(),
            description: String::new(),
            thumbnail_url: String::new(),
            price: price.parse().expect("decimal"),
            discount,
            is_published: true,
            chapters: Vec::new(),
            ratings: Vec::new(),
            enrolled_students: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn discounted_price_applies_percentage_at_two_decimals() {
        let c = course("49.99", 20);
        assert_eq!(c.discounted_price().to_string(), "39.99");

        let c = course("100.00", 0);
        assert_eq!(c.discounted_price().to_string(), "100.00");

        let c = course("10.00", 100);
        assert_eq!(c.discounted_price().to_string(), "0.00");
    }

    #[test]
    fn discounted_price_rounds_to_cents() {
        // 19.99 * 33% = 6.5967, so the charge is 13.3933 -> 13.39
        let c = course("19.99", 33);
        assert_eq!(c.discounted_price().to_string(), "13.39");
    }

    #[test]
    fn redaction_blanks_only_locked_lectures() {
        let mut c = course("10.00", 0);
        c.chapters = vec![Chapter {
            chapter_id: "ch1".to_string(),
            title: "Intro".to_string(),
            order: 1,
            lectures: vec![
                Lecture {
                    lecture_id: "l1".to_string(),
                    title: "Welcome".to_string(),
                    duration_minutes: 5,
                    lecture_url: "https://videos.example/welcome".to_string(),
                    is_preview_free: true,
                    order: 1,
                },
                Lecture {
                    lecture_id: "l2".to_string(),
                    title: "Deep dive".to_string(),
                    duration_minutes: 40,
                    lecture_url: "https://videos.example/deep-dive".to_string(),
                    is_preview_free: false,
                    order: 2,
                },
            ],
        }];

        c.redact_locked_lectures();

        let lectures = &c.chapters[0].lectures;
        assert_eq!(lectures[0].lecture_url, "https://videos.example/welcome");
        assert_eq!(lectures[1].lecture_url, "");
        assert_eq!(lectures[1].title, "Deep dive");
    }

    #[test]
    fn rating_average_over_entries() {
        let mut c = course("10.00", 0);
        assert_eq!(c.rating_average(), 0.0);
        c.ratings = vec![
            Rating { user_id: "a".to_string(), rating: 5 },
            Rating { user_id: "b".to_string(), rating: 2 },
        ];
        assert_eq!(c.rating_average(), 3.5);
    }
}
