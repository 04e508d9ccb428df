// src/client.rs
//
// Typed client for the REST boundary plus the presentation layer's course
// store. The catalog cache has an explicit lifecycle: populate on load,
// read from the cache, invalidate on mutation. Nothing refreshes behind
// the caller's back.

use serde::Deserialize;
use std::fmt;

use crate::models::CourseSummary;

#[derive(Debug)]
pub enum ClientError {
    Http(reqwest::Error),
    Api { status: u16, message: String },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Http(e) => write!(f, "http error: {e}"),
            ClientError::Api { status, message } => {
                write!(f, "api error status={status} message={message}")
            }
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

#[derive(Debug, Deserialize)]
struct CourseListResponse {
    success: bool,
    #[serde(default)]
    courses: Vec<CourseSummary>,
    #[serde(default)]
    message: Option<String>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_courses(&self) -> Result<Vec<CourseSummary>, ClientError> {
        let resp = self
            .http
            .get(format!("{}/api/course/all", self.base_url))
            .send()
            .await?;

        let status = resp.status();
        let body: CourseListResponse = resp.json().await?;

        if !status.is_success() || !body.success {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: body.message.unwrap_or_else(|| "request failed".to_string()),
            });
        }

        Ok(body.courses)
    }
}

/// Cached course list for listing pages, with the display currency.
pub struct CourseStore {
    currency: String,
    courses: Option<Vec<CourseSummary>>,
}

impl CourseStore {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            courses: None,
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// The cached list, if populated.
    pub fn cached(&self) -> Option<&[CourseSummary]> {
        self.courses.as_deref()
    }

    pub fn fill(&mut self, courses: Vec<CourseSummary>) {
        self.courses = Some(courses);
    }

    /// Drop the cache. Call after any mutation that changes the catalog
    /// (course added, enrollment applied); the next load refetches.
    pub fn invalidate(&mut self) {
        self.courses = None;
    }

    /// Populate on first use, then serve from the cache until invalidated.
    pub async fn load(&mut self, client: &ApiClient) -> Result<&[CourseSummary], ClientError> {
        if self.courses.is_none() {
            let fetched = client.fetch_courses().await?;
            self.fill(fetched);
        }
        Ok(self.courses.as_deref().unwrap_or_default())
    }
}
