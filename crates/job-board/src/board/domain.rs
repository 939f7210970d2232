use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Store-assigned identifier for an account.
    UserId
);
numeric_id!(
    /// Store-assigned identifier for a named group.
    GroupId
);
numeric_id!(
    /// Store-assigned identifier for a posting; also the `:job_id` path segment.
    JobId
);
numeric_id!(ApplicationId);

/// Registered account. Role is never stored here; see [`super::roles`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

/// Fields supplied when creating an account; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

/// Job posting owned by the employer who created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub company_name: String,
    pub location: String,
    pub description: String,
    pub posted_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Case-insensitive substring match over title, company and location.
    pub fn matches(&self, needle_lowercase: &str) -> bool {
        [&self.title, &self.company_name, &self.location]
            .iter()
            .any(|field| field.to_lowercase().contains(needle_lowercase))
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub title: String,
    pub company_name: String,
    pub location: String,
    pub description: String,
    pub posted_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// A user's submission to a job. Nothing prevents several per (job, applicant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub job: JobId,
    pub applicant: UserId,
    /// Path of the stored resume relative to the media root.
    pub resume: String,
    pub cover_letter: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub job: JobId,
    pub applicant: UserId,
    pub resume: String,
    pub cover_letter: String,
    pub applied_at: DateTime<Utc>,
}

/// Application paired with the title of the job it targets, for the applicant dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationSummary {
    pub application: Application,
    pub job_title: String,
}

impl ApplicationSummary {
    /// File name shown for the stored resume.
    pub fn resume_name(&self) -> &str {
        self.application
            .resume
            .rsplit('/')
            .next()
            .unwrap_or(&self.application.resume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(title: &str, company: &str, location: &str) -> Job {
        Job {
            id: JobId(1),
            title: title.to_string(),
            company_name: company.to_string(),
            location: location.to_string(),
            description: "Build things".to_string(),
            posted_by: UserId(1),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn matches_any_searchable_field() {
        let posting = job("Backend Engineer", "Riverbank Labs", "Des Moines");
        assert!(posting.matches("river"));
        assert!(posting.matches("moines"));
        assert!(posting.matches("engineer"));
        assert!(!posting.matches("frontend"));
    }

    #[test]
    fn description_is_not_searched() {
        let posting = job("Analyst", "Acme", "Remote");
        assert!(!posting.matches("build"));
    }

    #[test]
    fn resume_name_strips_directories() {
        let summary = ApplicationSummary {
            application: Application {
                id: ApplicationId(3),
                job: JobId(1),
                applicant: UserId(2),
                resume: "resumes/5f1c-cv.pdf".to_string(),
                cover_letter: "Hello".to_string(),
                applied_at: Utc::now(),
            },
            job_title: "Analyst".to_string(),
        };
        assert_eq!(summary.resume_name(), "5f1c-cv.pdf");
    }
}
