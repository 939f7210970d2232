//! Server-rendered pages. Every page carries `current_user` for the shared navigation bar.

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use super::domain::{ApplicationSummary, Job};
use super::forms::{FormErrors, JobForm, SignUpForm};
use super::roles::Role;

#[derive(Template)]
#[template(path = "job_list.html")]
pub struct JobListPage {
    pub current_user: Option<String>,
    pub jobs: Vec<Job>,
    pub query: String,
}

#[derive(Template)]
#[template(path = "job_detail.html")]
pub struct JobDetailPage {
    pub current_user: Option<String>,
    pub job: Job,
}

#[derive(Template)]
#[template(path = "post_job.html")]
pub struct PostJobPage {
    pub current_user: Option<String>,
    pub form: JobForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "apply_job.html")]
pub struct ApplyJobPage {
    pub current_user: Option<String>,
    pub job: Job,
    pub cover_letter: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupPage {
    pub current_user: Option<String>,
    pub form: SignUpForm,
    pub errors: FormErrors,
    pub roles: [Role; 2],
}

impl SignupPage {
    pub fn new(form: SignUpForm, errors: FormErrors) -> Self {
        Self {
            current_user: None,
            form,
            errors,
            roles: Role::ALL,
        }
    }
}

/// No error slot: failed logins re-render silently.
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub current_user: Option<String>,
}

#[derive(Template)]
#[template(path = "employer_dashboard.html")]
pub struct EmployerDashboardPage {
    pub current_user: Option<String>,
    pub jobs: Vec<Job>,
}

#[derive(Template)]
#[template(path = "applicant_dashboard.html")]
pub struct ApplicantDashboardPage {
    pub current_user: Option<String>,
    pub applications: Vec<ApplicationSummary>,
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundPage {
    pub current_user: Option<String>,
    pub message: String,
}

/// Render `template` with `status`, falling back to a bare 500 when rendering fails.
pub fn page<T: Template>(status: StatusCode, template: &T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Server Error (500)").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::domain::{JobId, UserId};
    use chrono::{TimeZone, Utc};

    fn job() -> Job {
        Job {
            id: JobId(4),
            title: "Welder <night shift>".to_string(),
            company_name: "Riverside Fabrication".to_string(),
            location: "Davenport".to_string(),
            description: "MIG and TIG".to_string(),
            posted_by: UserId(1),
            created_at: Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn job_list_escapes_and_links_each_job() {
        let html = JobListPage {
            current_user: None,
            jobs: vec![job()],
            query: "river".to_string(),
        }
        .render()
        .expect("renders");

        assert!(html.contains("/job/4/"));
        assert!(html.contains("Welder &lt;night shift&gt;"));
        assert!(html.contains("value=\"river\""));
        assert!(html.contains("/login/"));
    }

    #[test]
    fn signup_page_shows_field_errors_and_keeps_choice() {
        let mut errors = FormErrors::default();
        errors.add("password2", "The two password fields didn't match.");
        let form = SignUpForm {
            username: "dana".to_string(),
            role: "applicant".to_string(),
            ..SignUpForm::default()
        };

        let html = SignupPage::new(form, errors).render().expect("renders");
        assert!(html.contains("didn&#x27;t match") || html.contains("didn&#39;t match"));
        assert!(html.contains("value=\"dana\""));
        assert!(html.contains("value=\"applicant\" checked"));
        assert!(!html.contains("value=\"employer\" checked"));
    }

    #[test]
    fn navigation_reflects_signed_in_user() {
        let html = JobDetailPage {
            current_user: Some("erin".to_string()),
            job: job(),
        }
        .render()
        .expect("renders");

        assert!(html.contains("erin"));
        assert!(html.contains("/logout/"));
        assert!(html.contains("/apply/4/"));
        assert!(html.contains("March 14, 2025"));
    }
}
