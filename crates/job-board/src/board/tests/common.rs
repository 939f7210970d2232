use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;

use crate::board::domain::{
    Application, Group, GroupId, Job, JobId, NewApplication, NewJob, NewUser, User, UserId,
};
use crate::board::forms::{ApplicationForm, JobForm, SignUpForm};
use crate::board::repository::{
    ApplicationRepository, GroupRepository, JobRepository, RepositoryError, SessionRepository,
    UserRepository,
};
use crate::board::storage::{sanitize_file_name, ResumeStorage, ResumeUpload, StorageError};
use crate::board::{board_router, JobBoardService, MemoryStore, Role, SignedIn};

pub(super) const PASSWORD: &str = "orchard-lantern-42";
pub(super) const BOUNDARY: &str = "job-board-test-boundary";

pub(super) type TestService = JobBoardService<MemoryStore, MemoryResumes>;

/// Resume storage that keeps uploads in memory.
#[derive(Default)]
pub(super) struct MemoryResumes {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryResumes {
    pub(super) fn stored(&self) -> usize {
        self.files.lock().expect("resume lock").len()
    }
}

impl ResumeStorage for MemoryResumes {
    fn save(&self, upload: &ResumeUpload) -> Result<String, StorageError> {
        let mut files = self.files.lock().expect("resume lock");
        let path = format!(
            "resumes/{}-{}",
            files.len() + 1,
            sanitize_file_name(&upload.file_name)
        );
        files.insert(path.clone(), upload.bytes.clone());
        Ok(path)
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.files.lock().expect("resume lock").get(path).cloned())
    }
}

/// Store whose every call fails as if the database were offline.
pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl UserRepository for UnavailableStore {
    fn insert_user(&self, _user: NewUser) -> Result<User, RepositoryError> {
        offline()
    }

    fn fetch_user(&self, _id: UserId) -> Result<Option<User>, RepositoryError> {
        offline()
    }

    fn find_by_username(&self, _username: &str) -> Result<Option<User>, RepositoryError> {
        offline()
    }

    fn username_taken(&self, _username: &str) -> Result<bool, RepositoryError> {
        offline()
    }
}

impl GroupRepository for UnavailableStore {
    fn get_or_create_group(&self, _name: &str) -> Result<(Group, bool), RepositoryError> {
        offline()
    }

    fn add_member(&self, _group: GroupId, _user: UserId) -> Result<(), RepositoryError> {
        offline()
    }

    fn is_member(&self, _user: UserId, _group_name: &str) -> Result<bool, RepositoryError> {
        offline()
    }
}

impl JobRepository for UnavailableStore {
    fn insert_job(&self, _job: NewJob) -> Result<Job, RepositoryError> {
        offline()
    }

    fn fetch_job(&self, _id: JobId) -> Result<Option<Job>, RepositoryError> {
        offline()
    }

    fn list_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        offline()
    }

    fn jobs_posted_by(&self, _user: UserId) -> Result<Vec<Job>, RepositoryError> {
        offline()
    }
}

impl ApplicationRepository for UnavailableStore {
    fn insert_application(
        &self,
        _application: NewApplication,
    ) -> Result<Application, RepositoryError> {
        offline()
    }

    fn applications_by(&self, _applicant: UserId) -> Result<Vec<Application>, RepositoryError> {
        offline()
    }
}

impl SessionRepository for UnavailableStore {
    fn insert_session(&self, _key: &str, _user: UserId) -> Result<(), RepositoryError> {
        offline()
    }

    fn session_user(&self, _key: &str) -> Result<Option<UserId>, RepositoryError> {
        offline()
    }

    fn remove_session(&self, _key: &str) -> Result<(), RepositoryError> {
        offline()
    }
}

pub(super) fn build_service() -> (Arc<TestService>, Arc<MemoryStore>, Arc<MemoryResumes>) {
    let store = Arc::new(MemoryStore::default());
    let resumes = Arc::new(MemoryResumes::default());
    let service = Arc::new(JobBoardService::new(store.clone(), resumes.clone()));
    (service, store, resumes)
}

pub(super) fn router(service: Arc<TestService>) -> axum::Router {
    board_router(service, false)
}

pub(super) fn signup_form(username: &str, role: Role) -> SignUpForm {
    SignUpForm {
        username: username.to_string(),
        email: Some(format!("{username}@example.com")),
        password1: PASSWORD.to_string(),
        password2: PASSWORD.to_string(),
        role: role.choice().to_string(),
    }
}

pub(super) fn register(service: &TestService, username: &str, role: Role) -> SignedIn {
    service
        .signup(&signup_form(username, role))
        .expect("signup succeeds")
}

pub(super) fn job_form(title: &str, company_name: &str, location: &str) -> JobForm {
    JobForm {
        title: title.to_string(),
        company_name: company_name.to_string(),
        location: location.to_string(),
        description: format!("{title} at {company_name}"),
    }
}

pub(super) fn post(service: &TestService, employer: &User, title: &str) -> Job {
    service
        .post_job(employer, &job_form(title, "Riverside Fabrication", "Davenport"))
        .expect("job posted")
}

pub(super) fn application_form(file_name: &str, bytes: &[u8], cover_letter: &str) -> ApplicationForm {
    ApplicationForm {
        resume: Some(ResumeUpload {
            file_name: file_name.to_string(),
            bytes: bytes.to_vec(),
        }),
        cover_letter: cover_letter.to_string(),
    }
}

pub(super) fn get(uri: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(key) = session {
        builder = builder.header(header::COOKIE, format!("sessionid={key}"));
    }
    builder.body(Body::empty()).expect("request")
}

pub(super) fn post_form(uri: &str, session: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::post(uri).header(
        header::CONTENT_TYPE,
        "application/x-www-form-urlencoded",
    );
    if let Some(key) = session {
        builder = builder.header(header::COOKIE, format!("sessionid={key}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub(super) fn post_multipart(uri: &str, session: &str, body: Vec<u8>) -> Request<Body> {
    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::COOKIE, format!("sessionid={session}"))
        .body(Body::from(body))
        .expect("request")
}

/// Multipart body with an optional resume part and a cover letter part.
pub(super) fn multipart_body(resume: Option<(&str, &[u8])>, cover_letter: &str) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some((file_name, bytes)) = resume {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"resume\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"cover_letter\"\r\n\r\n{cover_letter}\r\n--{BOUNDARY}--\r\n"
        )
        .as_bytes(),
    );
    body
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}

pub(super) fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location header")
}

pub(super) fn assert_redirect(response: &Response, target: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response), target);
}

/// Full `Set-Cookie` header for the session cookie, if the response sets one.
pub(super) fn session_set_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("sessionid="))
        .map(str::to_string)
}

/// Session key carried by the response's `Set-Cookie` header.
pub(super) fn session_key(response: &Response) -> Option<String> {
    let header = session_set_cookie(response)?;
    let pair = header.split(';').next()?;
    pair.strip_prefix("sessionid=")
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
