use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Extension, Form, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::{error, warn};

use super::auth::SESSION_COOKIE;
use super::domain::{Job, JobId, User};
use super::forms::{ApplicationForm, FormErrors, JobForm, LoginForm, SignUpForm};
use super::repository::BoardStore;
use super::service::{BoardError, Dashboard, JobBoardService};
use super::storage::{ResumeStorage, ResumeUpload};
use super::views::{
    page, ApplicantDashboardPage, ApplyJobPage, EmployerDashboardPage, JobDetailPage,
    JobListPage, LoginPage, NotFoundPage, PostJobPage, SignupPage,
};

const DASHBOARD: &str = "/dashboard/";
const LOGIN: &str = "/login/";

/// Shared handler state: the service plus cookie policy.
pub struct BoardContext<S, F> {
    service: Arc<JobBoardService<S, F>>,
    secure_cookies: bool,
}

impl<S, F> Clone for BoardContext<S, F> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            secure_cookies: self.secure_cookies,
        }
    }
}

impl<S, F> BoardContext<S, F>
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    fn current_user(&self, jar: &CookieJar) -> Result<Option<User>, BoardError> {
        match jar.get(SESSION_COOKIE) {
            Some(cookie) => self.service.session_user(cookie.value()),
            None => Ok(None),
        }
    }

    /// Username for the navigation bar on public pages; lookup failures just hide it.
    fn viewer(&self, jar: &CookieJar) -> Option<String> {
        match self.current_user(jar) {
            Ok(user) => user.map(|user| user.username),
            Err(err) => {
                warn!(error = %err, "session lookup failed");
                None
            }
        }
    }

    /// Run service work that hashes passwords or writes files on the blocking pool.
    async fn blocking<T>(
        &self,
        work: impl FnOnce(&JobBoardService<S, F>) -> Result<T, BoardError> + Send + 'static,
    ) -> Result<T, BoardError>
    where
        T: Send + 'static,
    {
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || work(&service)).await?
    }

    fn session_cookie(&self, key: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, key))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .build()
    }
}

/// Route table for every board page. Routes below the login guard see the signed-in user
/// as `Extension<Arc<User>>`.
pub fn board_router<S, F>(service: Arc<JobBoardService<S, F>>, secure_cookies: bool) -> Router
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    let context = BoardContext {
        service,
        secure_cookies,
    };

    let protected = Router::new()
        .route(DASHBOARD, get(dashboard_handler::<S, F>))
        .route(
            "/post-job/",
            get(post_job_form::<S, F>).post(post_job_handler::<S, F>),
        )
        .route("/job/:job_id/", get(job_detail_handler::<S, F>))
        .route(
            "/apply/:job_id/",
            get(apply_form::<S, F>).post(apply_handler::<S, F>),
        )
        .route("/media/*path", get(media_handler::<S, F>))
        .route_layer(middleware::from_fn_with_state(
            context.clone(),
            require_login::<S, F>,
        ));

    Router::new()
        .route("/", get(job_list_handler::<S, F>))
        .route(
            "/signup/",
            get(signup_form).post(signup_handler::<S, F>),
        )
        .route(LOGIN, get(login_form).post(login_handler::<S, F>))
        .route("/logout/", get(logout_handler::<S, F>))
        .merge(protected)
        .fallback(not_found_handler::<S, F>)
        .with_state(context)
}

pub(crate) async fn require_login<S, F>(
    State(context): State<BoardContext<S, F>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    match context.current_user(&jar) {
        Ok(Some(user)) => {
            request.extensions_mut().insert(Arc::new(user));
            next.run(request).await
        }
        Ok(None) => {
            let location = format!("{LOGIN}?next={}", encode_next(request.uri().path()));
            Redirect::to(&location).into_response()
        }
        Err(err) => failure(err, None),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    q: Option<String>,
}

pub(crate) async fn job_list_handler<S, F>(
    State(context): State<BoardContext<S, F>>,
    jar: CookieJar,
    Query(params): Query<SearchParams>,
) -> Response
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    let current_user = context.viewer(&jar);
    let query = params.q.unwrap_or_default();
    match context.service.list_jobs(Some(&query)) {
        Ok(jobs) => page(
            StatusCode::OK,
            &JobListPage {
                current_user,
                jobs,
                query,
            },
        ),
        Err(err) => failure(err, current_user),
    }
}

pub(crate) async fn signup_form() -> Response {
    page(
        StatusCode::OK,
        &SignupPage::new(SignUpForm::default(), FormErrors::default()),
    )
}

pub(crate) async fn signup_handler<S, F>(
    State(context): State<BoardContext<S, F>>,
    jar: CookieJar,
    Form(form): Form<SignUpForm>,
) -> Response
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    let submitted = form.clone();
    match context
        .blocking(move |service| service.signup(&submitted))
        .await
    {
        Ok(signed_in) => {
            let jar = jar.add(context.session_cookie(signed_in.session_key));
            (jar, Redirect::to(DASHBOARD)).into_response()
        }
        Err(BoardError::Validation(errors)) => {
            let form = SignUpForm {
                password1: String::new(),
                password2: String::new(),
                ..form
            };
            page(StatusCode::OK, &SignupPage::new(form, errors))
        }
        Err(err) => failure(err, None),
    }
}

pub(crate) async fn login_form() -> Response {
    page(StatusCode::OK, &LoginPage { current_user: None })
}

pub(crate) async fn login_handler<S, F>(
    State(context): State<BoardContext<S, F>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    let previous = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string());
    let issued = context
        .blocking(move |service| {
            let Some(user) = service.authenticate(&form.username, &form.password)? else {
                return Ok(None);
            };
            // A fresh key on every login; the previous session, if any, is discarded.
            if let Some(previous) = previous {
                if let Err(err) = service.logout(&previous) {
                    warn!(error = %err, "failed to discard previous session");
                }
            }
            service.login(&user).map(Some)
        })
        .await;

    match issued {
        Ok(Some(key)) => {
            let jar = jar.add(context.session_cookie(key));
            (jar, Redirect::to(DASHBOARD)).into_response()
        }
        Ok(None) => page(StatusCode::OK, &LoginPage { current_user: None }),
        Err(err) => failure(err, None),
    }
}

pub(crate) async fn logout_handler<S, F>(
    State(context): State<BoardContext<S, F>>,
    jar: CookieJar,
) -> Response
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let key = cookie.value().to_string();
        if let Err(err) = context.blocking(move |service| service.logout(&key)).await {
            warn!(error = %err, "failed to remove session");
        }
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to(LOGIN)).into_response()
}

pub(crate) async fn dashboard_handler<S, F>(
    State(context): State<BoardContext<S, F>>,
    Extension(user): Extension<Arc<User>>,
) -> Response
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    let current_user = Some(user.username.clone());
    match context.service.dashboard(&user) {
        Ok(Dashboard::Employer { jobs }) => page(
            StatusCode::OK,
            &EmployerDashboardPage { current_user, jobs },
        ),
        Ok(Dashboard::Applicant { applications }) => page(
            StatusCode::OK,
            &ApplicantDashboardPage {
                current_user,
                applications,
            },
        ),
        Ok(Dashboard::Unassigned) => Redirect::to(LOGIN).into_response(),
        Err(err) => failure(err, current_user),
    }
}

pub(crate) async fn post_job_form<S, F>(
    State(context): State<BoardContext<S, F>>,
    Extension(user): Extension<Arc<User>>,
) -> Response
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    let current_user = Some(user.username.clone());
    match context.service.require_employer(&user) {
        Ok(()) => page(
            StatusCode::OK,
            &PostJobPage {
                current_user,
                form: JobForm::default(),
                errors: FormErrors::default(),
            },
        ),
        Err(err) => failure(err, current_user),
    }
}

pub(crate) async fn post_job_handler<S, F>(
    State(context): State<BoardContext<S, F>>,
    Extension(user): Extension<Arc<User>>,
    Form(form): Form<JobForm>,
) -> Response
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    let current_user = Some(user.username.clone());
    let (poster, submitted) = (user.clone(), form.clone());
    match context
        .blocking(move |service| service.post_job(&poster, &submitted))
        .await
    {
        Ok(_) => Redirect::to(DASHBOARD).into_response(),
        Err(BoardError::Validation(errors)) => page(
            StatusCode::OK,
            &PostJobPage {
                current_user,
                form,
                errors,
            },
        ),
        Err(err) => failure(err, current_user),
    }
}

pub(crate) async fn job_detail_handler<S, F>(
    State(context): State<BoardContext<S, F>>,
    Extension(user): Extension<Arc<User>>,
    Path(job_id): Path<String>,
) -> Response
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    let current_user = Some(user.username.clone());
    match lookup_job(&context, &job_id) {
        Ok(job) => page(StatusCode::OK, &JobDetailPage { current_user, job }),
        Err(err) => failure(err, current_user),
    }
}

pub(crate) async fn apply_form<S, F>(
    State(context): State<BoardContext<S, F>>,
    Extension(user): Extension<Arc<User>>,
    Path(job_id): Path<String>,
) -> Response
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    let current_user = Some(user.username.clone());
    match lookup_job(&context, &job_id) {
        Ok(job) => page(
            StatusCode::OK,
            &ApplyJobPage {
                current_user,
                job,
                cover_letter: String::new(),
                errors: FormErrors::default(),
            },
        ),
        Err(err) => failure(err, current_user),
    }
}

pub(crate) async fn apply_handler<S, F>(
    State(context): State<BoardContext<S, F>>,
    Extension(user): Extension<Arc<User>>,
    Path(job_id): Path<String>,
    multipart: Result<Multipart, axum::extract::multipart::MultipartRejection>,
) -> Response
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    let current_user = Some(user.username.clone());
    let job = match lookup_job(&context, &job_id) {
        Ok(job) => job,
        Err(err) => return failure(err, current_user),
    };

    // A body that is not multipart is treated as an empty submission.
    let form = match multipart {
        Ok(multipart) => match read_application(multipart).await {
            Ok(form) => form,
            Err(err) => return err.into_response(),
        },
        Err(_) => ApplicationForm::default(),
    };
    let cover_letter = form.cover_letter.clone();

    let (applicant, job_id) = (user.clone(), job.id);
    match context
        .blocking(move |service| service.apply(&applicant, job_id, form))
        .await
    {
        Ok(_) => Redirect::to(DASHBOARD).into_response(),
        Err(BoardError::Validation(errors)) => page(
            StatusCode::OK,
            &ApplyJobPage {
                current_user,
                job,
                cover_letter,
                errors,
            },
        ),
        Err(err) => failure(err, current_user),
    }
}

pub(crate) async fn media_handler<S, F>(
    State(context): State<BoardContext<S, F>>,
    Extension(user): Extension<Arc<User>>,
    Path(path): Path<String>,
) -> Response
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    let current_user = Some(user.username.clone());
    let requested = path.clone();
    match context
        .blocking(move |service| service.resume(&requested))
        .await
    {
        Ok(Some(bytes)) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.to_string())], bytes).into_response()
        }
        Ok(None) => not_found(current_user, "The requested file was not found."),
        Err(err) => failure(err, current_user),
    }
}

pub(crate) async fn not_found_handler<S, F>(
    State(context): State<BoardContext<S, F>>,
    jar: CookieJar,
) -> Response
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    not_found(
        context.viewer(&jar),
        "The requested resource was not found on this server.",
    )
}

/// Non-numeric ids cannot match a job, so they are treated like unknown ones.
fn lookup_job<S, F>(
    context: &BoardContext<S, F>,
    raw_id: &str,
) -> Result<Job, BoardError>
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    let id = raw_id.parse::<u64>().unwrap_or(0);
    context.service.job(JobId(id))
}

async fn read_application(mut multipart: Multipart) -> Result<ApplicationForm, MultipartError> {
    let mut form = ApplicationForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                form.resume = Some(ResumeUpload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            "cover_letter" => form.cover_letter = field.text().await?,
            _ => {}
        }
    }
    Ok(form)
}

fn not_found(current_user: Option<String>, message: &str) -> Response {
    page(
        StatusCode::NOT_FOUND,
        &NotFoundPage {
            current_user,
            message: message.to_string(),
        },
    )
}

/// Map a service failure to the neutral response each error kind calls for.
fn failure(err: BoardError, current_user: Option<String>) -> Response {
    match err {
        BoardError::JobNotFound(_) => {
            not_found(current_user, "No job matches the given query.")
        }
        BoardError::Forbidden => Redirect::to(DASHBOARD).into_response(),
        BoardError::Validation(errors) => {
            warn!(%errors, "unexpected validation failure");
            (StatusCode::BAD_REQUEST, "Bad Request (400)").into_response()
        }
        other => {
            error!(error = %other, "request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Server Error (500)").into_response()
        }
    }
}

/// Percent-encode a path for the `next` query parameter, keeping `/` readable.
fn encode_next(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for byte in path.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'/' | b'-' | b'_' | b'.' | b'~') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::encode_next;

    #[test]
    fn encode_next_escapes_reserved_characters() {
        assert_eq!(encode_next("/job/7/"), "/job/7/");
        assert_eq!(encode_next("/media/resumes/a b.pdf"), "/media/resumes/a%20b.pdf");
        assert_eq!(encode_next("/x?y=1&z"), "/x%3Fy%3D1%26z");
    }
}
