use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::auth::{self, CredentialError};
use super::domain::{
    Application, ApplicationSummary, Job, JobId, NewApplication, NewJob, NewUser, User,
};
use super::forms::{ApplicationForm, FormErrors, JobForm, SignUpForm};
use super::repository::{BoardStore, RepositoryError};
use super::roles::{self, Role};
use super::storage::{ResumeStorage, StorageError};

const USERNAME_TAKEN: &str = "A user with that username already exists.";

/// Service composing the store, resume storage and role checks behind every page.
pub struct JobBoardService<S, F> {
    store: Arc<S>,
    resumes: Arc<F>,
}

/// What the dashboard shows, decided fresh on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dashboard {
    Employer { jobs: Vec<Job> },
    Applicant { applications: Vec<ApplicationSummary> },
    Unassigned,
}

/// A user with a freshly issued session key.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub session_key: String,
}

/// Outcome of ensuring one role group exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupProvision {
    pub name: &'static str,
    pub created: bool,
}

impl fmt::Display for GroupProvision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.created {
            write!(f, "Created group: {}", self.name)
        } else {
            write!(f, "Group already exists: {}", self.name)
        }
    }
}

impl<S, F> JobBoardService<S, F>
where
    S: BoardStore + 'static,
    F: ResumeStorage + 'static,
{
    pub fn new(store: Arc<S>, resumes: Arc<F>) -> Self {
        Self { store, resumes }
    }

    /// Get-or-create the "Employer" and "Applicant" groups.
    pub fn ensure_role_groups(&self) -> Result<Vec<GroupProvision>, BoardError> {
        Role::ALL
            .into_iter()
            .map(|role| -> Result<GroupProvision, BoardError> {
                let (_, created) = self.store.get_or_create_group(role.group_name())?;
                Ok(GroupProvision {
                    name: role.group_name(),
                    created,
                })
            })
            .collect()
    }

    pub fn is_employer(&self, user: &User) -> Result<bool, BoardError> {
        Ok(roles::is_employer(self.store.as_ref(), user)?)
    }

    /// Create the account, join the chosen role's group and sign the user in.
    pub fn signup(&self, form: &SignUpForm) -> Result<SignedIn, BoardError> {
        let cleaned = form.clean();
        let taken = !form.username.is_empty() && self.store.username_taken(&form.username)?;
        let draft = match (cleaned, taken) {
            (Ok(draft), false) => draft,
            (Ok(_), true) => return Err(username_taken(FormErrors::default())),
            (Err(errors), true) => return Err(username_taken(errors)),
            (Err(errors), false) => return Err(BoardError::Validation(errors)),
        };

        let password_hash = auth::hash_password(&draft.password)?;
        let user = match self.store.insert_user(NewUser {
            username: draft.username,
            email: draft.email,
            password_hash,
        }) {
            Ok(user) => user,
            Err(RepositoryError::Conflict) => return Err(username_taken(FormErrors::default())),
            Err(other) => return Err(other.into()),
        };

        let (group, _) = self.store.get_or_create_group(draft.role.group_name())?;
        self.store.add_member(group.id, user.id)?;
        info!(user = %user.username, role = draft.role.choice(), "account created");

        let session_key = self.login(&user)?;
        Ok(SignedIn { user, session_key })
    }

    /// `None` for unknown users, wrong passwords and inactive accounts alike.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>, BoardError> {
        let Some(user) = self.store.find_by_username(username)? else {
            debug!(%username, "login for unknown user");
            return Ok(None);
        };
        if !user.is_active || !auth::verify_password(password, &user.password_hash) {
            debug!(%username, "login rejected");
            return Ok(None);
        }
        Ok(Some(user))
    }

    /// Issue a new session key for `user`.
    pub fn login(&self, user: &User) -> Result<String, BoardError> {
        let key = auth::new_session_key();
        self.store.insert_session(&key, user.id)?;
        info!(user = %user.username, "signed in");
        Ok(key)
    }

    pub fn logout(&self, session_key: &str) -> Result<(), BoardError> {
        self.store.remove_session(session_key)?;
        Ok(())
    }

    /// Active user behind a session key, if any.
    pub fn session_user(&self, session_key: &str) -> Result<Option<User>, BoardError> {
        let Some(user_id) = self.store.session_user(session_key)? else {
            return Ok(None);
        };
        Ok(self
            .store
            .fetch_user(user_id)?
            .filter(|user| user.is_active))
    }

    pub fn dashboard(&self, user: &User) -> Result<Dashboard, BoardError> {
        match roles::resolve_role(self.store.as_ref(), user)? {
            Some(Role::Employer) => Ok(Dashboard::Employer {
                jobs: self.store.jobs_posted_by(user.id)?,
            }),
            Some(Role::Applicant) => {
                let applications = self
                    .store
                    .applications_by(user.id)?
                    .into_iter()
                    .map(|application| {
                        let job_title = self
                            .store
                            .fetch_job(application.job)?
                            .map(|job| job.title)
                            .unwrap_or_default();
                        Ok(ApplicationSummary {
                            application,
                            job_title,
                        })
                    })
                    .collect::<Result<Vec<_>, RepositoryError>>()?;
                Ok(Dashboard::Applicant { applications })
            }
            None => Ok(Dashboard::Unassigned),
        }
    }

    pub fn require_employer(&self, user: &User) -> Result<(), BoardError> {
        if self.is_employer(user)? {
            Ok(())
        } else {
            debug!(user = %user.username, "employer role required");
            Err(BoardError::Forbidden)
        }
    }

    /// Persist a posting owned by `user`, who must be an employer.
    pub fn post_job(&self, user: &User, form: &JobForm) -> Result<Job, BoardError> {
        self.require_employer(user)?;
        let draft = form.clean().map_err(BoardError::Validation)?;

        let job = self.store.insert_job(NewJob {
            title: draft.title,
            company_name: draft.company_name,
            location: draft.location,
            description: draft.description,
            posted_by: user.id,
            created_at: Utc::now(),
        })?;
        info!(job = %job.id, user = %user.username, "job posted");
        Ok(job)
    }

    pub fn job(&self, id: JobId) -> Result<Job, BoardError> {
        self.store
            .fetch_job(id)?
            .ok_or(BoardError::JobNotFound(id))
    }

    /// All jobs, or those whose title, company or location contains `query` ignoring case.
    pub fn list_jobs(&self, query: Option<&str>) -> Result<Vec<Job>, BoardError> {
        let jobs = self.store.list_jobs()?;
        match query.filter(|query| !query.is_empty()) {
            Some(query) => {
                let needle = query.to_lowercase();
                Ok(jobs.into_iter().filter(|job| job.matches(&needle)).collect())
            }
            None => Ok(jobs),
        }
    }

    /// Store the resume and record an application. Repeat applications are accepted.
    pub fn apply(
        &self,
        user: &User,
        job_id: JobId,
        form: ApplicationForm,
    ) -> Result<Application, BoardError> {
        let job = self.job(job_id)?;
        let (resume, cover_letter) = form.clean().map_err(BoardError::Validation)?;

        let resume_path = self.resumes.save(&resume)?;
        let application = self.store.insert_application(NewApplication {
            job: job.id,
            applicant: user.id,
            resume: resume_path,
            cover_letter,
            applied_at: Utc::now(),
        })?;
        info!(
            application = %application.id,
            job = %job.id,
            user = %user.username,
            "application submitted"
        );
        Ok(application)
    }

    /// Raw bytes of a stored resume.
    pub fn resume(&self, path: &str) -> Result<Option<Vec<u8>>, BoardError> {
        Ok(self.resumes.read(path)?)
    }
}

fn username_taken(mut errors: FormErrors) -> BoardError {
    errors.add("username", USERNAME_TAKEN);
    BoardError::Validation(errors)
}

/// Error raised by the board service.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("invalid form submission: {0}")]
    Validation(FormErrors),
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error("employer role required")]
    Forbidden,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error("blocking task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}
