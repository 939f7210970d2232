use super::domain::{
    Application, Group, GroupId, Job, JobId, NewApplication, NewJob, NewUser, User, UserId,
};

/// Account storage. Usernames are unique ignoring case.
pub trait UserRepository: Send + Sync {
    /// Fails with [`RepositoryError::Conflict`] when the username is already taken.
    fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    fn fetch_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    /// Exact, case-sensitive lookup used for authentication.
    fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;
    fn username_taken(&self, username: &str) -> Result<bool, RepositoryError>;
}

/// Named groups and their membership.
pub trait GroupRepository: Send + Sync {
    /// Returns the group and whether this call created it. Atomic per name.
    fn get_or_create_group(&self, name: &str) -> Result<(Group, bool), RepositoryError>;
    fn add_member(&self, group: GroupId, user: UserId) -> Result<(), RepositoryError>;
    fn is_member(&self, user: UserId, group_name: &str) -> Result<bool, RepositoryError>;
}

pub trait JobRepository: Send + Sync {
    fn insert_job(&self, job: NewJob) -> Result<Job, RepositoryError>;
    fn fetch_job(&self, id: JobId) -> Result<Option<Job>, RepositoryError>;
    /// All jobs in ascending id order.
    fn list_jobs(&self) -> Result<Vec<Job>, RepositoryError>;
    fn jobs_posted_by(&self, user: UserId) -> Result<Vec<Job>, RepositoryError>;
}

pub trait ApplicationRepository: Send + Sync {
    fn insert_application(
        &self,
        application: NewApplication,
    ) -> Result<Application, RepositoryError>;
    fn applications_by(&self, applicant: UserId) -> Result<Vec<Application>, RepositoryError>;
}

/// Server-side session table mapping opaque keys to users.
pub trait SessionRepository: Send + Sync {
    fn insert_session(&self, key: &str, user: UserId) -> Result<(), RepositoryError>;
    fn session_user(&self, key: &str) -> Result<Option<UserId>, RepositoryError>;
    fn remove_session(&self, key: &str) -> Result<(), RepositoryError>;
}

/// Everything the board service needs from persistence.
pub trait BoardStore:
    UserRepository + GroupRepository + JobRepository + ApplicationRepository + SessionRepository
{
}

impl<T> BoardStore for T where
    T: UserRepository + GroupRepository + JobRepository + ApplicationRepository + SessionRepository
{
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
