//! Jobs, applications and the accounts behind them.
//!
//! Roles are not stored on users: a user is an employer or an applicant by membership in the
//! group of the same name, and every page re-derives the role on each request.

pub mod auth;
pub mod domain;
pub mod forms;
pub mod memory;
pub mod repository;
pub mod roles;
pub mod router;
pub mod service;
pub mod storage;
pub mod views;

#[cfg(test)]
mod tests;

pub use domain::{
    Application, ApplicationId, ApplicationSummary, Group, GroupId, Job, JobId, NewApplication,
    NewJob, NewUser, User, UserId,
};
pub use forms::{ApplicationForm, FormErrors, JobForm, LoginForm, SignUpForm};
pub use memory::MemoryStore;
pub use repository::{
    ApplicationRepository, BoardStore, GroupRepository, JobRepository, RepositoryError,
    SessionRepository, UserRepository,
};
pub use roles::{Role, APPLICANT_GROUP, EMPLOYER_GROUP};
pub use router::board_router;
pub use service::{BoardError, Dashboard, GroupProvision, JobBoardService, SignedIn};
pub use storage::{FilesystemResumeStorage, ResumeStorage, ResumeUpload, StorageError};
