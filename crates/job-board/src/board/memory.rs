use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationId, Group, GroupId, Job, JobId, NewApplication, NewJob, NewUser, User,
    UserId,
};
use super::repository::{
    ApplicationRepository, GroupRepository, JobRepository, RepositoryError, SessionRepository,
    UserRepository,
};

/// How long a session key stays valid after it is issued.
pub const DEFAULT_SESSION_LIFETIME_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Membership {
    group: GroupId,
    user: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Session {
    user: UserId,
    issued_at: DateTime<Utc>,
}

/// Last id handed out per table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Sequences {
    user: u64,
    group: u64,
    job: u64,
    application: u64,
}

fn advance(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

/// Serializable snapshot of every table. Records are kept in ascending id order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BoardState {
    sequences: Sequences,
    users: Vec<User>,
    groups: Vec<Group>,
    memberships: Vec<Membership>,
    jobs: Vec<Job>,
    applications: Vec<Application>,
    sessions: BTreeMap<String, Session>,
}

/// Result of a mutation: the value handed back and whether any table changed.
struct Change<T> {
    value: T,
    dirty: bool,
}

impl<T> Change<T> {
    fn written(value: T) -> Self {
        Self { value, dirty: true }
    }

    fn unchanged(value: T) -> Self {
        Self {
            value,
            dirty: false,
        }
    }
}

/// Mutex-guarded store backing every repository trait.
///
/// With a snapshot path the whole state is rewritten as JSON after each mutation, which keeps
/// data across restarts and lets the `init-groups` command share state with the server. A
/// mutation only becomes visible once its snapshot has been written.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<BoardState>,
    snapshot: Option<PathBuf>,
    session_lifetime: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            state: Mutex::default(),
            snapshot: None,
            session_lifetime: Duration::days(DEFAULT_SESSION_LIFETIME_DAYS),
        }
    }
}

impl MemoryStore {
    /// Open a store persisted at `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let state = if path.exists() {
            let raw = fs::read(&path).map_err(|err| unavailable(&path, err))?;
            serde_json::from_slice(&raw).map_err(|err| unavailable(&path, err))?
        } else {
            BoardState::default()
        };

        Ok(Self {
            state: Mutex::new(state),
            snapshot: Some(path),
            ..Self::default()
        })
    }

    pub fn with_session_lifetime(mut self, lifetime: Duration) -> Self {
        self.session_lifetime = lifetime;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, BoardState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    /// Apply `change` to a copy of the state, write the copy, then swap it in. A failed
    /// snapshot write leaves the live state untouched.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut BoardState) -> Result<Change<T>, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut state = self.lock()?;
        if self.snapshot.is_none() {
            return change(&mut state).map(|change| change.value);
        }

        let mut candidate = state.clone();
        let outcome = change(&mut candidate)?;
        if outcome.dirty {
            self.persist(&candidate)?;
            *state = candidate;
        }
        Ok(outcome.value)
    }

    fn persist(&self, state: &BoardState) -> Result<(), RepositoryError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| unavailable(path, err))?;
        }
        let encoded = serde_json::to_vec_pretty(state).map_err(|err| unavailable(path, err))?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, encoded).map_err(|err| unavailable(path, err))?;
        fs::rename(&staging, path).map_err(|err| unavailable(path, err))
    }

    fn session_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        session.issued_at + self.session_lifetime <= now
    }
}

fn unavailable(path: &Path, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(format!("{}: {err}", path.display()))
}

impl UserRepository for MemoryStore {
    fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        self.mutate(|state| {
            let wanted = user.username.to_lowercase();
            if state
                .users
                .iter()
                .any(|existing| existing.username.to_lowercase() == wanted)
            {
                return Err(RepositoryError::Conflict);
            }

            let record = User {
                id: UserId(advance(&mut state.sequences.user)),
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                is_active: true,
                date_joined: Utc::now(),
            };
            state.users.push(record.clone());
            Ok(Change::written(record))
        })
    }

    fn fetch_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.users.iter().find(|user| user.id == id).cloned())
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    fn username_taken(&self, username: &str) -> Result<bool, RepositoryError> {
        let wanted = username.to_lowercase();
        let state = self.lock()?;
        Ok(state
            .users
            .iter()
            .any(|user| user.username.to_lowercase() == wanted))
    }
}

impl GroupRepository for MemoryStore {
    fn get_or_create_group(&self, name: &str) -> Result<(Group, bool), RepositoryError> {
        self.mutate(|state| {
            if let Some(group) = state.groups.iter().find(|group| group.name == name) {
                return Ok(Change::unchanged((group.clone(), false)));
            }

            let group = Group {
                id: GroupId(advance(&mut state.sequences.group)),
                name: name.to_string(),
            };
            state.groups.push(group.clone());
            Ok(Change::written((group, true)))
        })
    }

    fn add_member(&self, group: GroupId, user: UserId) -> Result<(), RepositoryError> {
        self.mutate(|state| {
            let known_group = state.groups.iter().any(|existing| existing.id == group);
            let known_user = state.users.iter().any(|existing| existing.id == user);
            if !known_group || !known_user {
                return Err(RepositoryError::NotFound);
            }

            let membership = Membership { group, user };
            if state.memberships.contains(&membership) {
                return Ok(Change::unchanged(()));
            }
            state.memberships.push(membership);
            Ok(Change::written(()))
        })
    }

    fn is_member(&self, user: UserId, group_name: &str) -> Result<bool, RepositoryError> {
        let state = self.lock()?;
        let Some(group) = state.groups.iter().find(|group| group.name == group_name) else {
            return Ok(false);
        };
        Ok(state
            .memberships
            .contains(&Membership {
                group: group.id,
                user,
            }))
    }
}

impl JobRepository for MemoryStore {
    fn insert_job(&self, job: NewJob) -> Result<Job, RepositoryError> {
        self.mutate(|state| {
            let record = Job {
                id: JobId(advance(&mut state.sequences.job)),
                title: job.title,
                company_name: job.company_name,
                location: job.location,
                description: job.description,
                posted_by: job.posted_by,
                created_at: job.created_at,
            };
            state.jobs.push(record.clone());
            Ok(Change::written(record))
        })
    }

    fn fetch_job(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.jobs.iter().find(|job| job.id == id).cloned())
    }

    fn list_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.jobs.clone())
    }

    fn jobs_posted_by(&self, user: UserId) -> Result<Vec<Job>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .jobs
            .iter()
            .filter(|job| job.posted_by == user)
            .cloned()
            .collect())
    }
}

impl ApplicationRepository for MemoryStore {
    fn insert_application(
        &self,
        application: NewApplication,
    ) -> Result<Application, RepositoryError> {
        self.mutate(|state| {
            let record = Application {
                id: ApplicationId(advance(&mut state.sequences.application)),
                job: application.job,
                applicant: application.applicant,
                resume: application.resume,
                cover_letter: application.cover_letter,
                applied_at: application.applied_at,
            };
            state.applications.push(record.clone());
            Ok(Change::written(record))
        })
    }

    fn applications_by(&self, applicant: UserId) -> Result<Vec<Application>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .applications
            .iter()
            .filter(|application| application.applicant == applicant)
            .cloned()
            .collect())
    }
}

impl SessionRepository for MemoryStore {
    /// Issuing a key also drops every expired one.
    fn insert_session(&self, key: &str, user: UserId) -> Result<(), RepositoryError> {
        let now = Utc::now();
        self.mutate(|state| {
            state
                .sessions
                .retain(|_, session| !self.session_expired(session, now));
            state.sessions.insert(
                key.to_string(),
                Session {
                    user,
                    issued_at: now,
                },
            );
            Ok(Change::written(()))
        })
    }

    fn session_user(&self, key: &str) -> Result<Option<UserId>, RepositoryError> {
        let now = Utc::now();
        let state = self.lock()?;
        Ok(state
            .sessions
            .get(key)
            .filter(|session| !self.session_expired(session, now))
            .map(|session| session.user))
    }

    fn remove_session(&self, key: &str) -> Result<(), RepositoryError> {
        self.mutate(|state| match state.sessions.remove(key) {
            Some(_) => Ok(Change::written(())),
            None => Ok(Change::unchanged(())),
        })
    }
}
