//! Role resolution from group membership.
//!
//! A role is never cached on the user: every check asks the store, so a membership change
//! takes effect on the next request.

use serde::{Deserialize, Serialize};

use super::domain::User;
use super::repository::{GroupRepository, RepositoryError};

pub const EMPLOYER_GROUP: &str = "Employer";
pub const APPLICANT_GROUP: &str = "Applicant";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employer,
    Applicant,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Employer, Role::Applicant];

    /// Value submitted by the signup form's radio buttons.
    pub fn choice(self) -> &'static str {
        match self {
            Role::Employer => "employer",
            Role::Applicant => "applicant",
        }
    }

    pub fn label(self) -> &'static str {
        self.group_name()
    }

    pub fn group_name(self) -> &'static str {
        match self {
            Role::Employer => EMPLOYER_GROUP,
            Role::Applicant => APPLICANT_GROUP,
        }
    }

    pub fn from_choice(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.choice() == value)
    }
}

pub fn is_employer<G>(groups: &G, user: &User) -> Result<bool, RepositoryError>
where
    G: GroupRepository + ?Sized,
{
    groups.is_member(user.id, EMPLOYER_GROUP)
}

pub fn is_applicant<G>(groups: &G, user: &User) -> Result<bool, RepositoryError>
where
    G: GroupRepository + ?Sized,
{
    groups.is_member(user.id, APPLICANT_GROUP)
}

/// Employer wins when a user somehow holds both memberships.
pub fn resolve_role<G>(groups: &G, user: &User) -> Result<Option<Role>, RepositoryError>
where
    G: GroupRepository + ?Sized,
{
    if is_employer(groups, user)? {
        return Ok(Some(Role::Employer));
    }
    if is_applicant(groups, user)? {
        return Ok(Some(Role::Applicant));
    }
    Ok(None)
}
