//! Form schemas bound to the HTML forms, with field-level error reporting.
//!
//! Declarative limits (lengths, email syntax) use `validator`; rules that need several fields
//! or the store (password strength, username uniqueness) are checked by hand in `clean`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer};
use validator::{Validate, ValidationErrors};

use super::roles::Role;
use super::storage::ResumeUpload;

pub const REQUIRED: &str = "This field is required.";
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_SIMILARITY: f64 = 0.7;

const COMMON_PASSWORDS: &[&str] = &[
    "123456", "123456789", "12345678", "password", "qwerty123", "qwertyuiop", "password1",
    "iloveyou", "1q2w3e4r", "sunshine", "princess", "football", "baseball", "welcome1",
    "letmein1", "trustno1", "superman", "whatever", "starwars", "passw0rd", "abc12345",
    "dragon123", "monkey123", "michael1", "11111111", "00000000", "computer", "internet",
];

/// Field name to messages, in field order for stable rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn absorb(&mut self, errors: ValidationErrors) {
        for (field, failures) in errors.field_errors() {
            for failure in failures {
                let message = failure
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({}).", failure.code));
                self.add(&field.to_string(), message);
            }
        }
    }

    fn require(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            self.add(field, REQUIRED);
        }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .fields
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect();
        write!(f, "{}", rendered.join("; "))
    }
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_string())
}

fn optional_trimmed<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}

/// Posting form. The owner is never read from the request.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct JobForm {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub title: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(max = 200, message = "Ensure this value has at most 200 characters."))]
    pub company_name: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(max = 100, message = "Ensure this value has at most 100 characters."))]
    pub location: String,
    #[serde(deserialize_with = "trimmed")]
    pub description: String,
}

/// Validated posting fields, ready to be owned by an employer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDraft {
    pub title: String,
    pub company_name: String,
    pub location: String,
    pub description: String,
}

impl JobForm {
    pub fn clean(&self) -> Result<JobDraft, FormErrors> {
        let mut errors = FormErrors::default();
        errors.require("title", &self.title);
        errors.require("company_name", &self.company_name);
        errors.require("location", &self.location);
        errors.require("description", &self.description);
        if let Err(failures) = self.validate() {
            errors.absorb(failures);
        }
        errors.into_result()?;

        Ok(JobDraft {
            title: self.title.clone(),
            company_name: self.company_name.clone(),
            location: self.location.clone(),
            description: self.description.clone(),
        })
    }
}

/// Application form assembled from a multipart body.
#[derive(Debug, Clone, Default)]
pub struct ApplicationForm {
    pub resume: Option<ResumeUpload>,
    pub cover_letter: String,
}

impl ApplicationForm {
    pub fn clean(self) -> Result<(ResumeUpload, String), FormErrors> {
        let mut errors = FormErrors::default();
        let cover_letter = self.cover_letter.trim().to_string();

        // Browsers submit an unnamed empty part when no file was chosen.
        let resume = match self.resume {
            Some(upload) if upload.file_name.is_empty() => None,
            other => other,
        };
        match &resume {
            None => errors.add("resume", REQUIRED),
            Some(upload) if upload.bytes.is_empty() => {
                errors.add("resume", "The submitted file is empty.")
            }
            Some(_) => {}
        }
        errors.require("cover_letter", &cover_letter);

        match resume {
            Some(upload) if errors.is_empty() => Ok((upload, cover_letter)),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SignUpForm {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub username: String,
    #[serde(deserialize_with = "optional_trimmed")]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    pub password1: String,
    pub password2: String,
    #[serde(deserialize_with = "trimmed")]
    pub role: String,
}

/// Signup fields that passed every check except username uniqueness, which needs the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpDraft {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub role: Role,
}

impl SignUpForm {
    pub fn clean(&self) -> Result<SignUpDraft, FormErrors> {
        let mut errors = FormErrors::default();

        errors.require("username", &self.username);
        if !self.username.is_empty() && !valid_username(&self.username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
        errors.require("password1", &self.password1);
        errors.require("password2", &self.password2);
        if !self.password1.is_empty() && !self.password2.is_empty() {
            if self.password1 != self.password2 {
                errors.add("password2", "The two password fields didn't match.");
            } else {
                for problem in
                    password_problems(&self.password2, &self.username, self.email.as_deref())
                {
                    errors.add("password2", problem);
                }
            }
        }

        let role = if self.role.is_empty() {
            errors.add("role", REQUIRED);
            None
        } else {
            let parsed = Role::from_choice(&self.role);
            if parsed.is_none() {
                errors.add(
                    "role",
                    format!(
                        "Select a valid choice. {} is not one of the available choices.",
                        self.role
                    ),
                );
            }
            parsed
        };

        if let Err(failures) = self.validate() {
            errors.absorb(failures);
        }

        match role {
            Some(role) if errors.is_empty() => Ok(SignUpDraft {
                username: self.username.clone(),
                email: self.email.clone(),
                password: self.password1.clone(),
                role,
            }),
            _ => Err(errors),
        }
    }

    pub fn selected(&self, role: &Role) -> bool {
        self.role == role.choice()
    }

    pub fn email_value(&self) -> &str {
        self.email.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

fn valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

/// Strength rules applied to a new password, as user-facing messages.
pub fn password_problems(password: &str, username: &str, email: Option<&str>) -> Vec<String> {
    let mut problems = Vec::new();

    let attributes = [("username", Some(username)), ("email address", email)];
    for (label, value) in attributes {
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            if too_similar(password, value) {
                problems.push(format!("The password is too similar to the {label}."));
            }
        }
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }
    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.".to_string());
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }

    problems
}

/// Compares the password against the whole attribute and each of its word fragments.
fn too_similar(password: &str, attribute: &str) -> bool {
    let password = password.to_lowercase();
    let attribute = attribute.to_lowercase();
    std::iter::once(attribute.as_str())
        .chain(attribute.split(|c: char| !(c.is_alphanumeric() || c == '_')))
        .filter(|part| !part.is_empty())
        .any(|part| overlap_ratio(&password, part) >= MAX_SIMILARITY)
}

/// Shared characters (as a multiset) relative to the combined length, in `0.0..=1.0`.
fn overlap_ratio(left: &str, right: &str) -> f64 {
    let total = left.chars().count() + right.chars().count();
    if total == 0 {
        return 1.0;
    }

    let mut available: BTreeMap<char, usize> = BTreeMap::new();
    for c in right.chars() {
        *available.entry(c).or_default() += 1;
    }
    let mut matches = 0usize;
    for c in left.chars() {
        if let Some(count) = available.get_mut(&c).filter(|count| **count > 0) {
            *count -= 1;
            matches += 1;
        }
    }

    (2 * matches) as f64 / total as f64
}
