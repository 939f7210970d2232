//! Server-rendered job board: employers post jobs, applicants search and apply, and each
//! signed-in user lands on a dashboard matching the role derived from their group membership.

pub mod board;
pub mod config;
pub mod error;
pub mod telemetry;
