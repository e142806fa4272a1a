//! HTTP handlers for users and groups

pub mod groups;
pub mod users;
