//! Domain layer for the users domain

pub mod entities;
