//! Schola Core — domain models, repository contracts, and shared error
//! types for the authentication and two-factor verification core.

pub mod error;
pub mod models;
pub mod repository;
