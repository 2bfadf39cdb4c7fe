//! Pure domain types: room settings, client roles, identifier validation.

pub mod session;
