//! # Web API Request Handlers

pub mod changes;
pub mod health;
