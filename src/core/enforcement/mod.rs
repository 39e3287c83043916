// Core enforcement module - warning escalation and bans.
// Following the same pattern as the moderation module.

pub mod enforcement_models;
pub mod enforcement_service;

pub use enforcement_models::*;
pub use enforcement_service::*;
