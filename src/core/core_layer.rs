// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "moderation/moderation_layer.rs"]
pub mod moderation;

#[path = "enforcement/mod.rs"]
pub mod enforcement;
