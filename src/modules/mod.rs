pub mod auth;
pub mod content;
pub mod favorites;
pub mod progress;
