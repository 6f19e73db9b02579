mod auth_service;
mod music_service;
mod token_lifecycle;

pub use auth_service::*;
pub use music_service::*;
pub use token_lifecycle::*;
