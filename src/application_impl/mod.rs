mod auth_service_impl;
pub mod cache_policy;
mod music_service_impl;
mod session_codec_jwt;
mod spotify_accounts;
mod token_lifecycle_impl;

pub use auth_service_impl::*;
pub use music_service_impl::*;
pub use session_codec_jwt::*;
pub use spotify_accounts::*;
pub use token_lifecycle_impl::*;
