// store

mod response_cache;
mod token_store;
mod user_repo;

pub use response_cache::*;
pub use token_store::*;
pub use user_repo::*;

// upstream

mod oauth_provider;
mod upstream_client;

pub use oauth_provider::*;
pub use upstream_client::*;
