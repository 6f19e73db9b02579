mod error;
mod handler;
mod router;

pub use error::recover_error;
pub use router::{cors, routes};
