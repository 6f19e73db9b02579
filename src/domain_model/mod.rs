mod operation;
mod token;
mod user;

pub use operation::*;
pub use token::*;
pub use user::*;
