pub mod token;
pub mod user;

pub use token::{SessionToken, TokenResponse, BEARER};
pub use user::{User, UserRead};
