pub mod jwt;
pub mod models;
pub mod session;

pub use session::{Session, SessionError, TokenStore};
