pub mod handlers;
pub mod password;
pub mod tokens;

pub use tokens::{TokenConfig, TokenKind, TokenPair, TokenService};
