//! Password hashing, session keys and anti-forgery tokens.

pub mod password;
mod session;
mod token;

pub use password::{hash_password, random_password, verify_password};
pub use session::{SESSION_TOKEN_SEED_KEY, SESSION_USER_ID_KEY};
#[cfg(feature = "server")]
pub use session::{current_account_id, token_seed};
pub use token::TokenSigner;
