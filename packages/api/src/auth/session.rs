//! Session keys.

/// Key for storing the signed-in account id in the session.
pub const SESSION_USER_ID_KEY: &str = "user_id";

/// Key for the random per-session seed that anti-forgery tokens are bound to.
pub const SESSION_TOKEN_SEED_KEY: &str = "form_seed";

#[cfg(feature = "server")]
pub use server::{current_account_id, token_seed};

#[cfg(feature = "server")]
mod server {
    use store::AccountId;
    use tower_sessions::Session;

    use super::{SESSION_TOKEN_SEED_KEY, SESSION_USER_ID_KEY};
    use crate::auth::password::random_password;

    /// The account id stored by a successful sign-in, if any.
    pub async fn current_account_id(
        session: &Session,
    ) -> Result<Option<AccountId>, tower_sessions::session::Error> {
        session.get::<AccountId>(SESSION_USER_ID_KEY).await
    }

    /// The session's token seed, created on first use.
    pub async fn token_seed(session: &Session) -> Result<String, tower_sessions::session::Error> {
        if let Some(seed) = session.get::<String>(SESSION_TOKEN_SEED_KEY).await? {
            return Ok(seed);
        }
        let seed = random_password(32);
        session.insert(SESSION_TOKEN_SEED_KEY, &seed).await?;
        Ok(seed)
    }
}
