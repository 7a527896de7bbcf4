//! # Anti-forgery tokens
//!
//! A token is `hex(hmac_sha256(secret, form key | session seed | tick))` where a tick
//! is a 12-hour window since the Unix epoch. Verification accepts the current and the
//! previous tick, so a token lives between 12 and 24 hours.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TICK_SECONDS: i64 = 12 * 60 * 60;

#[derive(Clone)]
pub struct TokenSigner {
    secret: String,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

fn tick(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(TICK_SECONDS) + 1
}

impl TokenSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self, form_key: &str, seed: &str, tick: i64) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        let tick = tick.to_string();
        for part in [form_key, seed, tick.as_str()] {
            mac.update(part.as_bytes());
            mac.update(b"|");
        }
        Some(mac)
    }

    fn sign(&self, form_key: &str, seed: &str, tick: i64) -> String {
        self.mac(form_key, seed, tick)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    /// Issue a token for `form_key` bound to the session seed.
    pub fn issue(&self, form_key: &str, seed: &str, now: DateTime<Utc>) -> String {
        self.sign(form_key, seed, tick(now))
    }

    pub fn verify(&self, token: &str, form_key: &str, seed: &str, now: DateTime<Utc>) -> bool {
        let Ok(signature) = hex::decode(token) else {
            return false;
        };
        if signature.is_empty() {
            return false;
        }
        let current = tick(now);
        [current, current - 1].into_iter().any(|t| {
            self.mac(form_key, seed, t)
                .is_some_and(|mac| mac.verify_slice(&signature).is_ok())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_token_accepted_for_two_ticks() {
        let signer = TokenSigner::new("s3cret");
        let now = Utc::now();
        let token = signer.issue("asamp_user_edit", "seed", now);
        assert_eq!(token.len(), 64);
        assert!(signer.verify(&token, "asamp_user_edit", "seed", now));
        assert!(signer.verify(&token, "asamp_user_edit", "seed", now + Duration::hours(12)));
        assert!(!signer.verify(&token, "asamp_user_edit", "seed", now + Duration::hours(25)));
    }

    #[test]
    fn test_token_scoped_to_form_and_session() {
        let signer = TokenSigner::new("s3cret");
        let now = Utc::now();
        let token = signer.issue("asamp_user_edit", "seed", now);
        assert!(!signer.verify(&token, "asamp_login_form", "seed", now));
        assert!(!signer.verify(&token, "asamp_user_edit", "other-seed", now));
        assert!(!TokenSigner::new("other").verify(&token, "asamp_user_edit", "seed", now));
        assert!(!signer.verify("", "asamp_user_edit", "seed", now));
    }

    #[test]
    fn test_tampered_or_malformed_token_rejected() {
        let signer = TokenSigner::new("s3cret");
        let now = Utc::now();
        let token = signer.issue("asamp_user_edit", "seed", now);
        let mut flipped = token.clone().into_bytes();
        flipped[0] = if flipped[0] == b'0' { b'1' } else { b'0' };
        let flipped = String::from_utf8(flipped).unwrap();
        assert!(!signer.verify(&flipped, "asamp_user_edit", "seed", now));
        assert!(!signer.verify(&token[..32], "asamp_user_edit", "seed", now));
        assert!(!signer.verify("not-hex", "asamp_user_edit", "seed", now));
    }
}
