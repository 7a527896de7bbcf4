//! # Submission handlers
//!
//! Every form submission runs the same steps:
//!
//! 1. **Gate**: only a POST carrying the form's `<prefix>nonce` field, outside the admin
//!    context, is handled. Anything else is [`Outcome::Ignored`].
//! 2. **Token**: the anti-forgery token must verify for the form key and session seed.
//! 3. **Sanitize** through the descriptor that rendered the form.
//! 4. **Validate** into [`FieldErrors`].
//! 5. **Mutate** the store.
//! 6. **Side effects** (payment capture, mail, role assignment).
//! 7. **Redirect** with [`StatusFlags`].
//!
//! Errors never escape a handler: they become [`Outcome::Rerender`] carrying the field
//! errors and one top-level message.

mod import;
mod login;
mod payment;
mod profile;

use chrono::{DateTime, Utc};
use serde::Serialize;
use store::{AccountId, MemberStore, Notice};

use crate::error::{PortalError, Result};
use crate::forms::{FormInput, FormKind};
use crate::portal::Portal;
use crate::shortcodes::StatusFlags;
use crate::validation::FieldErrors;
use crate::viewer::RequestScope;

pub use import::IMPORT_FORM_KEY;

/// One submitted form, with the request context handlers need.
pub struct Submission<'a> {
    pub scope: &'a RequestScope,
    pub input: &'a FormInput,
    /// The session's token seed.
    pub seed: &'a str,
    pub now: DateTime<Utc>,
    pub is_post: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "change", content = "account", rename_all = "snake_case")]
pub enum SessionChange {
    SignIn(AccountId),
    SignOut,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Ignored,
    Rerender {
        errors: FieldErrors,
        message: String,
        notices: Vec<Notice>,
    },
    Redirect {
        to: String,
        flags: StatusFlags,
        session: Option<SessionChange>,
        notices: Vec<Notice>,
    },
}

impl Outcome {
    fn redirect(to: &str, flags: StatusFlags) -> Self {
        Outcome::Redirect {
            to: flags.append_to(to),
            flags,
            session: None,
            notices: Vec::new(),
        }
    }

    fn with_session(mut self, change: SessionChange) -> Self {
        if let Outcome::Redirect { session, .. } = &mut self {
            *session = Some(change);
        }
        self
    }

    fn with_notices(mut self, extra: Vec<Notice>) -> Self {
        match &mut self {
            Outcome::Rerender { notices, .. } | Outcome::Redirect { notices, .. } => {
                notices.extend(extra)
            }
            Outcome::Ignored => {}
        }
        self
    }

    fn from_error(kind: &str, error: PortalError) -> Self {
        match &error {
            PortalError::Validation(_) | PortalError::InvalidCredentials => {
                tracing::info!(form = kind, error = %error, "submission rejected")
            }
            PortalError::Security | PortalError::Forbidden | PortalError::EntityMutation(_) => {
                tracing::warn!(form = kind, error = %error, "submission refused")
            }
            _ => tracing::error!(form = kind, error = %error, "submission failed"),
        }
        let message = error.user_message();
        let errors = match error {
            PortalError::Validation(errors) => errors,
            _ => FieldErrors::new(),
        };
        Outcome::Rerender {
            errors,
            message,
            notices: Vec::new(),
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Outcome::Redirect { .. })
    }
}

impl Submission<'_> {
    fn gate(&self, kind: FormKind) -> bool {
        self.is_post && !self.scope.is_admin_context() && self.input.contains(&kind.nonce_field())
    }
}

impl<S: MemberStore> Portal<S> {
    fn check_token(&self, form_key: &str, field: &str, submission: &Submission<'_>) -> Result<()> {
        let token = submission.input.get(field).unwrap_or_default();
        if self
            .tokens()
            .verify(token, form_key, submission.seed, submission.now)
        {
            Ok(())
        } else {
            Err(PortalError::Security)
        }
    }

    fn finish(kind: FormKind, result: Result<Outcome>, notices: Vec<Notice>) -> Outcome {
        result
            .unwrap_or_else(|e| Outcome::from_error(kind.key(), e))
            .with_notices(notices)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;
    use store::options::PortalOptions;
    use store::MemoryStore;

    use super::*;
    use crate::mail::{Email, Mailer};
    use crate::payment::{Capture, Charge, PaymentGateway};

    pub const SEED: &str = "session-seed";

    #[derive(Default)]
    pub struct FakeGateway {
        pub charges: Mutex<Vec<Charge>>,
        pub decline: Option<String>,
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn charge(
            &self,
            charge: &Charge,
            _: &PortalOptions,
        ) -> std::result::Result<Capture, String> {
            if let Some(reason) = &self.decline {
                return Err(reason.clone());
            }
            let mut charges = self.charges.lock().unwrap();
            charges.push(charge.clone());
            Ok(Capture {
                reference: format!("ch_{}", charges.len()),
            })
        }
    }

    #[derive(Default)]
    pub struct FakeMailer {
        pub sent: Mutex<Vec<Email>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Mailer for FakeMailer {
        async fn send(&self, email: &Email) -> std::result::Result<(), String> {
            if self.fail {
                return Err("smtp unavailable".into());
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    pub fn portal_with(
        gateway: Arc<FakeGateway>,
        mailer: Arc<FakeMailer>,
    ) -> Portal<MemoryStore> {
        Portal::builder(MemoryStore::new(), "test-secret")
            .gateway(gateway)
            .mailer(mailer)
            .build()
            .unwrap()
    }

    pub fn portal() -> Portal<MemoryStore> {
        portal_with(Arc::default(), Arc::default())
    }

    /// Form pairs for `form` plus a valid nonce.
    pub fn post(
        portal: &Portal<MemoryStore>,
        kind: FormKind,
        pairs: &[(&str, &str)],
    ) -> FormInput {
        let nonce = portal.tokens().issue(kind.key(), SEED, Utc::now());
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .chain([(kind.nonce_field(), nonce)])
            .collect()
    }

    pub fn submission<'a>(scope: &'a RequestScope, input: &'a FormInput) -> Submission<'a> {
        Submission {
            scope,
            input,
            seed: SEED,
            now: Utc::now(),
            is_post: true,
        }
    }

    pub fn rerender_errors(outcome: &Outcome) -> &FieldErrors {
        match outcome {
            Outcome::Rerender { errors, .. } => errors,
            other => panic!("expected rerender, got {:?}", other),
        }
    }

    pub fn rerender_message(outcome: &Outcome) -> &str {
        match outcome {
            Outcome::Rerender { message, .. } => message,
            other => panic!("expected rerender, got {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::shortcodes::StatusFlag;

    #[test]
    fn test_outcome_serializes_with_tag() {
        let flags: StatusFlags = [StatusFlag::MemberUpdated].into_iter().collect();
        let outcome =
            Outcome::redirect("/member-profile", flags).with_session(SessionChange::SignIn(4));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "redirect");
        assert_eq!(value["to"], "/member-profile?member_updated=true");
        assert_eq!(value["session"]["change"], "sign_in");
        assert_eq!(value["session"]["account"], 4);
    }

    #[tokio::test]
    async fn test_gate_ignores_get_admin_and_unmarked_posts() {
        let portal = portal();
        let input = post(&portal, FormKind::Login, &[]);
        let anonymous = RequestScope::anonymous();

        let mut get = submission(&anonymous, &input);
        get.is_post = false;
        assert_eq!(portal.handle_login(get).await, Outcome::Ignored);

        let admin = RequestScope::new(None, true);
        assert_eq!(
            portal.handle_login(submission(&admin, &input)).await,
            Outcome::Ignored
        );

        let unmarked = FormInput::default();
        assert_eq!(
            portal.handle_login(submission(&anonymous, &unmarked)).await,
            Outcome::Ignored
        );
    }
}
