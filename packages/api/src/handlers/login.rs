use store::{MemberAccount, MemberStore};

use super::{Outcome, SessionChange, Submission};
use crate::auth::verify_password;
use crate::error::{PortalError, Result};
use crate::fields::core::ids;
use crate::forms::FormKind;
use crate::portal::Portal;
use crate::shortcodes::{StatusFlag, StatusFlags};
use crate::validation::check_required;

impl<S: MemberStore> Portal<S> {
    /// Sign in by username or email.
    pub async fn handle_login(&self, submission: Submission<'_>) -> Outcome {
        if !submission.gate(FormKind::Login) {
            return Outcome::Ignored;
        }
        let result = self.process_login(&submission).await;
        Self::finish(FormKind::Login, result, Vec::new())
    }

    async fn process_login(&self, submission: &Submission<'_>) -> Result<Outcome> {
        let kind = FormKind::Login;
        self.check_token(kind.key(), &kind.nonce_field(), submission)?;

        let options = self.repo().options().await?;
        let form = self.form(kind, submission.scope, &options, submission.seed, submission.now);
        let values = form.sanitize(submission.input);
        let mut errors = Default::default();
        check_required(&form, &values, &mut errors);
        if !errors.is_empty() {
            return Err(PortalError::Validation(errors));
        }

        let name = values.text(ids::LOGIN_USERNAME).trim();
        let account = self
            .find_login(name)
            .await?
            .ok_or(PortalError::InvalidCredentials)?;
        if !verify_password(values.text(ids::LOGIN_PASSWORD), &account.password_hash).unwrap_or(false) {
            tracing::info!(account = account.id, "wrong password");
            return Err(PortalError::InvalidCredentials);
        }

        tracing::info!(account = account.id, "signed in");
        let flags: StatusFlags = [StatusFlag::MemberLoggedIn].into_iter().collect();
        Ok(Outcome::redirect(&options.pages.after_login, flags)
            .with_session(SessionChange::SignIn(account.id)))
    }

    async fn find_login(&self, name: &str) -> Result<Option<MemberAccount>> {
        let store = self.repo().store();
        if let Some(account) = store.account_by_login(name).await? {
            return Ok(Some(account));
        }
        if name.contains('@') {
            return Ok(store.account_by_email(name).await?);
        }
        Ok(None)
    }

    pub async fn handle_logout(&self, submission: Submission<'_>) -> Outcome {
        if !submission.gate(FormKind::Logout) {
            return Outcome::Ignored;
        }
        let result = self.process_logout(&submission).await;
        Self::finish(FormKind::Logout, result, Vec::new())
    }

    async fn process_logout(&self, submission: &Submission<'_>) -> Result<Outcome> {
        let kind = FormKind::Logout;
        self.check_token(kind.key(), &kind.nonce_field(), submission)?;
        let options = self.repo().options().await?;
        if let Some(account) = submission.scope.account() {
            tracing::info!(account = account.id, "signed out");
        }
        let flags: StatusFlags = [StatusFlag::MemberLoggedOut].into_iter().collect();
        Ok(Outcome::redirect(&options.pages.after_logout, flags).with_session(SessionChange::SignOut))
    }
}
