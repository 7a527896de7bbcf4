use std::collections::BTreeSet;

use store::{
    AccountId, MemberAccount, MemberStatus, MemberStore, NewAccount, Profile, StoreError,
};

use super::{Outcome, SessionChange, Submission};
use crate::auth::hash_password;
use crate::error::{PortalError, Result};
use crate::fields::core::{ids, profile_key};
use crate::fields::FieldType;
use crate::forms::{FormDescriptor, FormInput, FormKind, SanitizedValues};
use crate::portal::Portal;
use crate::roles::RoleRegistry;
use crate::shortcodes::{StatusFlag, StatusFlags};
use crate::validation::{error_key, normalize_phones, validate_profile, FieldErrors};
use crate::viewer::{RequestScope, Viewer};

const LOGIN_TAKEN: &str = "Sorry, that username already exists!";
const EMAIL_TAKEN: &str = "Sorry, that email address is already used!";

/// Copy every profile-backed field the form rendered into `profile`.
fn apply_values(
    profile: &mut Profile,
    form: &FormDescriptor,
    values: &SanitizedValues,
) -> Result<()> {
    let mut errors = FieldErrors::new();
    for field in &form.fields {
        let (Some(key), Some(value)) = (profile_key(&field.id), values.get(&field.id)) else {
            continue;
        };
        // Uploads are handled elsewhere; an empty file input keeps the stored value.
        if field.field_type == FieldType::File && value.is_blank() {
            continue;
        }
        if let Err(StoreError::InvalidValue(_)) = profile.set_value(key, value.clone()) {
            errors.insert(
                error_key(&field.id).to_string(),
                format!("{} is not valid.", field.label),
            );
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(PortalError::Validation(errors))
    }
}

fn mutation_error(error: StoreError) -> PortalError {
    match error {
        StoreError::Duplicate(what) if what.starts_with("login") => {
            PortalError::EntityMutation(LOGIN_TAKEN.into())
        }
        StoreError::Duplicate(_) => PortalError::EntityMutation(EMAIL_TAKEN.into()),
        other => other.into(),
    }
}

impl<S: MemberStore> Portal<S> {
    /// Registration for non-members, profile update for members.
    pub async fn handle_profile(&self, submission: Submission<'_>) -> Outcome {
        if !submission.gate(FormKind::Profile) {
            return Outcome::Ignored;
        }
        let result = self.process_profile(&submission).await;
        Self::finish(FormKind::Profile, result, Vec::new())
    }

    async fn process_profile(&self, submission: &Submission<'_>) -> Result<Outcome> {
        let kind = FormKind::Profile;
        self.check_token(kind.key(), &kind.nonce_field(), submission)?;

        let options = self.repo().options().await?;
        let viewer = submission.scope.viewer();
        let form = self.form(kind, submission.scope, &options, submission.seed, submission.now);
        let mut values = form.sanitize(submission.input);

        let member = submission.scope.account().filter(|_| viewer == Viewer::Member);
        let login = match member {
            Some(account) => account.login.clone(),
            None => values.text(ids::LOGIN).trim().to_string(),
        };
        let errors = validate_profile(&form, &values, viewer, &login);
        if !errors.is_empty() {
            return Err(PortalError::Validation(errors));
        }
        normalize_phones(&mut values);
        values.drop_blank_rows();

        let to = options.pages.profile.clone();
        let flags: StatusFlags = [StatusFlag::MemberUpdated].into_iter().collect();
        match member {
            Some(account) => {
                self.update_member(account.id, &form, &values).await?;
                Ok(Outcome::redirect(&to, flags))
            }
            None => {
                let account = self
                    .register(&form, &values, &login, &options, submission)
                    .await?;
                Ok(Outcome::redirect(&to, flags).with_session(SessionChange::SignIn(account.id)))
            }
        }
    }

    /// Member type changes go through payment, so the type field is ignored here.
    async fn update_member(
        &self,
        id: AccountId,
        form: &FormDescriptor,
        values: &SanitizedValues,
    ) -> Result<MemberAccount> {
        let store = self.repo().store();
        let mut account = store
            .account(id)
            .await?
            .ok_or_else(|| PortalError::EntityMutation("Your account could not be found.".into()))?;

        let address = account.profile.address_line();
        apply_values(&mut account.profile, form, values)?;
        if account.profile.address_line() != address {
            account.profile.geocode = None;
            account.profile.geocode_failures = 0;
        }
        account.display_name = account.profile.company_name.clone();

        let password = values.text(ids::PASS);
        if !password.is_empty() {
            account.password_hash = hash_password(password)?;
        }

        store.update_account(&account).await.map_err(mutation_error)?;
        tracing::info!(account = account.id, password_changed = !password.is_empty(), "member profile updated");
        Ok(account)
    }

    async fn register(
        &self,
        form: &FormDescriptor,
        values: &SanitizedValues,
        login: &str,
        options: &store::PortalOptions,
        submission: &Submission<'_>,
    ) -> Result<MemberAccount> {
        let member_type = options
            .member_type_by_slug(values.text(ids::MEMBER_TYPE))
            .ok_or_else(|| {
                PortalError::Validation(FieldErrors::from([(
                    error_key(ids::MEMBER_TYPE).to_string(),
                    format!("Please choose a {}.", options.member_type_label()),
                )]))
            })?;

        let mut profile = Profile::default();
        apply_values(&mut profile, form, values)?;
        profile.member_status = MemberStatus::Inactive;
        profile.member_date_joined = Some(submission.now.date_naive());

        let store = self.repo().store();
        if store.account_by_login(login).await?.is_some() {
            return Err(PortalError::EntityMutation(LOGIN_TAKEN.into()));
        }
        let email = profile.company_email.trim().to_string();
        if store.account_by_email(&email).await?.is_some() {
            return Err(PortalError::EntityMutation(EMAIL_TAKEN.into()));
        }

        let mut account = store
            .insert_account(NewAccount {
                login: login.to_string(),
                email,
                password_hash: hash_password(values.text(ids::PASS))?,
                display_name: profile.company_name.clone(),
                roles: BTreeSet::new(),
                hide_admin_bar: true,
                profile,
            })
            .await
            .map_err(mutation_error)?;
        RoleRegistry::new(self.repo())
            .assign(&mut account, &member_type.role_slug())
            .await?;
        tracing::info!(account = account.id, login = %account.login, member_type = %member_type.name, "member registered");
        Ok(account)
    }

    /// Admin edit of another account's profile, including status and dates.
    pub async fn save_admin_profile(
        &self,
        scope: &RequestScope,
        id: AccountId,
        input: &FormInput,
        seed: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<MemberAccount> {
        if scope.viewer() != Viewer::Admin {
            return Err(PortalError::Forbidden);
        }
        let kind = FormKind::Profile;
        let submission = Submission {
            scope,
            input,
            seed,
            now,
            is_post: true,
        };
        self.check_token(kind.key(), &kind.nonce_field(), &submission)?;

        let options = self.repo().options().await?;
        let form = self.form(kind, scope, &options, seed, now);
        let mut values = form.sanitize(input);
        let errors = validate_profile(&form, &values, Viewer::Admin, "");
        if !errors.is_empty() {
            return Err(PortalError::Validation(errors));
        }
        normalize_phones(&mut values);
        values.drop_blank_rows();

        let store = self.repo().store();
        let mut account = store
            .account(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("account {}", id)))?;
        let address = account.profile.address_line();
        apply_values(&mut account.profile, &form, &values)?;
        if account.profile.address_line() != address {
            account.profile.geocode = None;
            account.profile.geocode_failures = 0;
        }
        account.display_name = account.profile.company_name.clone();
        store.update_account(&account).await.map_err(mutation_error)?;
        tracing::info!(account = id, "profile saved by admin");
        Ok(account)
    }
}
