//! The portal context: store, field registries, token signer and external seams.
//!
//! A [`Portal`] is assembled once at startup through [`PortalBuilder`], where
//! collaborators may register extra fields, and is then shared (read-only) by every
//! request. Submission handlers live in [`crate::handlers`], page rendering in
//! [`crate::pages`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use store::options::PortalOptions;
use store::{MemberRepository, MemberStore};

use crate::auth::TokenSigner;
use crate::fields::core::{login_fields, payment_fields};
use crate::fields::{FieldDefinition, FieldRegistry, FieldRegistryBuilder, RegistryError};
use crate::forms::{FormBuilder, FormDescriptor, FormKind};
use crate::geocode::GeocodeService;
use crate::mail::{LogMailer, Mailer};
use crate::payment::{DisabledGateway, PaymentGateway};
use crate::viewer::RequestScope;

pub struct Portal<S: MemberStore> {
    repo: MemberRepository<S>,
    profile_fields: FieldRegistry,
    login_fields: FieldRegistry,
    payment_fields: FieldRegistry,
    tokens: TokenSigner,
    pub(crate) gateway: Arc<dyn PaymentGateway>,
    pub(crate) mailer: Arc<dyn Mailer>,
    pub(crate) geocoder: Option<GeocodeService>,
}

impl<S: MemberStore> Portal<S> {
    pub fn builder(store: S, token_secret: impl Into<String>) -> PortalBuilder<S> {
        PortalBuilder::new(store, token_secret)
    }

    pub fn repo(&self) -> &MemberRepository<S> {
        &self.repo
    }

    pub fn tokens(&self) -> &TokenSigner {
        &self.tokens
    }

    pub fn geocoder(&self) -> Option<&GeocodeService> {
        self.geocoder.as_ref()
    }

    /// The registry backing a form. The sign-out form has no fields.
    pub fn fields(&self, kind: FormKind) -> Option<&FieldRegistry> {
        match kind {
            FormKind::Profile => Some(&self.profile_fields),
            FormKind::Login => Some(&self.login_fields),
            FormKind::Payment => Some(&self.payment_fields),
            FormKind::Logout => None,
        }
    }

    /// Build `kind` for the scope's viewer, prefilled from the scope's account.
    pub fn form(
        &self,
        kind: FormKind,
        scope: &RequestScope,
        options: &PortalOptions,
        seed: &str,
        now: DateTime<Utc>,
    ) -> FormDescriptor {
        let viewer = scope.viewer();
        let active = self
            .fields(kind)
            .map(|registry| registry.active(viewer, options))
            .unwrap_or_default();
        let nonce = self.tokens.issue(kind.key(), seed, now);
        FormBuilder::new(options, viewer).build(kind, &active, scope.account(), nonce)
    }
}

/// Startup-time assembly of a [`Portal`].
pub struct PortalBuilder<S: MemberStore> {
    store: S,
    token_secret: String,
    profile_fields: FieldRegistryBuilder,
    login_fields: FieldRegistryBuilder,
    payment_fields: FieldRegistryBuilder,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    geocoder: Option<GeocodeService>,
}

impl<S: MemberStore> PortalBuilder<S> {
    pub fn new(store: S, token_secret: impl Into<String>) -> Self {
        let mut login = FieldRegistryBuilder::new();
        login.extend(login_fields());
        let mut payment = FieldRegistryBuilder::new();
        payment.extend(payment_fields());
        Self {
            store,
            token_secret: token_secret.into(),
            profile_fields: FieldRegistryBuilder::new().with_core_profile_fields(),
            login_fields: login,
            payment_fields: payment,
            gateway: Arc::new(DisabledGateway),
            mailer: Arc::new(LogMailer::default()),
            geocoder: None,
        }
    }

    /// Add a field to the profile form.
    pub fn profile_field(mut self, def: FieldDefinition) -> Self {
        self.profile_fields.register(def);
        self
    }

    pub fn payment_field(mut self, def: FieldDefinition) -> Self {
        self.payment_fields.register(def);
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn geocoder(mut self, service: GeocodeService) -> Self {
        self.geocoder = Some(service);
        self
    }

    pub fn build(self) -> Result<Portal<S>, RegistryError> {
        Ok(Portal {
            repo: MemberRepository::new(self.store),
            profile_fields: self.profile_fields.build()?,
            login_fields: self.login_fields.build()?,
            payment_fields: self.payment_fields.build()?,
            tokens: TokenSigner::new(self.token_secret),
            gateway: self.gateway,
            mailer: self.mailer,
            geocoder: self.geocoder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::core::ids;
    use crate::fields::FieldType;
    use store::MemoryStore;

    #[test]
    fn test_builder_registers_extension_fields() {
        let portal = Portal::builder(MemoryStore::new(), "secret")
            .profile_field(
                FieldDefinition::new("asamp_user_company_fein", "FEIN", FieldType::Text)
                    .priority(55),
            )
            .build()
            .unwrap();
        let profile = portal.fields(FormKind::Profile).unwrap();
        assert!(profile.get("asamp_user_company_fein").is_some());
        assert!(portal.fields(FormKind::Logout).is_none());
    }

    #[test]
    fn test_builder_rejects_orphan_field() {
        let result = Portal::builder(MemoryStore::new(), "secret")
            .payment_field(
                FieldDefinition::new("coupon", "Coupon", FieldType::Text).parent("nope"),
            )
            .build();
        assert!(matches!(result, Err(RegistryError::UnknownParent { .. })));
    }

    #[test]
    fn test_form_carries_verifiable_nonce() {
        let portal = Portal::builder(MemoryStore::new(), "secret").build().unwrap();
        let now = Utc::now();
        let scope = RequestScope::anonymous();
        let form = portal.form(
            FormKind::Login,
            &scope,
            &PortalOptions::default(),
            "seed",
            now,
        );
        assert!(form.field(ids::LOGIN_USERNAME).is_some());
        let nonce = form
            .field(&FormKind::Login.nonce_field())
            .and_then(|f| f.value.as_text())
            .unwrap()
            .to_string();
        assert!(portal.tokens().verify(&nonce, FormKind::Login.key(), "seed", now));
        assert!(!portal.tokens().verify(&nonce, FormKind::Profile.key(), "seed", now));
    }
}
