//! # Repository: member operations over an abstract store
//!
//! All reads and writes go through the [`MemberStore`] trait, so the same logic works
//! against the in-memory store (tests, development) and the PostgreSQL store in the
//! `api` crate (`server` feature).
//!
//! ## [`MemberStore`] trait
//!
//! An async interface grouped by record kind:
//!
//! | Methods | Records |
//! |---------|---------|
//! | `account`, `account_by_login`, `account_by_email`, `accounts`, `insert_account`, `update_account` | [`MemberAccount`] |
//! | `insert_payment`, `update_payment`, `payments_for` | [`DuesPayment`] |
//! | `roles`, `replace_roles` | [`Role`] |
//! | `load_options`, `save_options` | [`PortalOptions`] |
//! | `push_notice`, `notices`, `mark_consumed` | [`StoredNotice`] |
//! | `get_value`, `set_value` | free-form key/value state (e.g. the geocoder's last call) |
//!
//! Stores must reject an `insert_account` whose login or email is already taken with
//! [`StoreError::Duplicate`].
//!
//! ## [`MemberRepository`]
//!
//! Multi-step operations that every backend shares: atomic member-role replacement,
//! the dues-payment save rules, and notice consumption.

use std::future::Future;

use crate::models::{
    AccountId, DuesPayment, MemberAccount, NewAccount, NewPayment, Role, ROLE_PREFIX,
};
use crate::notices::{Notice, StoredNotice};
use crate::options::PortalOptions;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("invalid value for {0}")]
    InvalidValue(String),
    #[error("options document: {0}")]
    Options(String),
    #[error("store backend: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Async persistence for accounts, payments, roles, options and notices.
pub trait MemberStore: Send + Sync {
    fn account(&self, id: AccountId) -> impl Future<Output = Result<Option<MemberAccount>>> + Send;
    fn account_by_login(
        &self,
        login: &str,
    ) -> impl Future<Output = Result<Option<MemberAccount>>> + Send;
    fn account_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<MemberAccount>>> + Send;
    fn accounts(&self) -> impl Future<Output = Result<Vec<MemberAccount>>> + Send;
    fn insert_account(
        &self,
        account: NewAccount,
    ) -> impl Future<Output = Result<MemberAccount>> + Send;
    fn update_account(&self, account: &MemberAccount) -> impl Future<Output = Result<()>> + Send;

    fn insert_payment(
        &self,
        payment: NewPayment,
    ) -> impl Future<Output = Result<DuesPayment>> + Send;
    fn update_payment(&self, payment: &DuesPayment) -> impl Future<Output = Result<()>> + Send;
    fn payments_for(
        &self,
        account: AccountId,
    ) -> impl Future<Output = Result<Vec<DuesPayment>>> + Send;

    fn roles(&self) -> impl Future<Output = Result<Vec<Role>>> + Send;
    /// Remove every role whose slug starts with `prefix`, then add `roles`.
    fn replace_roles(
        &self,
        prefix: &str,
        roles: Vec<Role>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn load_options(&self) -> impl Future<Output = Result<Option<PortalOptions>>> + Send;
    fn save_options(&self, options: &PortalOptions) -> impl Future<Output = Result<()>> + Send;

    fn push_notice(&self, notice: Notice) -> impl Future<Output = Result<u64>> + Send;
    /// Unconsumed notices, oldest first.
    fn notices(&self) -> impl Future<Output = Result<Vec<StoredNotice>>> + Send;
    fn mark_consumed(&self, ids: &[u64]) -> impl Future<Output = Result<()>> + Send;

    fn get_value(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;
    fn set_value(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Member operations backed by a [`MemberStore`].
pub struct MemberRepository<S: MemberStore> {
    store: S,
}

impl<S: MemberStore> MemberRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Saved options, or the defaults when nothing has been saved yet.
    pub async fn options(&self) -> Result<PortalOptions> {
        Ok(self.store.load_options().await?.unwrap_or_default())
    }

    /// Accounts holding a member role, ordered by id.
    pub async fn members(&self) -> Result<Vec<MemberAccount>> {
        let mut members: Vec<MemberAccount> = self
            .store
            .accounts()
            .await?
            .into_iter()
            .filter(MemberAccount::is_member)
            .collect();
        members.sort_by_key(|m| m.id);
        Ok(members)
    }

    /// Replace every member role the account holds with `slug` in one update.
    pub async fn assign_member_role(&self, account: &mut MemberAccount, slug: &str) -> Result<()> {
        account.roles.retain(|r| !r.starts_with(ROLE_PREFIX));
        account.roles.insert(slug.to_string());
        account.hide_admin_bar = true;
        self.store.update_account(account).await
    }

    /// Insert a payment, then apply the first-save rules and persist them.
    pub async fn record_payment(&self, payment: NewPayment) -> Result<DuesPayment> {
        let mut saved = self.store.insert_payment(payment).await?;
        if saved.finalize() {
            self.store.update_payment(&saved).await?;
        }
        Ok(saved)
    }

    /// Unconsumed notices, oldest first, without consuming any.
    pub async fn pending_notices(&self) -> Result<Vec<StoredNotice>> {
        self.store.notices().await
    }

    /// Every pending notice; one-shot notices are marked consumed.
    pub async fn consume_notices(&self) -> Result<Vec<StoredNotice>> {
        let pending = self.pending_notices().await?;
        let one_shot: Vec<u64> = pending
            .iter()
            .filter(|n| !n.notice.standing)
            .map(|n| n.id)
            .collect();
        if !one_shot.is_empty() {
            self.store.mark_consumed(&one_shot).await?;
        }
        Ok(pending)
    }

    /// Clear a notice regardless of whether it is standing.
    pub async fn dismiss_notice(&self, id: u64) -> Result<()> {
        self.store.mark_consumed(&[id]).await
    }
}
