use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::models::{AccountId, DuesPayment, MemberAccount, NewAccount, NewPayment, PaymentId, Role};
use crate::notices::{Notice, StoredNotice};
use crate::options::PortalOptions;
use crate::repo::{MemberStore, Result, StoreError};

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<AccountId, MemberAccount>,
    payments: BTreeMap<PaymentId, DuesPayment>,
    roles: Vec<Role>,
    options: Option<PortalOptions>,
    notices: Vec<StoredNotice>,
    values: HashMap<String, String>,
    next_account: AccountId,
    next_payment: PaymentId,
    next_notice: u64,
}

/// In-memory MemberStore for testing and development.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn same(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

impl MemberStore for MemoryStore {
    async fn account(&self, id: AccountId) -> Result<Option<MemberAccount>> {
        Ok(self.lock().accounts.get(&id).cloned())
    }

    async fn account_by_login(&self, login: &str) -> Result<Option<MemberAccount>> {
        Ok(self
            .lock()
            .accounts
            .values()
            .find(|a| same(&a.login, login))
            .cloned())
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<MemberAccount>> {
        Ok(self
            .lock()
            .accounts
            .values()
            .find(|a| !email.is_empty() && same(&a.email, email))
            .cloned())
    }

    async fn accounts(&self) -> Result<Vec<MemberAccount>> {
        Ok(self.lock().accounts.values().cloned().collect())
    }

    async fn insert_account(&self, account: NewAccount) -> Result<MemberAccount> {
        let mut state = self.lock();
        if state.accounts.values().any(|a| same(&a.login, &account.login)) {
            return Err(StoreError::Duplicate(format!("login {}", account.login)));
        }
        if !account.email.is_empty()
            && state.accounts.values().any(|a| same(&a.email, &account.email))
        {
            return Err(StoreError::Duplicate(format!("email {}", account.email)));
        }
        state.next_account += 1;
        let saved = MemberAccount {
            id: state.next_account,
            login: account.login,
            email: account.email,
            password_hash: account.password_hash,
            display_name: account.display_name,
            roles: account.roles,
            hide_admin_bar: account.hide_admin_bar,
            profile: account.profile,
            registered_at: Utc::now(),
        };
        state.accounts.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn update_account(&self, account: &MemberAccount) -> Result<()> {
        let mut state = self.lock();
        if !account.email.is_empty()
            && state
                .accounts
                .values()
                .any(|a| a.id != account.id && same(&a.email, &account.email))
        {
            return Err(StoreError::Duplicate(format!("email {}", account.email)));
        }
        match state.accounts.get_mut(&account.id) {
            Some(slot) => {
                *slot = account.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("account {}", account.id))),
        }
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<DuesPayment> {
        let mut state = self.lock();
        if !state.accounts.contains_key(&payment.account_id) {
            return Err(StoreError::NotFound(format!("account {}", payment.account_id)));
        }
        state.next_payment += 1;
        let saved = DuesPayment {
            id: state.next_payment,
            account_id: payment.account_id,
            title: String::new(),
            slug: String::new(),
            status: Default::default(),
            amount: payment.amount,
            member_type: payment.member_type,
            card_type: payment.card_type,
            card_masked: payment.card_masked,
            card_exp_month: payment.card_exp_month,
            card_exp_year: payment.card_exp_year,
            cc_name: payment.cc_name,
            reference: payment.reference,
            created_at: Utc::now(),
        };
        state.payments.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn update_payment(&self, payment: &DuesPayment) -> Result<()> {
        match self.lock().payments.get_mut(&payment.id) {
            Some(slot) => {
                *slot = payment.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("payment {}", payment.id))),
        }
    }

    async fn payments_for(&self, account: AccountId) -> Result<Vec<DuesPayment>> {
        Ok(self
            .lock()
            .payments
            .values()
            .filter(|p| p.account_id == account)
            .cloned()
            .collect())
    }

    async fn roles(&self) -> Result<Vec<Role>> {
        Ok(self.lock().roles.clone())
    }

    async fn replace_roles(&self, prefix: &str, roles: Vec<Role>) -> Result<()> {
        let mut state = self.lock();
        state.roles.retain(|r| !r.slug.starts_with(prefix));
        state.roles.extend(roles);
        Ok(())
    }

    async fn load_options(&self) -> Result<Option<PortalOptions>> {
        Ok(self.lock().options.clone())
    }

    async fn save_options(&self, options: &PortalOptions) -> Result<()> {
        self.lock().options = Some(options.clone());
        Ok(())
    }

    async fn push_notice(&self, notice: Notice) -> Result<u64> {
        let mut state = self.lock();
        state.next_notice += 1;
        let id = state.next_notice;
        state.notices.push(StoredNotice {
            id,
            notice,
            consumed: false,
        });
        Ok(id)
    }

    async fn notices(&self) -> Result<Vec<StoredNotice>> {
        Ok(self
            .lock()
            .notices
            .iter()
            .filter(|n| !n.consumed)
            .cloned()
            .collect())
    }

    async fn mark_consumed(&self, ids: &[u64]) -> Result<()> {
        for notice in self.lock().notices.iter_mut() {
            if ids.contains(&notice.id) {
                notice.consumed = true;
            }
        }
        Ok(())
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().values.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.lock().values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
