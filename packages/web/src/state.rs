use std::sync::Arc;

use api::auth::{current_account_id, hash_password, token_seed};
use api::db::PgStore;
use api::settings::Admin;
use api::{Portal, PortalError, RequestScope};
use store::{MemberStore, NewAccount};
use tower_sessions::Session;

use crate::error::AppResult;

/// Role that opens the admin routes.
pub const ADMIN_ROLE: &str = "administrator";

#[derive(Clone)]
pub struct AppState {
    pub portal: Arc<Portal<PgStore>>,
}

/// The resolved requester plus the session's token seed.
pub struct Visitor {
    pub scope: RequestScope,
    pub seed: String,
}

impl AppState {
    pub fn new(portal: Portal<PgStore>) -> Self {
        Self {
            portal: Arc::new(portal),
        }
    }

    /// Resolve the session's account. With `admin`, the account must hold [`ADMIN_ROLE`]
    /// and the scope is the admin context.
    pub async fn visitor(&self, session: &Session, admin: bool) -> AppResult<Visitor> {
        let seed = token_seed(session).await?;
        let account = match current_account_id(session).await? {
            Some(id) => self.portal.repo().store().account(id).await?,
            None => None,
        };
        if admin && !account.as_ref().is_some_and(|a| a.roles.contains(ADMIN_ROLE)) {
            return Err(PortalError::Forbidden.into());
        }
        Ok(Visitor {
            scope: RequestScope::new(account, admin),
            seed,
        })
    }
}

/// Create the configured administrator, or give an existing account the admin role.
pub async fn ensure_admin(store: &PgStore, admin: &Admin) -> Result<(), PortalError> {
    if admin.login.trim().is_empty() {
        return Ok(());
    }
    match store.account_by_login(&admin.login).await? {
        Some(mut account) if !account.roles.contains(ADMIN_ROLE) => {
            account.roles.insert(ADMIN_ROLE.to_string());
            store.update_account(&account).await?;
            tracing::info!(login = %admin.login, "administrator role granted");
        }
        Some(_) => {}
        None => {
            let account = store
                .insert_account(NewAccount {
                    login: admin.login.clone(),
                    email: admin.email.clone(),
                    password_hash: hash_password(&admin.password)?,
                    display_name: admin.login.clone(),
                    roles: [ADMIN_ROLE.to_string()].into_iter().collect(),
                    ..NewAccount::default()
                })
                .await?;
            tracing::info!(account = account.id, login = %account.login, "administrator created");
        }
    }
    Ok(())
}
