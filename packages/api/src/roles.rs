//! Member-type roles.
//!
//! Each configured member type owns one role, `asamp_<sanitized name>`. The role set is
//! rebuilt from the options whenever they are saved, and an account's member role is
//! always replaced as a whole.

use store::{MemberAccount, MemberRepository, MemberStore, PortalOptions, Role, ROLE_PREFIX};

use crate::error::{PortalError, Result};

/// One role per configured member type, or the default type when none are configured.
pub fn member_roles(options: &PortalOptions) -> Vec<Role> {
    options.member_types().iter().map(|t| t.role()).collect()
}

pub struct RoleRegistry<'a, S: MemberStore> {
    repo: &'a MemberRepository<S>,
}

impl<'a, S: MemberStore> RoleRegistry<'a, S> {
    pub fn new(repo: &'a MemberRepository<S>) -> Self {
        Self { repo }
    }

    /// Drop every portal role and recreate one per member type.
    pub async fn sync(&self, options: &PortalOptions) -> Result<Vec<Role>> {
        let roles = member_roles(options);
        self.repo
            .store()
            .replace_roles(ROLE_PREFIX, roles.clone())
            .await?;
        tracing::info!(roles = roles.len(), "member roles synced");
        Ok(roles)
    }

    pub async fn teardown(&self) -> Result<()> {
        self.repo.store().replace_roles(ROLE_PREFIX, Vec::new()).await?;
        tracing::info!("member roles removed");
        Ok(())
    }

    /// Give `account` the role `slug` in place of any member role it holds.
    pub async fn assign(&self, account: &mut MemberAccount, slug: &str) -> Result<()> {
        let options = self.repo.options().await?;
        if options.member_type_by_slug(slug).is_none() {
            return Err(PortalError::EntityMutation(format!(
                "Unknown {}: {}",
                options.member_type_label().to_lowercase(),
                slug
            )));
        }
        self.repo.assign_member_role(account, slug).await?;
        tracing::debug!(account = account.id, role = slug, "member role assigned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{MemberType, MemoryStore, Money, NewAccount};

    #[tokio::test]
    async fn test_sync_replaces_portal_roles_only() {
        let repo = MemberRepository::new(MemoryStore::new());
        repo.store()
            .replace_roles(
                "editor",
                vec![Role {
                    slug: "editor".into(),
                    label: "Editor".into(),
                }],
            )
            .await
            .unwrap();
        let registry = RoleRegistry::new(&repo);

        let roles = registry.sync(&PortalOptions::default()).await.unwrap();
        assert_eq!(roles[0].slug, "asamp_standardasamember");

        let options = PortalOptions {
            member_types: vec![
                MemberType::new("Contractor", Money::from_dollars(900)),
                MemberType::new("Associate", Money::from_dollars(450)),
            ],
            ..PortalOptions::default()
        };
        registry.sync(&options).await.unwrap();
        let slugs: Vec<String> = repo.store().roles().await.unwrap().into_iter().map(|r| r.slug).collect();
        assert!(slugs.contains(&"editor".to_string()));
        assert!(slugs.contains(&"asamp_contractor".to_string()));
        assert!(slugs.contains(&"asamp_associate".to_string()));
        assert!(!slugs.contains(&"asamp_standardasamember".to_string()));

        registry.teardown().await.unwrap();
        let slugs: Vec<String> = repo.store().roles().await.unwrap().into_iter().map(|r| r.slug).collect();
        assert_eq!(slugs, vec!["editor"]);
    }

    #[tokio::test]
    async fn test_assign_rejects_unknown_slug() {
        let repo = MemberRepository::new(MemoryStore::new());
        let mut account = repo
            .store()
            .insert_account(NewAccount {
                login: "acme".into(),
                ..NewAccount::default()
            })
            .await
            .unwrap();
        let registry = RoleRegistry::new(&repo);
        assert!(matches!(
            registry.assign(&mut account, "asamp_nope").await,
            Err(PortalError::EntityMutation(_))
        ));
        registry
            .assign(&mut account, "asamp_standardasamember")
            .await
            .unwrap();
        let stored = repo.store().account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.member_role(), Some("asamp_standardasamember"));
        assert!(stored.hide_admin_bar);
    }
}
