use std::io::Read;

use store::MemberStore;

use super::Outcome;
use crate::error::{PortalError, Result};
use crate::portal::Portal;
use crate::shortcodes::{StatusFlag, StatusFlags};
use crate::transfer::{export_members, import_members};
use crate::viewer::{RequestScope, Viewer};

/// Key the admin import form's token is scoped to.
pub const IMPORT_FORM_KEY: &str = "asamp_import";

impl<S: MemberStore> Portal<S> {
    /// Import a members CSV from the admin screen, then return to `back`.
    ///
    /// The outcome of the batch is also queued as an admin notice, so a rejected file
    /// is reported on the next admin page even though the handler re-renders.
    pub async fn handle_import<R: Read>(
        &self,
        scope: &RequestScope,
        token: &str,
        seed: &str,
        now: chrono::DateTime<chrono::Utc>,
        file: R,
        back: &str,
    ) -> Outcome {
        if !scope.is_admin_context() {
            return Outcome::Ignored;
        }
        let result = self.process_import(scope, token, seed, now, file, back).await;
        result.unwrap_or_else(|e| Outcome::from_error(IMPORT_FORM_KEY, e))
    }

    async fn process_import<R: Read>(
        &self,
        scope: &RequestScope,
        token: &str,
        seed: &str,
        now: chrono::DateTime<chrono::Utc>,
        file: R,
        back: &str,
    ) -> Result<Outcome> {
        if scope.viewer() != Viewer::Admin {
            return Err(PortalError::Forbidden);
        }
        if !self.tokens().verify(token, IMPORT_FORM_KEY, seed, now) {
            return Err(PortalError::Security);
        }
        let report = import_members(self.repo(), file).await?;
        tracing::info!(created = report.created, updated = report.updated, "import handled");
        let flags: StatusFlags = [StatusFlag::MembersImportSuccessful].into_iter().collect();
        Ok(Outcome::redirect(back, flags))
    }

    /// Members CSV for the admin export download.
    pub async fn export(&self, scope: &RequestScope) -> Result<String> {
        if scope.viewer() != Viewer::Admin {
            return Err(PortalError::Forbidden);
        }
        export_members(self.repo()).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use store::NoticeLevel;

    use super::super::testing::*;
    use super::*;

    const HEADER: &str =
        "login,company_name,company_email,member_status,member_type,member_date_joined,member_expiry\n";

    #[tokio::test]
    async fn test_import_success_flag() {
        let portal = portal();
        let admin = RequestScope::new(None, true);
        let now = Utc::now();
        let token = portal.tokens().issue(IMPORT_FORM_KEY, SEED, now);
        let csv = format!(
            "{}acme,Acme,office@acme.test,active,Standard ASA Member,2020-01-01,2027-01-01\n",
            HEADER
        );
        let outcome = portal
            .handle_import(&admin, &token, SEED, now, csv.as_bytes(), "/admin/members")
            .await;
        match outcome {
            Outcome::Redirect { to, .. } => {
                assert_eq!(to, "/admin/members?members_import_successful=true")
            }
            other => panic!("unexpected {:?}", other),
        }

        let exported = portal.export(&admin).await.unwrap();
        assert!(exported.lines().nth(1).unwrap().starts_with("acme,office@acme.test,Standard ASA Member"));
    }

    #[tokio::test]
    async fn test_rejected_import_rerenders_and_queues_notice() {
        let portal = portal();
        let admin = RequestScope::new(None, true);
        let now = Utc::now();
        let token = portal.tokens().issue(IMPORT_FORM_KEY, SEED, now);
        let csv = format!("{},Acme,office@acme.test,active,Standard ASA Member,,\n", HEADER);
        let outcome = portal
            .handle_import(&admin, &token, SEED, now, csv.as_bytes(), "/admin/members")
            .await;
        assert!(rerender_message(&outcome).contains("login is required"));
        let notices = portal.repo().consume_notices().await.unwrap();
        assert_eq!(notices[0].notice.level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_import_needs_admin_and_token() {
        let portal = portal();
        let now = Utc::now();
        let csv = HEADER.to_string();
        let member = RequestScope::anonymous();
        assert_eq!(
            portal
                .handle_import(&member, "", SEED, now, csv.as_bytes(), "/admin")
                .await,
            Outcome::Ignored
        );
        let admin = RequestScope::new(None, true);
        let outcome = portal
            .handle_import(&admin, "forged", SEED, now, csv.as_bytes(), "/admin")
            .await;
        assert_eq!(rerender_message(&outcome), "Security check failed.");
        assert!(matches!(
            portal.export(&member).await,
            Err(PortalError::Forbidden)
        ));
    }
}
