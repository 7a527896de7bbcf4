//! Request actor classification.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use store::MemberAccount;

/// Who is looking at a form or listing. Exactly one applies per request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Viewer {
    Admin,
    Member,
    NonMember,
}

impl Viewer {
    pub const ALL: [Viewer; 3] = [Viewer::Admin, Viewer::Member, Viewer::NonMember];

    pub fn as_str(self) -> &'static str {
        match self {
            Viewer::Admin => "admin",
            Viewer::Member => "member",
            Viewer::NonMember => "non-member",
        }
    }
}

/// Classify an actor. The admin context wins over a member role.
pub fn classify(admin_context: bool, account: Option<&MemberAccount>) -> Viewer {
    if admin_context {
        Viewer::Admin
    } else if account.is_some_and(MemberAccount::is_member) {
        Viewer::Member
    } else {
        Viewer::NonMember
    }
}

/// Per-request authentication state. The viewer is computed on first use and cached.
#[derive(Debug, Default)]
pub struct RequestScope {
    admin_context: bool,
    account: Option<MemberAccount>,
    viewer: OnceLock<Viewer>,
}

impl RequestScope {
    pub fn new(account: Option<MemberAccount>, admin_context: bool) -> Self {
        Self {
            admin_context,
            account,
            viewer: OnceLock::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(account: MemberAccount) -> Self {
        Self::new(Some(account), false)
    }

    pub fn viewer(&self) -> Viewer {
        *self
            .viewer
            .get_or_init(|| classify(self.admin_context, self.account.as_ref()))
    }

    pub fn account(&self) -> Option<&MemberAccount> {
        self.account.as_ref()
    }

    pub fn is_admin_context(&self) -> bool {
        self.admin_context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn account(roles: &[&str]) -> MemberAccount {
        MemberAccount {
            id: 7,
            login: "acme".into(),
            email: "office@acme.test".into(),
            password_hash: String::new(),
            display_name: "Acme".into(),
            roles: roles.iter().map(|r| r.to_string()).collect::<BTreeSet<_>>(),
            hide_admin_bar: false,
            profile: Default::default(),
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn test_classification() {
        assert_eq!(RequestScope::anonymous().viewer(), Viewer::NonMember);
        assert_eq!(
            RequestScope::signed_in(account(&["subscriber"])).viewer(),
            Viewer::NonMember
        );
        assert_eq!(
            RequestScope::signed_in(account(&["asamp_contractor"])).viewer(),
            Viewer::Member
        );
        assert_eq!(
            RequestScope::new(Some(account(&["asamp_contractor"])), true).viewer(),
            Viewer::Admin
        );
        assert_eq!(RequestScope::new(None, true).viewer(), Viewer::Admin);
    }
}
