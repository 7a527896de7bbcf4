//! Embedding points and status flags.
//!
//! Page content embeds the portal with shortcodes such as
//! `[asamp_member_login_box hide="true" link="/join"]`. [`parse_shortcodes`] finds them;
//! [`crate::Portal::render`] turns each into a [`crate::PageView`].
//!
//! Successful submissions redirect with `?<flag>=true` query parameters
//! ([`StatusFlag`]) that the next render turns into a confirmation message.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[(asamp_member_[a-z_]+)((?:\s[^\]]*)?)\]").ok());
static ATTR: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"']+))"#).ok()
});

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "shortcode", rename_all = "snake_case")]
pub enum Shortcode {
    MemberProfile,
    LoginBox {
        /// Start hidden behind a toggle.
        collapsed: bool,
        /// Where "Join" points; the profile page when unset.
        link: Option<String>,
    },
    PaymentForm,
    Directory,
    Map,
}

impl Shortcode {
    pub fn tag(&self) -> &'static str {
        match self {
            Shortcode::MemberProfile => "asamp_member_profile",
            Shortcode::LoginBox { .. } => "asamp_member_login_box",
            Shortcode::PaymentForm => "asamp_member_payment_form",
            Shortcode::Directory => "asamp_member_directory",
            Shortcode::Map => "asamp_member_map",
        }
    }

    /// Build a shortcode from its tag and lowercase attribute names.
    pub fn from_parts(tag: &str, attrs: &BTreeMap<String, String>) -> Option<Self> {
        Some(match tag {
            "asamp_member_profile" => Shortcode::MemberProfile,
            "asamp_member_login_box" => Shortcode::LoginBox {
                collapsed: attrs.get("hide").is_some_and(|v| truthy(v)),
                link: attrs
                    .get("link")
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty()),
            },
            "asamp_member_payment_form" => Shortcode::PaymentForm,
            "asamp_member_directory" => Shortcode::Directory,
            "asamp_member_map" => Shortcode::Map,
            _ => return None,
        })
    }
}

fn truthy(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    !value.is_empty() && !matches!(value.as_str(), "false" | "0" | "no")
}

fn parse_attrs(raw: &str) -> BTreeMap<String, String> {
    let Some(re) = ATTR.as_ref() else {
        return BTreeMap::new();
    };
    re.captures_iter(raw)
        .filter_map(|c| {
            let value = c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4))?;
            Some((c[1].to_ascii_lowercase(), value.as_str().to_string()))
        })
        .collect()
}

/// Every known shortcode in `content`, in order. Unknown `asamp_member_*` tags are skipped.
pub fn parse_shortcodes(content: &str) -> Vec<Shortcode> {
    let Some(re) = TAG.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(content)
        .filter_map(|c| Shortcode::from_parts(&c[1], &parse_attrs(&c[2])))
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFlag {
    MemberUpdated,
    MemberLoggedIn,
    MemberLoggedOut,
    PaymentReceived,
    EmailSent,
    MembersImportSuccessful,
}

impl StatusFlag {
    pub const ALL: [StatusFlag; 6] = [
        StatusFlag::MemberUpdated,
        StatusFlag::MemberLoggedIn,
        StatusFlag::MemberLoggedOut,
        StatusFlag::PaymentReceived,
        StatusFlag::EmailSent,
        StatusFlag::MembersImportSuccessful,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatusFlag::MemberUpdated => "member_updated",
            StatusFlag::MemberLoggedIn => "member_logged_in",
            StatusFlag::MemberLoggedOut => "member_logged_out",
            StatusFlag::PaymentReceived => "payment_received",
            StatusFlag::EmailSent => "email_sent",
            StatusFlag::MembersImportSuccessful => "members_import_successful",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

/// Flags present in a query string with the value `true`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusFlags(BTreeSet<StatusFlag>);

impl StatusFlags {
    pub fn from_query<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self(
            pairs
                .into_iter()
                .filter(|(_, value)| *value == "true")
                .filter_map(|(name, _)| StatusFlag::parse(name))
                .collect(),
        )
    }

    pub fn contains(&self, flag: StatusFlag) -> bool {
        self.0.contains(&flag)
    }

    pub fn insert(&mut self, flag: StatusFlag) {
        self.0.insert(flag);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `path` with every flag appended as `<flag>=true`.
    pub fn append_to(&self, path: &str) -> String {
        if self.0.is_empty() {
            return path.to_string();
        }
        let query: Vec<String> = self.0.iter().map(|f| format!("{}=true", f.as_str())).collect();
        let separator = if path.contains('?') { '&' } else { '?' };
        format!("{}{}{}", path, separator, query.join("&"))
    }
}

impl FromIterator<StatusFlag> for StatusFlags {
    fn from_iter<I: IntoIterator<Item = StatusFlag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_shortcodes() {
        let content = r#"
            <p>Intro</p>
            [asamp_member_profile]
            [asamp_member_login_box hide="true" link='/join']
            [asamp_member_payment_form]
            [asamp_member_unknown]
            [asamp_member_directory][asamp_member_map]
        "#;
        assert_eq!(
            parse_shortcodes(content),
            vec![
                Shortcode::MemberProfile,
                Shortcode::LoginBox {
                    collapsed: true,
                    link: Some("/join".into())
                },
                Shortcode::PaymentForm,
                Shortcode::Directory,
                Shortcode::Map,
            ]
        );
    }

    #[test]
    fn test_login_box_attributes() {
        assert_eq!(
            parse_shortcodes(r#"[asamp_member_login_box hide="" link=""]"#),
            vec![Shortcode::LoginBox {
                collapsed: false,
                link: None
            }]
        );
        assert_eq!(
            parse_shortcodes("[asamp_member_login_box HIDE=false]"),
            vec![Shortcode::LoginBox {
                collapsed: false,
                link: None
            }]
        );
        assert_eq!(
            parse_shortcodes("[asamp_member_login_box hide=1]"),
            vec![Shortcode::LoginBox {
                collapsed: true,
                link: None
            }]
        );
    }

    #[test]
    fn test_status_flags_from_and_to_query() {
        let flags = StatusFlags::from_query([
            ("member_updated", "true"),
            ("payment_received", "false"),
            ("email_sent", "true"),
            ("other", "true"),
        ]);
        assert!(flags.contains(StatusFlag::MemberUpdated));
        assert!(!flags.contains(StatusFlag::PaymentReceived));
        assert_eq!(
            flags.append_to("/member-profile"),
            "/member-profile?member_updated=true&email_sent=true"
        );
        assert_eq!(
            StatusFlags::default().append_to("/page?x=1"),
            "/page?x=1"
        );
        let single: StatusFlags = [StatusFlag::MemberLoggedOut].into_iter().collect();
        assert_eq!(single.append_to("/?a=b"), "/?a=b&member_logged_out=true");
    }
}
