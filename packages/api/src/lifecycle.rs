//! Install-time and settings-screen operations.

use serde::Serialize;
use store::{MemberRepository, MemberStore, PortalOptions};

use crate::error::Result;
use crate::roles::RoleRegistry;

/// Seed default options on first run and create the member roles.
pub async fn activate<S: MemberStore>(repo: &MemberRepository<S>) -> Result<PortalOptions> {
    let options = match repo.store().load_options().await? {
        Some(options) => options,
        None => {
            let options = PortalOptions::default();
            repo.store().save_options(&options).await?;
            tracing::info!("default portal options saved");
            options
        }
    };
    RoleRegistry::new(repo).sync(&options).await?;
    Ok(options)
}

/// Remove the member roles. Accounts and options are kept.
pub async fn deactivate<S: MemberStore>(repo: &MemberRepository<S>) -> Result<()> {
    RoleRegistry::new(repo).teardown().await
}

/// Persist edited options and rebuild the roles from the new member types.
pub async fn save_options<S: MemberStore>(
    repo: &MemberRepository<S>,
    options: &PortalOptions,
) -> Result<()> {
    repo.store().save_options(options).await?;
    RoleRegistry::new(repo).sync(options).await?;
    tracing::info!(member_types = options.member_types().len(), "portal options saved");
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SettingsSection {
    pub title: &'static str,
    /// Option names edited in this section, or shortcode usage lines on the usage tab.
    pub entries: Vec<&'static str>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SettingsTab {
    pub id: &'static str,
    pub title: &'static str,
    pub sections: Vec<SettingsSection>,
}

pub fn settings_tabs() -> Vec<SettingsTab> {
    vec![
        SettingsTab {
            id: "general",
            title: "General",
            sections: vec![
                SettingsSection {
                    title: "Registration/Profile",
                    entries: vec![
                        "state_default",
                        "num_contacts",
                        "trades",
                        "trades_other",
                        "google_recaptcha_site_key",
                        "google_recaptcha_secret_key",
                        "member_type_label",
                        "member_types",
                    ],
                },
                SettingsSection {
                    title: "Member Directory",
                    entries: vec!["profiles_public", "members_grouped_by_type", "map_center"],
                },
                SettingsSection {
                    title: "Administration",
                    entries: vec!["admin_contacts", "pages"],
                },
            ],
        },
        SettingsTab {
            id: "payment",
            title: "Payment",
            sections: vec![
                SettingsSection {
                    title: "PayPal Pro",
                    entries: vec!["paypal_pro"],
                },
                SettingsSection {
                    title: "Stripe",
                    entries: vec!["stripe"],
                },
            ],
        },
        SettingsTab {
            id: "usage",
            title: "Usage",
            sections: vec![SettingsSection {
                title: "Shortcodes",
                entries: vec![
                    "[asamp_member_profile] registration form for visitors, profile editor for members",
                    "[asamp_member_login_box hide=\"true\" link=\"/join\"] sign-in box, collapsed when hide is set",
                    "[asamp_member_payment_form] dues payment form",
                    "[asamp_member_directory] member directory",
                    "[asamp_member_map] map of member locations",
                ],
            }],
        },
    ]
}
