//! Page rendering for the embedding shortcodes.
//!
//! [`Portal::render`] turns one [`Shortcode`] into a serializable [`PageView`]; the
//! web layer (or any template engine) draws the HTML. Status flags from the previous
//! redirect become the confirmation message of the matching view, and a failed
//! submission is shown on the form it came from.

use chrono::{DateTime, Utc};
use serde::Serialize;
use store::MemberStore;

use crate::directory::{directory, map, DirectoryListing, MapView};
use crate::error::Result;
use crate::forms::{FormDescriptor, FormKind};
use crate::portal::Portal;
use crate::shortcodes::{parse_shortcodes, Shortcode, StatusFlag, StatusFlags};
use crate::validation::FieldErrors;
use crate::viewer::RequestScope;

pub const PAYMENT_SIGN_IN_MESSAGE: &str = "Please sign in to pay your dues.";

/// A submission that failed and is shown again on its form.
#[derive(Clone, Debug, Default)]
pub struct FormFailure {
    pub errors: FieldErrors,
    pub message: String,
}

/// What a page render needs from the request.
pub struct PageContext<'a> {
    pub scope: &'a RequestScope,
    pub flags: &'a StatusFlags,
    pub seed: &'a str,
    pub now: DateTime<Utc>,
    pub failure: Option<(FormKind, &'a FormFailure)>,
}

impl PageContext<'_> {
    fn failure_for(&self, kind: FormKind) -> Option<&FormFailure> {
        self.failure
            .filter(|(failed, _)| *failed == kind)
            .map(|(_, failure)| failure)
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoginBox {
    Welcome {
        display_name: String,
        profile_link: String,
        logout: FormDescriptor,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    SignIn {
        form: FormDescriptor,
        collapsed: bool,
        register_link: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        errors: FieldErrors,
    },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum PageView {
    Profile {
        form: FormDescriptor,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        errors: FieldErrors,
    },
    LoginBox(LoginBox),
    Payment {
        /// `None` until the visitor signs in.
        form: Option<FormDescriptor>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        errors: FieldErrors,
    },
    Directory(DirectoryListing),
    Map(MapView),
}

fn flag_message(flags: &StatusFlags, flag: StatusFlag) -> Option<String> {
    if !flags.contains(flag) {
        return None;
    }
    let message = match flag {
        StatusFlag::MemberUpdated => "Your profile has been updated.".to_string(),
        StatusFlag::MemberLoggedIn => "You are now signed in.".to_string(),
        StatusFlag::MemberLoggedOut => "You have been signed out.".to_string(),
        StatusFlag::PaymentReceived if flags.contains(StatusFlag::EmailSent) => {
            "Thank you! Your payment has been received. A receipt has been emailed to you."
                .to_string()
        }
        StatusFlag::PaymentReceived => "Thank you! Your payment has been received.".to_string(),
        StatusFlag::EmailSent => "A receipt has been emailed to you.".to_string(),
        StatusFlag::MembersImportSuccessful => "Members imported successfully.".to_string(),
    };
    Some(message)
}

impl<S: MemberStore> Portal<S> {
    pub async fn render(&self, shortcode: &Shortcode, ctx: &PageContext<'_>) -> Result<PageView> {
        let options = self.repo().options().await?;
        let form = |kind: FormKind| self.form(kind, ctx.scope, &options, ctx.seed, ctx.now);
        let failure_message = |kind: FormKind| match ctx.failure_for(kind) {
            Some(failure) => (Some(failure.message.clone()), failure.errors.clone()),
            None => (None, FieldErrors::new()),
        };

        let view = match shortcode {
            Shortcode::MemberProfile => {
                let (message, errors) = failure_message(FormKind::Profile);
                PageView::Profile {
                    form: form(FormKind::Profile),
                    message: message.or_else(|| flag_message(ctx.flags, StatusFlag::MemberUpdated)),
                    errors,
                }
            }
            Shortcode::LoginBox { collapsed, link } => match ctx.scope.account() {
                Some(account) => PageView::LoginBox(LoginBox::Welcome {
                    display_name: account.display_name.clone(),
                    profile_link: options.pages.profile.clone(),
                    logout: form(FormKind::Logout),
                    message: flag_message(ctx.flags, StatusFlag::MemberLoggedIn),
                }),
                None => {
                    let (message, errors) = failure_message(FormKind::Login);
                    PageView::LoginBox(LoginBox::SignIn {
                        form: form(FormKind::Login),
                        // A failed sign-in is shown expanded.
                        collapsed: *collapsed && message.is_none(),
                        register_link: link.clone().unwrap_or_else(|| options.pages.profile.clone()),
                        message: message
                            .or_else(|| flag_message(ctx.flags, StatusFlag::MemberLoggedOut)),
                        errors,
                    })
                }
            },
            Shortcode::PaymentForm => {
                let (message, errors) = failure_message(FormKind::Payment);
                match ctx.scope.account() {
                    Some(_) => PageView::Payment {
                        form: Some(form(FormKind::Payment)),
                        message: message
                            .or_else(|| flag_message(ctx.flags, StatusFlag::PaymentReceived)),
                        errors,
                    },
                    None => PageView::Payment {
                        form: None,
                        message: Some(PAYMENT_SIGN_IN_MESSAGE.to_string()),
                        errors,
                    },
                }
            }
            Shortcode::Directory => {
                let accounts = self.located_members(ctx.now).await?;
                PageView::Directory(directory(ctx.scope.viewer(), &accounts, &options))
            }
            Shortcode::Map => {
                let accounts = self.located_members(ctx.now).await?;
                PageView::Map(map(ctx.scope.viewer(), &accounts, &options))
            }
        };
        Ok(view)
    }

    /// Render every shortcode found in `content`, in order.
    pub async fn render_content(&self, content: &str, ctx: &PageContext<'_>) -> Result<Vec<PageView>> {
        let mut views = Vec::new();
        for shortcode in parse_shortcodes(content) {
            views.push(self.render(&shortcode, ctx).await?);
        }
        Ok(views)
    }

    /// Member accounts, with missing coordinates looked up as far as the throttle allows.
    /// Lookup trouble never fails the page.
    async fn located_members(&self, now: DateTime<Utc>) -> Result<Vec<store::MemberAccount>> {
        let mut accounts = self.repo().members().await?;
        if let Some(geocoder) = self.geocoder() {
            if let Err(e) = geocoder.fill_missing(self.repo(), &mut accounts, now).await {
                tracing::warn!(error = %e, "geocoding skipped");
            }
        }
        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use store::{
        Geocode, MemberAccount, MemberStatus, MemoryStore, NewAccount, Profile, ProfilesPublic,
        PortalOptions,
    };

    use super::*;
    use crate::fields::core::ids;
    use crate::geocode::{GeocodeService, Geocoder};
    use crate::handlers::testing::{portal, SEED};
    use crate::viewer::Viewer;

    struct FixedGeocoder;

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn geocode(&self, _: &str) -> std::result::Result<Option<Geocode>, String> {
            Ok(Some(Geocode { lat: 39.7, lng: -105.0 }))
        }
    }

    fn ctx<'a>(scope: &'a RequestScope, flags: &'a StatusFlags) -> PageContext<'a> {
        PageContext {
            scope,
            flags,
            seed: SEED,
            now: Utc::now(),
            failure: None,
        }
    }

    async fn active_member(portal: &Portal<MemoryStore>, login: &str, name: &str) -> MemberAccount {
        let mut account = portal
            .repo()
            .store()
            .insert_account(NewAccount {
                login: login.into(),
                email: format!("{}@acme.test", login),
                display_name: name.into(),
                profile: Profile {
                    company_name: name.into(),
                    company_city: "Denver".into(),
                    company_state: "CO".into(),
                    member_status: MemberStatus::Active,
                    ..Profile::default()
                },
                ..NewAccount::default()
            })
            .await
            .unwrap();
        portal
            .repo()
            .assign_member_role(&mut account, "asamp_standardasamember")
            .await
            .unwrap();
        account
    }

    #[tokio::test]
    async fn test_profile_view_per_viewer() {
        let portal = portal();
        let flags = StatusFlags::default();

        let anonymous = RequestScope::anonymous();
        let PageView::Profile { form, message, .. } = portal
            .render(&Shortcode::MemberProfile, &ctx(&anonymous, &flags))
            .await
            .unwrap()
        else {
            panic!("expected profile view");
        };
        assert_eq!(form.submit_label, "Join Now");
        assert!(form.field(ids::LOGIN).is_some());
        assert_eq!(message, None);

        let member = active_member(&portal, "acme", "Acme").await;
        let scope = RequestScope::signed_in(member);
        let flags: StatusFlags = [StatusFlag::MemberUpdated].into_iter().collect();
        let PageView::Profile { form, message, .. } = portal
            .render(&Shortcode::MemberProfile, &ctx(&scope, &flags))
            .await
            .unwrap()
        else {
            panic!("expected profile view");
        };
        assert_eq!(form.submit_label, "Update Profile");
        assert_eq!(
            form.field(ids::COMPANY_NAME).and_then(|f| f.value.as_text()),
            Some("Acme")
        );
        assert_eq!(message.as_deref(), Some("Your profile has been updated."));
    }

    #[tokio::test]
    async fn test_login_box_states() {
        let portal = portal();
        let flags = StatusFlags::default();
        let anonymous = RequestScope::anonymous();
        let shortcode = Shortcode::LoginBox {
            collapsed: true,
            link: None,
        };
        match portal.render(&shortcode, &ctx(&anonymous, &flags)).await.unwrap() {
            PageView::LoginBox(LoginBox::SignIn {
                collapsed,
                register_link,
                form,
                ..
            }) => {
                assert!(collapsed);
                assert_eq!(register_link, "/member-profile");
                assert_eq!(form.submit_label, "Sign In");
            }
            other => panic!("unexpected {:?}", other),
        }

        let failure = FormFailure {
            errors: FieldErrors::new(),
            message: "Invalid username or password.".into(),
        };
        let mut failed = ctx(&anonymous, &flags);
        failed.failure = Some((FormKind::Login, &failure));
        match portal.render(&shortcode, &failed).await.unwrap() {
            PageView::LoginBox(LoginBox::SignIn {
                collapsed, message, ..
            }) => {
                assert!(!collapsed);
                assert_eq!(message.as_deref(), Some("Invalid username or password."));
            }
            other => panic!("unexpected {:?}", other),
        }

        let member = active_member(&portal, "acme", "Acme").await;
        let scope = RequestScope::signed_in(member);
        match portal.render(&shortcode, &ctx(&scope, &flags)).await.unwrap() {
            PageView::LoginBox(LoginBox::Welcome {
                display_name,
                logout,
                ..
            }) => {
                assert_eq!(display_name, "Acme");
                assert_eq!(logout.submit_label, "Sign Out");
                assert!(logout.field(&FormKind::Logout.nonce_field()).is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_payment_view_requires_sign_in() {
        let portal = portal();
        let anonymous = RequestScope::anonymous();
        let flags: StatusFlags = [StatusFlag::PaymentReceived, StatusFlag::EmailSent]
            .into_iter()
            .collect();
        match portal
            .render(&Shortcode::PaymentForm, &ctx(&anonymous, &flags))
            .await
            .unwrap()
        {
            PageView::Payment { form, message, .. } => {
                assert!(form.is_none());
                assert_eq!(message.as_deref(), Some(PAYMENT_SIGN_IN_MESSAGE));
            }
            other => panic!("unexpected {:?}", other),
        }

        let member = active_member(&portal, "acme", "Acme").await;
        let scope = RequestScope::signed_in(member);
        match portal
            .render(&Shortcode::PaymentForm, &ctx(&scope, &flags))
            .await
            .unwrap()
        {
            PageView::Payment { form, message, .. } => {
                let form = form.unwrap();
                assert_eq!(
                    form.field(ids::PAYMENT_MEMBER_TYPE).and_then(|f| f.value.as_text()),
                    Some("asamp_standardasamember")
                );
                assert!(message.unwrap().contains("receipt has been emailed"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_directory_and_map_fill_coordinates() {
        let portal = Portal::builder(MemoryStore::new(), "secret")
            .geocoder(GeocodeService::new(
                Arc::new(FixedGeocoder),
                chrono::Duration::zero(),
            ))
            .build()
            .unwrap();
        portal
            .repo()
            .store()
            .save_options(&PortalOptions {
                profiles_public: ProfilesPublic::None,
                ..PortalOptions::default()
            })
            .await
            .unwrap();
        active_member(&portal, "bolt", "Bolt").await;
        active_member(&portal, "acme", "Acme").await;

        let flags = StatusFlags::default();
        let anonymous = RequestScope::anonymous();
        match portal
            .render_content(
                "[asamp_member_directory]\n[asamp_member_map]",
                &ctx(&anonymous, &flags),
            )
            .await
            .unwrap()
            .as_slice()
        {
            [PageView::Directory(listing), PageView::Map(view)] => {
                assert!(listing.is_empty());
                assert!(listing.notice.is_some());
                assert!(view.markers.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }

        let member = portal.repo().store().account_by_login("acme").await.unwrap().unwrap();
        assert!(member.profile.geocode.is_some());
        let scope = RequestScope::signed_in(member);
        assert_eq!(scope.viewer(), Viewer::Member);
        match portal
            .render(&Shortcode::Directory, &ctx(&scope, &flags))
            .await
            .unwrap()
        {
            PageView::Directory(listing) => {
                let names: Vec<&str> = listing
                    .groups
                    .iter()
                    .flat_map(|g| g.entries.iter().map(|e| e.company_name.as_str()))
                    .collect();
                assert_eq!(names, vec!["Acme", "Bolt"]);
            }
            other => panic!("unexpected {:?}", other),
        }
        match portal.render(&Shortcode::Map, &ctx(&scope, &flags)).await.unwrap() {
            PageView::Map(view) => assert_eq!(view.markers.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }
}
