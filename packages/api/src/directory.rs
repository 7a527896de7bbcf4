//! Member directory and map views.
//!
//! Only accounts holding a member role with an active membership are listed. Members
//! and admins always see full cards; non-members see what the `profiles_public` option
//! allows (`all`, `basic` or `none`).

use serde::Serialize;
use store::options::MapCenter;
use store::{AccountId, Contact, MemberAccount, MemberStatus, PortalOptions, ProfilesPublic};

use crate::viewer::Viewer;

pub const MEMBERS_ONLY_NOTICE: &str = "The member directory is available to members only.";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MemberDetails {
    pub description: String,
    pub street: String,
    pub zip: String,
    pub email: String,
    pub logo: String,
    pub year_founded: Option<i32>,
    pub num_employees: Option<u32>,
    pub business_types: Vec<String>,
    pub contacts: Vec<Contact>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DirectoryEntry {
    pub id: AccountId,
    pub company_name: String,
    pub city: String,
    pub state: String,
    pub phone: String,
    pub website: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<MemberDetails>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DirectoryGroup {
    /// Member type name; `None` when the directory is not grouped.
    pub member_type: Option<String>,
    pub entries: Vec<DirectoryEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DirectoryListing {
    pub groups: Vec<DirectoryGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl DirectoryListing {
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapMarker {
    pub id: AccountId,
    pub company_name: String,
    pub city: String,
    pub state: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapView {
    pub center: MapCenter,
    pub markers: Vec<MapMarker>,
}

/// Full cards, basic cards, or nothing.
fn disclosure(viewer: Viewer, options: &PortalOptions) -> Option<bool> {
    match (viewer, options.profiles_public) {
        (Viewer::Admin | Viewer::Member, _) | (Viewer::NonMember, ProfilesPublic::All) => Some(true),
        (Viewer::NonMember, ProfilesPublic::Basic) => Some(false),
        (Viewer::NonMember, ProfilesPublic::None) => None,
    }
}

fn listed(accounts: &[MemberAccount]) -> Vec<&MemberAccount> {
    let mut listed: Vec<&MemberAccount> = accounts
        .iter()
        .filter(|a| a.is_member() && a.profile.member_status == MemberStatus::Active)
        .collect();
    listed.sort_by(|a, b| {
        a.profile
            .company_name
            .to_lowercase()
            .cmp(&b.profile.company_name.to_lowercase())
            .then(a.id.cmp(&b.id))
    });
    listed
}

fn entry(account: &MemberAccount, full: bool) -> DirectoryEntry {
    let p = &account.profile;
    DirectoryEntry {
        id: account.id,
        company_name: p.company_name.clone(),
        city: p.company_city.clone(),
        state: p.company_state.clone(),
        phone: p.company_phone.clone(),
        website: p.company_website.clone(),
        details: full.then(|| MemberDetails {
            description: p.company_description.clone(),
            street: p.company_street.clone(),
            zip: p.company_zip.clone(),
            email: p.company_email.clone(),
            logo: p.company_logo.clone(),
            year_founded: p.company_year_founded,
            num_employees: p.company_num_employees,
            business_types: p
                .company_business_type
                .iter()
                .chain(&p.company_business_type_other)
                .cloned()
                .collect(),
            contacts: p.company_contacts.clone(),
        }),
    }
}

pub fn directory(viewer: Viewer, accounts: &[MemberAccount], options: &PortalOptions) -> DirectoryListing {
    let Some(full) = disclosure(viewer, options) else {
        return DirectoryListing {
            groups: Vec::new(),
            notice: Some(MEMBERS_ONLY_NOTICE.to_string()),
        };
    };
    let members = listed(accounts);

    if !options.members_grouped_by_type.is_yes() {
        let entries: Vec<DirectoryEntry> = members.iter().map(|a| entry(a, full)).collect();
        return DirectoryListing {
            groups: vec![DirectoryGroup {
                member_type: None,
                entries,
            }],
            notice: None,
        };
    }

    let types = options.member_types();
    let mut groups: Vec<DirectoryGroup> = types
        .iter()
        .map(|t| DirectoryGroup {
            member_type: Some(t.name.clone()),
            entries: members
                .iter()
                .filter(|a| a.roles.contains(&t.role_slug()))
                .map(|a| entry(a, full))
                .collect(),
        })
        .collect();
    let others: Vec<DirectoryEntry> = members
        .iter()
        .filter(|a| !types.iter().any(|t| a.roles.contains(&t.role_slug())))
        .map(|a| entry(a, full))
        .collect();
    groups.push(DirectoryGroup {
        member_type: Some("Other Members".to_string()),
        entries: others,
    });
    groups.retain(|g| !g.entries.is_empty());

    DirectoryListing {
        groups,
        notice: None,
    }
}

pub fn map(viewer: Viewer, accounts: &[MemberAccount], options: &PortalOptions) -> MapView {
    let markers = match disclosure(viewer, options) {
        None => Vec::new(),
        Some(_) => listed(accounts)
            .into_iter()
            .filter_map(|a| {
                a.profile.geocode.map(|g| MapMarker {
                    id: a.id,
                    company_name: a.profile.company_name.clone(),
                    city: a.profile.company_city.clone(),
                    state: a.profile.company_state.clone(),
                    lat: g.lat,
                    lng: g.lng,
                })
            })
            .collect(),
    };
    MapView {
        center: options.map_center,
        markers,
    }
}
