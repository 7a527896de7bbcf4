//! # Portal options: the admin-editable settings blob
//!
//! [`PortalOptions`] is the single configuration record an administrator edits on the
//! settings screen. Stores persist it as TOML text ([`PortalOptions::to_toml`] /
//! [`PortalOptions::from_toml`]); every field carries a serde default so an empty or
//! partial document is equivalent to the defaults.
//!
//! ```toml
//! state_default = "CO"
//! num_contacts = 3
//! trades_other = "yes"
//! profiles_public = "basic"
//!
//! [[member_types]]
//! name = "Standard ASA Member"
//! dues = 90000            # cents
//!
//! [[admin_contacts]]
//! name = "Office"
//! email = "office@example.org"
//! kind = "to"
//! ```

use serde::{Deserialize, Serialize};

use crate::models::{MemberType, Money};

pub const DEFAULT_MEMBER_TYPE_NAME: &str = "Standard ASA Member";
pub const DEFAULT_MEMBER_TYPE_DUES: u64 = 900;
pub const DEFAULT_MEMBER_TYPE_LABEL: &str = "Member Type";
pub const DEFAULT_NUM_CONTACTS: u32 = 3;

/// A yes/no radio option.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    #[default]
    Yes,
    No,
}

impl Toggle {
    pub fn as_str(self) -> &'static str {
        match self {
            Toggle::Yes => "yes",
            Toggle::No => "no",
        }
    }

    pub fn is_yes(self) -> bool {
        self == Toggle::Yes
    }
}

/// How much of a member's card non-members may see in the directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfilesPublic {
    All,
    #[default]
    Basic,
    None,
}

impl ProfilesPublic {
    pub fn as_str(self) -> &'static str {
        match self {
            ProfilesPublic::All => "all",
            ProfilesPublic::Basic => "basic",
            ProfilesPublic::None => "none",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientKind {
    #[default]
    To,
    Cc,
    Bcc,
}

/// A recipient of every email the portal sends to administrators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdminContact {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub kind: RecipientKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayPalProOptions {
    #[serde(default = "toggle_no")]
    pub enabled: Toggle,
    #[serde(default)]
    pub api_username: String,
    #[serde(default)]
    pub api_password: String,
    #[serde(default)]
    pub api_signature: String,
}

impl Default for PayPalProOptions {
    fn default() -> Self {
        Self {
            enabled: Toggle::No,
            api_username: String::new(),
            api_password: String::new(),
            api_signature: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StripeOptions {
    #[serde(default = "toggle_no")]
    pub enabled: Toggle,
    #[serde(default)]
    pub api_key: String,
}

impl Default for StripeOptions {
    fn default() -> Self {
        Self {
            enabled: Toggle::No,
            api_key: String::new(),
        }
    }
}

/// Paths of the pages hosting each embedding point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageBindings {
    pub profile: String,
    pub login: String,
    pub payment: String,
    pub directory: String,
    pub map: String,
    /// Where a successful sign-in lands.
    pub after_login: String,
    /// Where a successful sign-out lands.
    pub after_logout: String,
    /// Where a successful payment lands.
    pub after_payment: String,
}

impl Default for PageBindings {
    fn default() -> Self {
        Self {
            profile: "/member-profile".into(),
            login: "/member-login".into(),
            payment: "/member-dues".into(),
            directory: "/member-directory".into(),
            map: "/member-map".into(),
            after_login: "/member-profile".into(),
            after_logout: "/".into(),
            after_payment: "/member-profile".into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapCenter {
    pub lat: f64,
    pub lng: f64,
    pub zoom: u8,
}

impl Default for MapCenter {
    fn default() -> Self {
        Self {
            lat: 39.8283,
            lng: -98.5795,
            zoom: 4,
        }
    }
}

/// The portal's settings record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalOptions {
    /// State preselected on the registration form.
    pub state_default: String,
    /// Maximum number of contact rows per member.
    pub num_contacts: u32,
    /// One trade per entry; empty means the built-in list.
    pub trades: Vec<String>,
    /// Whether members may add free-text "other" trades.
    pub trades_other: Toggle,
    pub google_recaptcha_site_key: String,
    pub google_recaptcha_secret_key: String,
    pub member_type_label: String,
    /// Empty means the single default member type.
    pub member_types: Vec<MemberType>,
    pub profiles_public: ProfilesPublic,
    pub members_grouped_by_type: Toggle,
    pub admin_contacts: Vec<AdminContact>,
    pub paypal_pro: PayPalProOptions,
    pub stripe: StripeOptions,
    pub pages: PageBindings,
    pub map_center: MapCenter,
}

impl Default for PortalOptions {
    fn default() -> Self {
        Self {
            state_default: String::new(),
            num_contacts: DEFAULT_NUM_CONTACTS,
            trades: default_trades(),
            trades_other: Toggle::Yes,
            google_recaptcha_site_key: String::new(),
            google_recaptcha_secret_key: String::new(),
            member_type_label: DEFAULT_MEMBER_TYPE_LABEL.into(),
            member_types: vec![default_member_type()],
            profiles_public: ProfilesPublic::Basic,
            members_grouped_by_type: Toggle::Yes,
            admin_contacts: Vec::new(),
            paypal_pro: PayPalProOptions::default(),
            stripe: StripeOptions::default(),
            pages: PageBindings::default(),
            map_center: MapCenter::default(),
        }
    }
}

fn toggle_no() -> Toggle {
    Toggle::No
}

pub fn default_member_type() -> MemberType {
    MemberType::new(
        DEFAULT_MEMBER_TYPE_NAME,
        Money::from_dollars(DEFAULT_MEMBER_TYPE_DUES),
    )
}

impl PortalOptions {
    /// Configured member types, or the single default type when none are set.
    pub fn member_types(&self) -> Vec<MemberType> {
        if self.member_types.is_empty() {
            vec![default_member_type()]
        } else {
            self.member_types.clone()
        }
    }

    pub fn member_type_by_slug(&self, slug: &str) -> Option<MemberType> {
        self.member_types().into_iter().find(|t| t.role_slug() == slug)
    }

    pub fn member_type_by_name(&self, name: &str) -> Option<MemberType> {
        let name = name.trim();
        self.member_types().into_iter().find(|t| t.name == name)
    }

    /// Trades list, or the built-in list when the option is empty.
    pub fn trades(&self) -> Vec<String> {
        let trades: Vec<String> = self
            .trades
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if trades.is_empty() {
            default_trades()
        } else {
            trades
        }
    }

    pub fn member_type_label(&self) -> &str {
        if self.member_type_label.trim().is_empty() {
            DEFAULT_MEMBER_TYPE_LABEL
        } else {
            &self.member_type_label
        }
    }

    /// Parse from TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Built-in trades offered when the admin has not configured any.
pub fn default_trades() -> Vec<String> {
    [
        "Accounting",
        "Architectural",
        "Asbestos Abatement",
        "Attorney / Construction",
        "Banking / Financial",
        "Bonding / Insurance",
        "Carpentry (MLWK)",
        "Communications",
        "Computer Facilities",
        "Concrete",
        "Conveying Systems",
        "Countertops",
        "Doors & Hardware",
        "Drywall / Plaster / Acoustic",
        "Electrical",
        "Elevator / Escalator",
        "Environmental",
        "Excavating / Earth Moving",
        "Fence",
        "Fire Proofing",
        "Fire Protection",
        "Fire Sprinkling",
        "Flooring",
        "Foundation Drilling",
        "Glass & Glazing",
        "HVAC",
        "Insulation",
        "Landscaping",
        "Lumber",
        "Masonry",
        "Mechanical",
        "Mechanical Insulation",
        "Metal Deck",
        "Metals",
        "Miscellaneous",
        "Newspaper",
        "Paint / Decorate",
        "Paving",
        "Plumbing",
        "Professional Service",
        "Publishing",
        "Rebar",
        "Rentals",
        "Rigging / Hauling",
        "Roofing",
        "Sales",
        "Scaffolding",
        "Security Systems",
        "Sheet Metal / Fabrication",
        "Steel",
        "Supplier",
        "Tile / Terrazzo / Marble",
        "Transportation",
        "Trucking",
        "Water Well Drilling",
        "Waterproofing",
        "Woodwork (Interior)",
        "Wrecking / Demolition",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
