//! # Domain records for accounts, contacts, and dues payments
//!
//! These types are what every [`crate::MemberStore`] persists and what the `api` crate
//! reads and mutates while handling a request. They are `Serialize + Deserialize` so
//! the PostgreSQL store can keep the profile as a JSONB column and the web layer can
//! return them directly.
//!
//! ## Types
//!
//! | Struct | Represents |
//! |--------|-----------|
//! | [`MemberAccount`] | An identity (login, Argon2 hash, email, roles) plus its [`Profile`]. |
//! | [`Profile`] | Company details, contacts, business types, membership status and dates, geocode. |
//! | [`Contact`] | One repeatable contact row owned by a profile. |
//! | [`DuesPayment`] | An append-only record of a captured dues payment. |
//! | [`MemberType`] | An admin-configured category with a dues amount, mapped 1:1 to a role. |
//! | [`Role`] | An authorization role (`slug`, `label`). |
//!
//! ## Field access by key
//!
//! Forms and CSV transfer address profile fields by their short key
//! (`"company_name"`, `"company_contacts"`, …). [`Profile::value`] and
//! [`Profile::set_value`] are the typed boundary for that: each key has a fixed
//! [`Cardinality`], and the returned [`FieldValue`] always has the matching shape.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::repo::StoreError;

pub type AccountId = u64;
pub type PaymentId = u64;

/// Prefix shared by every role this portal creates.
pub const ROLE_PREFIX: &str = "asamp_";

/// Lowercase a name and keep only `[a-z0-9_-]`.
pub fn sanitize_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect()
}

/// An amount of money in cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub u64);

impl Money {
    pub fn from_dollars(dollars: u64) -> Self {
        Self(dollars * 100)
    }

    pub fn cents(self) -> u64 {
        self.0
    }

    /// Parse `"900"`, `"900.5"`, `"$1,200.50"`.
    pub fn parse(input: &str) -> Option<Self> {
        let cleaned: String = input
            .trim()
            .chars()
            .filter(|c| *c != '$' && *c != ',')
            .collect();
        if cleaned.is_empty() {
            return None;
        }
        let (whole, frac) = match cleaned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (cleaned.as_str(), ""),
        };
        if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let frac: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().ok()? * 10,
            _ => frac.parse().ok()?,
        };
        whole.checked_mul(100)?.checked_add(frac).map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (whole, cents) = (self.0 / 100, self.0 % 100);
        if cents == 0 {
            write!(f, "${}", whole)
        } else {
            write!(f, "${}.{:02}", whole, cents)
        }
    }
}

/// An authorization role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub slug: String,
    pub label: String,
}

/// Admin-configured member category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberType {
    pub name: String,
    /// Yearly dues.
    pub dues: Money,
}

impl MemberType {
    pub fn new(name: impl Into<String>, dues: Money) -> Self {
        Self {
            name: name.into(),
            dues,
        }
    }

    pub fn role_slug(&self) -> String {
        format!("{}{}", ROLE_PREFIX, sanitize_key(&self.name))
    }

    pub fn role(&self) -> Role {
        Role {
            slug: self.role_slug(),
            label: self.name.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    #[default]
    Inactive,
}

impl MemberStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(MemberStatus::Active),
            "inactive" => Some(MemberStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geocode {
    pub lat: f64,
    pub lng: f64,
}

/// One contact row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name_first: String,
    #[serde(default)]
    pub name_last: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub fax: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub asa_position: String,
}

impl Contact {
    pub const FIELDS: [&'static str; 7] = [
        "name_first",
        "name_last",
        "phone",
        "fax",
        "email",
        "title",
        "asa_position",
    ];

    pub fn get(&self, field: &str) -> Option<&str> {
        Some(match field {
            "name_first" => self.name_first.as_str(),
            "name_last" => self.name_last.as_str(),
            "phone" => self.phone.as_str(),
            "fax" => self.fax.as_str(),
            "email" => self.email.as_str(),
            "title" => self.title.as_str(),
            "asa_position" => self.asa_position.as_str(),
            _ => return None,
        })
    }

    pub fn set(&mut self, field: &str, value: String) -> bool {
        let slot = match field {
            "name_first" => &mut self.name_first,
            "name_last" => &mut self.name_last,
            "phone" => &mut self.phone,
            "fax" => &mut self.fax,
            "email" => &mut self.email,
            "title" => &mut self.title,
            "asa_position" => &mut self.asa_position,
            _ => return false,
        };
        *slot = value;
        true
    }

    pub fn is_empty(&self) -> bool {
        Self::FIELDS
            .iter()
            .all(|f| self.get(f).map_or(true, |v| v.trim().is_empty()))
    }

    pub fn to_row(&self) -> BTreeMap<String, String> {
        Self::FIELDS
            .iter()
            .map(|f| (f.to_string(), self.get(f).unwrap_or_default().to_string()))
            .collect()
    }

    pub fn from_row(row: &BTreeMap<String, String>) -> Self {
        let mut contact = Contact::default();
        for (k, v) in row {
            contact.set(k, v.clone());
        }
        contact
    }
}

/// Shape of a profile field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    Scalar,
    List,
    Rows,
}

/// A profile value shaped by its field's [`Cardinality`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Rows(Vec<BTreeMap<String, String>>),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(v) => v.iter().all(|s| s.trim().is_empty()),
            FieldValue::Rows(rows) => rows.iter().all(|r| r.values().all(|s| s.trim().is_empty())),
        }
    }
}

/// Profile fields attached to an account.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub company_name: String,
    pub company_description: String,
    pub company_street: String,
    pub company_city: String,
    pub company_state: String,
    pub company_zip: String,
    pub company_phone: String,
    pub company_email: String,
    pub company_website: String,
    pub company_logo: String,
    pub company_year_founded: Option<i32>,
    pub company_num_employees: Option<u32>,
    pub company_business_type: Vec<String>,
    pub company_business_type_other: Vec<String>,
    pub company_contacts: Vec<Contact>,
    pub member_status: MemberStatus,
    pub member_date_joined: Option<NaiveDate>,
    pub member_expiry: Option<NaiveDate>,
    pub geocode: Option<Geocode>,
    pub geocode_failures: u32,
}

impl Profile {
    /// Keys addressable through [`Profile::value`], in export order.
    pub const KEYS: [(&'static str, Cardinality); 18] = [
        ("member_status", Cardinality::Scalar),
        ("member_date_joined", Cardinality::Scalar),
        ("member_expiry", Cardinality::Scalar),
        ("company_name", Cardinality::Scalar),
        ("company_description", Cardinality::Scalar),
        ("company_street", Cardinality::Scalar),
        ("company_city", Cardinality::Scalar),
        ("company_state", Cardinality::Scalar),
        ("company_zip", Cardinality::Scalar),
        ("company_phone", Cardinality::Scalar),
        ("company_email", Cardinality::Scalar),
        ("company_website", Cardinality::Scalar),
        ("company_logo", Cardinality::Scalar),
        ("company_year_founded", Cardinality::Scalar),
        ("company_num_employees", Cardinality::Scalar),
        ("company_business_type", Cardinality::List),
        ("company_business_type_other", Cardinality::List),
        ("company_contacts", Cardinality::Rows),
    ];

    pub fn cardinality(key: &str) -> Option<Cardinality> {
        Self::KEYS.iter().find(|(k, _)| *k == key).map(|(_, c)| *c)
    }

    /// Read a field by key. Unknown keys yield `None`.
    pub fn value(&self, key: &str) -> Option<FieldValue> {
        let text = |s: &String| Some(FieldValue::Text(s.clone()));
        match key {
            "member_status" => Some(FieldValue::text(self.member_status.as_str())),
            "member_date_joined" => Some(FieldValue::Text(fmt_date(self.member_date_joined))),
            "member_expiry" => Some(FieldValue::Text(fmt_date(self.member_expiry))),
            "company_name" => text(&self.company_name),
            "company_description" => text(&self.company_description),
            "company_street" => text(&self.company_street),
            "company_city" => text(&self.company_city),
            "company_state" => text(&self.company_state),
            "company_zip" => text(&self.company_zip),
            "company_phone" => text(&self.company_phone),
            "company_email" => text(&self.company_email),
            "company_website" => text(&self.company_website),
            "company_logo" => text(&self.company_logo),
            "company_year_founded" => Some(FieldValue::Text(
                self.company_year_founded.map(|y| y.to_string()).unwrap_or_default(),
            )),
            "company_num_employees" => Some(FieldValue::Text(
                self.company_num_employees.map(|n| n.to_string()).unwrap_or_default(),
            )),
            "company_business_type" => Some(FieldValue::List(self.company_business_type.clone())),
            "company_business_type_other" => {
                Some(FieldValue::List(self.company_business_type_other.clone()))
            }
            "company_contacts" => Some(FieldValue::Rows(
                self.company_contacts.iter().map(Contact::to_row).collect(),
            )),
            _ => None,
        }
    }

    /// Write a field by key. The value's shape must match the key's cardinality;
    /// a scalar given for a list key becomes a one-element list.
    pub fn set_value(&mut self, key: &str, value: FieldValue) -> Result<(), StoreError> {
        let cardinality =
            Self::cardinality(key).ok_or_else(|| StoreError::UnknownField(key.to_string()))?;
        match (cardinality, value) {
            (Cardinality::Scalar, FieldValue::Text(s)) => self.set_scalar(key, s),
            (Cardinality::List, FieldValue::List(items)) => {
                let items = items.into_iter().filter(|s| !s.trim().is_empty()).collect();
                match key {
                    "company_business_type" => self.company_business_type = items,
                    _ => self.company_business_type_other = items,
                }
                Ok(())
            }
            (Cardinality::List, FieldValue::Text(s)) => {
                self.set_value(key, FieldValue::List(vec![s]))
            }
            (Cardinality::Rows, FieldValue::Rows(rows)) => {
                self.company_contacts = rows
                    .iter()
                    .map(Contact::from_row)
                    .filter(|c| !c.is_empty())
                    .collect();
                Ok(())
            }
            _ => Err(StoreError::InvalidValue(key.to_string())),
        }
    }

    fn set_scalar(&mut self, key: &str, s: String) -> Result<(), StoreError> {
        let invalid = || StoreError::InvalidValue(key.to_string());
        let trimmed = s.trim();
        match key {
            "member_status" => {
                self.member_status = MemberStatus::parse(trimmed).ok_or_else(invalid)?
            }
            "member_date_joined" => self.member_date_joined = parse_date(trimmed).map_err(|_| invalid())?,
            "member_expiry" => self.member_expiry = parse_date(trimmed).map_err(|_| invalid())?,
            "company_year_founded" => {
                self.company_year_founded = parse_opt_number(trimmed).map_err(|_| invalid())?
            }
            "company_num_employees" => {
                self.company_num_employees = parse_opt_number(trimmed).map_err(|_| invalid())?
            }
            "company_name" => self.company_name = s,
            "company_description" => self.company_description = s,
            "company_street" => self.company_street = s,
            "company_city" => self.company_city = s,
            "company_state" => self.company_state = s,
            "company_zip" => self.company_zip = s,
            "company_phone" => self.company_phone = s,
            "company_email" => self.company_email = s,
            "company_website" => self.company_website = s,
            "company_logo" => self.company_logo = s,
            _ => return Err(StoreError::UnknownField(key.to_string())),
        }
        Ok(())
    }

    /// Single-line postal address, used for geocoding.
    pub fn address_line(&self) -> Option<String> {
        let parts: Vec<&str> = [
            self.company_street.as_str(),
            self.company_city.as_str(),
            self.company_state.as_str(),
            self.company_zip.as_str(),
        ]
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

fn parse_date(s: &str) -> Result<Option<NaiveDate>, chrono::ParseError> {
    if s.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Some)
}

fn parse_opt_number<T: std::str::FromStr>(s: &str) -> Result<Option<T>, T::Err> {
    if s.is_empty() {
        Ok(None)
    } else {
        s.parse().map(Some)
    }
}

/// A registered identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberAccount {
    pub id: AccountId,
    pub login: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub roles: BTreeSet<String>,
    pub hide_admin_bar: bool,
    pub profile: Profile,
    pub registered_at: DateTime<Utc>,
}

impl MemberAccount {
    /// The account's member role slug, if it holds one.
    pub fn member_role(&self) -> Option<&str> {
        self.roles
            .iter()
            .find(|r| r.starts_with(ROLE_PREFIX))
            .map(String::as_str)
    }

    pub fn is_member(&self) -> bool {
        self.member_role().is_some()
    }
}

/// Fields needed to create an account.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewAccount {
    pub login: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub roles: BTreeSet<String>,
    pub hide_admin_bar: bool,
    pub profile: Profile,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Draft,
    Private,
    Trash,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Draft => "draft",
            PaymentStatus::Private => "private",
            PaymentStatus::Trash => "trash",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PaymentStatus::Draft),
            "private" => Some(PaymentStatus::Private),
            "trash" => Some(PaymentStatus::Trash),
            _ => None,
        }
    }
}

/// A captured dues payment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DuesPayment {
    pub id: PaymentId,
    pub account_id: AccountId,
    pub title: String,
    pub slug: String,
    pub status: PaymentStatus,
    pub amount: Money,
    pub member_type: String,
    pub card_type: String,
    pub card_masked: String,
    pub card_exp_month: u32,
    pub card_exp_year: i32,
    pub cc_name: String,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

impl DuesPayment {
    /// Apply the first-save rules: numbered title and slug, then private visibility.
    /// Returns `true` if anything changed.
    pub fn finalize(&mut self) -> bool {
        let mut changed = false;
        let title = format!("Payment #{}", self.id);
        if self.title != title {
            self.title = title;
            self.slug = format!("payment-{}", self.id);
            changed = true;
        }
        if !matches!(self.status, PaymentStatus::Private | PaymentStatus::Trash) {
            self.status = PaymentStatus::Private;
            changed = true;
        }
        changed
    }
}

/// Fields needed to record a payment.
#[derive(Clone, Debug, PartialEq)]
pub struct NewPayment {
    pub account_id: AccountId,
    pub amount: Money,
    pub member_type: String,
    pub card_type: String,
    pub card_masked: String,
    pub card_exp_month: u32,
    pub card_exp_year: i32,
    pub cc_name: String,
    pub reference: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_parse_and_display() {
        assert_eq!(Money::parse("900"), Some(Money(90000)));
        assert_eq!(Money::parse("$1,200.5"), Some(Money(120050)));
        assert_eq!(Money::parse("12.345"), None);
        assert_eq!(Money::parse(""), None);
        assert_eq!(Money::from_dollars(900).to_string(), "$900");
        assert_eq!(Money(120050).to_string(), "$1200.50");
    }

    #[test]
    fn test_role_slug() {
        let t = MemberType::new("Standard ASA Member", Money::from_dollars(900));
        assert_eq!(t.role_slug(), "asamp_standardasamember");
        assert_eq!(t.role().label, "Standard ASA Member");
    }

    #[test]
    fn test_profile_value_roundtrip_by_key() {
        let mut profile = Profile::default();
        profile
            .set_value("company_name", FieldValue::text("Acme Steel"))
            .unwrap();
        profile
            .set_value("member_expiry", FieldValue::text("2027-03-01"))
            .unwrap();
        profile
            .set_value(
                "company_business_type",
                FieldValue::List(vec!["Steel".into(), "".into(), "Rebar".into()]),
            )
            .unwrap();

        assert_eq!(profile.company_name, "Acme Steel");
        assert_eq!(
            profile.member_expiry,
            NaiveDate::from_ymd_opt(2027, 3, 1)
        );
        assert_eq!(profile.company_business_type, vec!["Steel", "Rebar"]);
        assert_eq!(
            profile.value("member_expiry"),
            Some(FieldValue::text("2027-03-01"))
        );
    }

    #[test]
    fn test_profile_rejects_wrong_shape_and_unknown_key() {
        let mut profile = Profile::default();
        assert!(matches!(
            profile.set_value("company_name", FieldValue::List(vec![])),
            Err(StoreError::InvalidValue(_))
        ));
        assert!(matches!(
            profile.set_value("nope", FieldValue::text("x")),
            Err(StoreError::UnknownField(_))
        ));
        assert!(matches!(
            profile.set_value("member_status", FieldValue::text("lapsed")),
            Err(StoreError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_payment_finalize() {
        let mut payment = DuesPayment {
            id: 42,
            account_id: 1,
            title: String::new(),
            slug: String::new(),
            status: PaymentStatus::Draft,
            amount: Money::from_dollars(900),
            member_type: "Standard".into(),
            card_type: "visa".into(),
            card_masked: "************1111".into(),
            card_exp_month: 1,
            card_exp_year: 2030,
            cc_name: "J Smith".into(),
            reference: "ch_1".into(),
            created_at: Utc::now(),
        };
        assert!(payment.finalize());
        assert_eq!(payment.title, "Payment #42");
        assert_eq!(payment.slug, "payment-42");
        assert_eq!(payment.status, PaymentStatus::Private);
        assert!(!payment.finalize());
    }
}
