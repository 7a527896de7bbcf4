//! Built-in field sets: the member profile, the login box and the dues payment form.

use chrono::{Datelike, Local};
use store::options::PortalOptions;
use store::{Cardinality, Profile};

use super::definition::{
    Choice, FieldDefinition, FieldType, OptionKey, Resolvable, Sanitizer, Variant,
};
use super::visibility::ConditionalRule;
use crate::viewer::Viewer;

pub const PROFILE_PREFIX: &str = "asamp_user_";
pub const LOGIN_PREFIX: &str = "asamp_login_";
pub const PAYMENT_PREFIX: &str = "asamp_payment_";

pub mod ids {
    pub const MEMBER_STATUS: &str = "asamp_user_member_status";
    pub const MEMBER_DATE_JOINED: &str = "asamp_user_member_date_joined";
    pub const MEMBER_EXPIRY: &str = "asamp_user_member_expiry";
    pub const SECTION_MEMBER_INFO: &str = "asamp_user_section_member_info";
    pub const COMPANY_NAME: &str = "asamp_user_company_name";
    pub const COMPANY_DESCRIPTION: &str = "asamp_user_company_description";
    pub const COMPANY_STREET: &str = "asamp_user_company_street";
    pub const COMPANY_CITY: &str = "asamp_user_company_city";
    pub const COMPANY_STATE: &str = "asamp_user_company_state";
    pub const COMPANY_ZIP: &str = "asamp_user_company_zip";
    pub const COMPANY_PHONE: &str = "asamp_user_company_phone";
    pub const COMPANY_EMAIL: &str = "asamp_user_company_email";
    pub const COMPANY_LOGO: &str = "asamp_user_company_logo";
    pub const COMPANY_WEBSITE: &str = "asamp_user_company_website";
    pub const COMPANY_YEAR_FOUNDED: &str = "asamp_user_company_year_founded";
    pub const COMPANY_NUM_EMPLOYEES: &str = "asamp_user_company_num_employees";
    pub const COMPANY_BUSINESS_TYPE: &str = "asamp_user_company_business_type";
    pub const COMPANY_BUSINESS_TYPE_OTHER: &str = "asamp_user_company_business_type_other";
    pub const COMPANY_CONTACTS: &str = "asamp_user_company_contacts";
    pub const MEMBER_TYPE: &str = "asamp_user_member_type";
    pub const LOGIN: &str = "asamp_user_login";
    pub const PASS: &str = "asamp_user_pass";
    pub const PASS_CONFIRM: &str = "asamp_user_pass_confirm";

    pub const LOGIN_USERNAME: &str = "asamp_login_username";
    pub const LOGIN_PASSWORD: &str = "asamp_login_password";

    pub const PAYMENT_MEMBER_TYPE: &str = "asamp_payment_member_type";
    pub const PAYMENT_CC_NAME: &str = "asamp_payment_cc_name";
    pub const PAYMENT_CARD_NUMBER: &str = "asamp_payment_card_number";
    pub const PAYMENT_CARD_EXP_MONTH: &str = "asamp_payment_card_exp_month";
    pub const PAYMENT_CARD_EXP_YEAR: &str = "asamp_payment_card_exp_year";
    pub const PAYMENT_CARD_CVV: &str = "asamp_payment_card_cvv";
}

/// The [`Profile`] key a profile field id is stored under.
pub fn profile_key(id: &str) -> Option<&'static str> {
    let key = id.strip_prefix(PROFILE_PREFIX)?;
    Profile::KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(k, _)| *k)
}

pub fn profile_cardinality(id: &str) -> Option<Cardinality> {
    profile_key(id).and_then(Profile::cardinality)
}

fn five_years_ago(_: &PortalOptions) -> String {
    (Local::now().year() - 5).to_string()
}

fn last_hundred_years(_: &PortalOptions) -> Vec<Choice> {
    let current = Local::now().year();
    (current - 100..=current)
        .map(|y| Choice::same(y.to_string()))
        .collect()
}

fn card_months(_: &PortalOptions) -> Vec<Choice> {
    (1..=12).map(|m| Choice::same(format!("{:02}", m))).collect()
}

fn card_years(_: &PortalOptions) -> Vec<Choice> {
    let current = Local::now().year();
    (current..=current + 10)
        .map(|y| Choice::same(y.to_string()))
        .collect()
}

fn member_type_label() -> Resolvable<String> {
    Resolvable::OptionRef(OptionKey::MemberTypeLabel)
}

fn member_type_choices() -> Resolvable<Vec<Choice>> {
    Resolvable::OptionRef(OptionKey::MemberTypes)
}

fn optional_for_members(label: &str) -> Variant {
    Variant {
        label: Some(label.into()),
        required: Some(false),
    }
}

pub fn profile_fields() -> Vec<FieldDefinition> {
    use FieldType::*;

    let contact = |id: &str, label: &str, field_type: FieldType, priority: i32| {
        FieldDefinition::new(id, label, field_type)
            .parent(ids::COMPANY_CONTACTS)
            .priority(priority)
    };

    vec![
        FieldDefinition::new(ids::MEMBER_STATUS, "ASA Membership Status", RadioInline)
            .default_value("inactive".into())
            .choices(Resolvable::Literal(vec![
                Choice::new("active", "Active"),
                Choice::new("inactive", "Inactive"),
            ]))
            .sanitizer(Sanitizer::Key)
            .visible_to([Viewer::Admin])
            .priority(10),
        FieldDefinition::new(ids::MEMBER_DATE_JOINED, "Date Joined", Date)
            .visible_to([Viewer::Admin])
            .priority(20),
        FieldDefinition::new(ids::MEMBER_EXPIRY, "Membership Expires", Date)
            .visible_to([Viewer::Admin])
            .priority(30),
        FieldDefinition::new(ids::SECTION_MEMBER_INFO, "ASA Member Info", Title).priority(40),
        FieldDefinition::new(ids::COMPANY_NAME, "Company Name", Text)
            .required()
            .priority(50),
        FieldDefinition::new(ids::COMPANY_DESCRIPTION, "Company Description", TextArea)
            .priority(60),
        FieldDefinition::new(ids::COMPANY_STREET, "Company Address", Text).priority(70),
        FieldDefinition::new(ids::COMPANY_CITY, "City", Text).priority(80),
        FieldDefinition::new(ids::COMPANY_STATE, "State", Select)
            .default_value(Resolvable::OptionRef(OptionKey::StateDefault))
            .choices(Resolvable::OptionRef(OptionKey::StateDefault))
            .priority(90),
        FieldDefinition::new(ids::COMPANY_ZIP, "Zip", Text).priority(100),
        FieldDefinition::new(ids::COMPANY_PHONE, "Company Phone", Text).priority(110),
        FieldDefinition::new(ids::COMPANY_EMAIL, "Company Email", Email)
            .required()
            .priority(120),
        FieldDefinition::new(ids::COMPANY_LOGO, "Company Logo", File)
            .visible_to([Viewer::Member])
            .priority(130),
        FieldDefinition::new(ids::COMPANY_WEBSITE, "Website", Url).priority(140),
        FieldDefinition::new(ids::COMPANY_YEAR_FOUNDED, "Year Founded", Select)
            .sanitizer(Sanitizer::AbsInt)
            .default_value(Resolvable::Computed(five_years_ago))
            .choices(Resolvable::Computed(last_hundred_years))
            .priority(150),
        FieldDefinition::new(ids::COMPANY_NUM_EMPLOYEES, "Number of Employees", Number)
            .default_value("3".into())
            .priority(160),
        FieldDefinition::new(ids::COMPANY_BUSINESS_TYPE, "Business Type/Trade", MulticheckInline)
            .choices(Resolvable::OptionRef(OptionKey::Trades))
            .priority(170),
        FieldDefinition::new(ids::COMPANY_BUSINESS_TYPE_OTHER, "Business Type/Trade Other", Text)
            .repeatable()
            .rule(ConditionalRule::unless(OptionKey::TradesOther, "no"))
            .priority(180),
        FieldDefinition::new(ids::COMPANY_CONTACTS, "Contact #{#}", Group)
            .repeatable()
            .max_rows(Resolvable::OptionRef(OptionKey::NumContacts))
            .priority(190),
        contact("name_first", "First Name", Text, 191),
        contact("name_last", "Last Name", Text, 192),
        contact("phone", "Phone", Text, 193),
        contact("fax", "Fax", Text, 194),
        contact("email", "Email", Email, 195),
        contact("title", "Title", Text, 196),
        contact("asa_position", "ASA Position", Text, 197),
        FieldDefinition::new(ids::MEMBER_TYPE, member_type_label(), Select)
            .choices(member_type_choices())
            .visible_to([Viewer::Member, Viewer::NonMember])
            .required()
            .priority(200),
        FieldDefinition::new(ids::LOGIN, "Username", Text)
            .visible_to([Viewer::NonMember])
            .required()
            .priority(210),
        FieldDefinition::new(ids::PASS, "Password", Password)
            .visible_to([Viewer::Member, Viewer::NonMember])
            .required()
            .variant(Viewer::Member, optional_for_members("New Password"))
            .priority(220),
        FieldDefinition::new(ids::PASS_CONFIRM, "Confirm Password", Password)
            .visible_to([Viewer::Member, Viewer::NonMember])
            .required()
            .variant(Viewer::Member, optional_for_members("Confirm New Password"))
            .priority(230),
    ]
}

pub fn login_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new(ids::LOGIN_USERNAME, "Username / Email", FieldType::Text)
            .required()
            .priority(10),
        FieldDefinition::new(ids::LOGIN_PASSWORD, "Password", FieldType::Password)
            .required()
            .priority(20),
    ]
}

pub fn payment_fields() -> Vec<FieldDefinition> {
    use FieldType::*;

    vec![
        FieldDefinition::new(ids::PAYMENT_MEMBER_TYPE, member_type_label(), Select)
            .choices(member_type_choices())
            .required()
            .priority(10),
        FieldDefinition::new(ids::PAYMENT_CC_NAME, "Name on Card", Text)
            .required()
            .priority(20),
        FieldDefinition::new(ids::PAYMENT_CARD_NUMBER, "Card Number", Text)
            .required()
            .priority(30),
        FieldDefinition::new(ids::PAYMENT_CARD_EXP_MONTH, "Expiration Month", Select)
            .choices(Resolvable::Computed(card_months))
            .required()
            .priority(40),
        FieldDefinition::new(ids::PAYMENT_CARD_EXP_YEAR, "Expiration Year", Select)
            .choices(Resolvable::Computed(card_years))
            .sanitizer(Sanitizer::AbsInt)
            .required()
            .priority(50),
        FieldDefinition::new(ids::PAYMENT_CARD_CVV, "CVV", Text)
            .required()
            .priority(60),
    ]
    .into_iter()
    .map(|f| f.visible_to([Viewer::Member, Viewer::NonMember]))
    .collect()
}
