use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use store::options::PortalOptions;

use super::visibility::{ConditionalRule, Visibility};
use crate::viewer::Viewer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Title,
    Text,
    TextArea,
    Email,
    Url,
    Number,
    Date,
    Select,
    RadioInline,
    MulticheckInline,
    Password,
    File,
    Hidden,
    Group,
}

/// A named entry of [`PortalOptions`] that a field can refer to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKey {
    StateDefault,
    Trades,
    TradesOther,
    MemberTypes,
    MemberTypeLabel,
    NumContacts,
    ProfilesPublic,
    MembersGroupedByType,
}

impl OptionKey {
    /// The option's value as text, the form visibility rules compare against.
    pub fn text(self, options: &PortalOptions) -> String {
        match self {
            OptionKey::StateDefault => options.state_default.clone(),
            OptionKey::Trades => options.trades().join("\n"),
            OptionKey::TradesOther => options.trades_other.as_str().to_string(),
            OptionKey::MemberTypes => options
                .member_types()
                .iter()
                .map(|t| t.name.clone())
                .collect::<Vec<_>>()
                .join("\n"),
            OptionKey::MemberTypeLabel => options.member_type_label().to_string(),
            OptionKey::NumContacts => options.num_contacts.to_string(),
            OptionKey::ProfilesPublic => options.profiles_public.as_str().to_string(),
            OptionKey::MembersGroupedByType => options.members_grouped_by_type.as_str().to_string(),
        }
    }

    pub fn choices(self, options: &PortalOptions) -> Vec<Choice> {
        match self {
            OptionKey::Trades => options.trades().into_iter().map(Choice::same).collect(),
            OptionKey::MemberTypes => options
                .member_types()
                .into_iter()
                .map(|t| Choice::new(t.role_slug(), format!("{} (Dues: {}/Year)", t.name, t.dues)))
                .collect(),
            OptionKey::StateDefault => super::states::us_states(Some(&options.state_default)),
            other => vec![Choice::same(other.text(options))],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    pub fn same(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }
}

/// Conversion from an option lookup into a field attribute.
pub trait FromOption: Sized {
    fn from_option(key: OptionKey, options: &PortalOptions) -> Self;
}

impl FromOption for String {
    fn from_option(key: OptionKey, options: &PortalOptions) -> Self {
        key.text(options)
    }
}

impl FromOption for Vec<Choice> {
    fn from_option(key: OptionKey, options: &PortalOptions) -> Self {
        key.choices(options)
    }
}

impl FromOption for usize {
    fn from_option(key: OptionKey, options: &PortalOptions) -> Self {
        key.text(options).trim().parse().unwrap_or_default()
    }
}

/// A field attribute that may depend on the admin options.
#[derive(Clone, Debug)]
pub enum Resolvable<T> {
    Literal(T),
    OptionRef(OptionKey),
    Computed(fn(&PortalOptions) -> T),
}

impl<T: Clone + FromOption> Resolvable<T> {
    pub fn resolve(&self, options: &PortalOptions) -> T {
        match self {
            Resolvable::Literal(value) => value.clone(),
            Resolvable::OptionRef(key) => T::from_option(*key, options),
            Resolvable::Computed(f) => f(options),
        }
    }
}

impl From<&str> for Resolvable<String> {
    fn from(value: &str) -> Self {
        Resolvable::Literal(value.to_string())
    }
}

impl From<String> for Resolvable<String> {
    fn from(value: String) -> Self {
        Resolvable::Literal(value)
    }
}

/// Input coercion applied to a submitted value before validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sanitizer {
    #[default]
    Text,
    TextArea,
    Email,
    Url,
    AbsInt,
    Key,
    /// Passwords are taken verbatim.
    Raw,
}

impl Sanitizer {
    /// The bound coercion function.
    pub fn function(self) -> fn(&str) -> String {
        match self {
            Sanitizer::Text => sanitize_text,
            Sanitizer::TextArea => sanitize_textarea,
            Sanitizer::Email => sanitize_email,
            Sanitizer::Url => sanitize_url,
            Sanitizer::AbsInt => sanitize_absint,
            Sanitizer::Key => store::sanitize_key,
            Sanitizer::Raw => sanitize_raw,
        }
    }
}

fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn sanitize_text(input: &str) -> String {
    strip_tags(input)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn sanitize_textarea(input: &str) -> String {
    strip_tags(input)
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn sanitize_email(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "@.!#$%&'*+/=?^_`{|}~-".contains(*c))
        .collect()
}

fn sanitize_url(input: &str) -> String {
    let url = input.trim();
    if url.is_empty() {
        return String::new();
    }
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else if url.contains("://") {
        String::new()
    } else {
        format!("http://{}", url)
    }
}

fn sanitize_absint(input: &str) -> String {
    let digits: String = input
        .trim()
        .trim_start_matches(['-', '+'])
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    match digits.parse::<u64>() {
        Ok(n) => n.to_string(),
        Err(_) if digits.is_empty() => String::new(),
        Err(_) => "0".to_string(),
    }
}

fn sanitize_raw(input: &str) -> String {
    input.to_string()
}

/// Per-viewer overrides resolved once by the visibility resolver.
#[derive(Clone, Debug, Default)]
pub struct Variant {
    pub label: Option<Resolvable<String>>,
    pub required: Option<bool>,
}

/// Declarative descriptor of a single form field.
#[derive(Clone, Debug)]
pub struct FieldDefinition {
    pub id: String,
    pub label: Resolvable<String>,
    pub field_type: FieldType,
    pub default: Option<Resolvable<String>>,
    pub choices: Option<Resolvable<Vec<Choice>>>,
    pub visibility: Visibility,
    pub variants: BTreeMap<Viewer, Variant>,
    pub sanitizer: Sanitizer,
    pub required: bool,
    pub repeatable: bool,
    pub max_rows: Option<Resolvable<usize>>,
    pub priority: i32,
    pub parent: Option<String>,
}

impl FieldDefinition {
    pub fn new(id: impl Into<String>, label: impl Into<Resolvable<String>>, field_type: FieldType) -> Self {
        let sanitizer = match field_type {
            FieldType::TextArea => Sanitizer::TextArea,
            FieldType::Email => Sanitizer::Email,
            FieldType::Url => Sanitizer::Url,
            FieldType::Number => Sanitizer::AbsInt,
            FieldType::Password => Sanitizer::Raw,
            _ => Sanitizer::Text,
        };
        Self {
            id: id.into(),
            label: label.into(),
            field_type,
            default: None,
            choices: None,
            visibility: Visibility::default(),
            variants: BTreeMap::new(),
            sanitizer,
            required: false,
            repeatable: false,
            max_rows: None,
            priority: 0,
            parent: None,
        }
    }

    pub fn default_value(mut self, default: Resolvable<String>) -> Self {
        self.default = Some(default);
        self
    }

    pub fn choices(mut self, choices: Resolvable<Vec<Choice>>) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn visible_to(mut self, viewers: impl IntoIterator<Item = Viewer>) -> Self {
        self.visibility.viewers = Some(viewers.into_iter().collect());
        self
    }

    pub fn rule(mut self, rule: ConditionalRule) -> Self {
        self.visibility.rules.push(rule);
        self
    }

    pub fn variant(mut self, viewer: Viewer, variant: Variant) -> Self {
        self.variants.insert(viewer, variant);
        self
    }

    pub fn sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    pub fn max_rows(mut self, max_rows: Resolvable<usize>) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}
