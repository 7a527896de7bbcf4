//! # Form builder
//!
//! Turns an active field set into a [`FormDescriptor`] the rendering collaborator can
//! consume: labels, defaults and choices are resolved against the options, per-viewer
//! variants applied, sanitizers bound, group children attached to their group and one
//! hidden anti-forgery field appended.
//!
//! Submitted forms come back as a [`FormInput`] (the raw urlencoded pairs); the
//! descriptor that rendered the form also sanitizes its submission into
//! [`SanitizedValues`].

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use store::options::PortalOptions;
use store::{AccountId, FieldValue, MemberAccount};

use crate::fields::core::{ids, profile_key, LOGIN_PREFIX, PAYMENT_PREFIX, PROFILE_PREFIX};
use crate::fields::{resolve_variant, Choice, FieldDefinition, FieldType};
use crate::viewer::Viewer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    Profile,
    Login,
    Logout,
    Payment,
}

impl FormKind {
    /// Key the anti-forgery token is scoped to.
    pub fn key(self) -> &'static str {
        match self {
            FormKind::Profile => "asamp_user_edit",
            FormKind::Login => "asamp_login_form",
            FormKind::Logout => "asamp_logout_form",
            FormKind::Payment => "asamp_payment_form",
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            FormKind::Profile => PROFILE_PREFIX,
            FormKind::Login => LOGIN_PREFIX,
            FormKind::Logout => "asamp_logout_",
            FormKind::Payment => PAYMENT_PREFIX,
        }
    }

    /// Name of the hidden token field, which doubles as the form's marker.
    pub fn nonce_field(self) -> String {
        format!("{}nonce", self.prefix())
    }

    pub fn submit_label(self, viewer: Viewer) -> &'static str {
        match (self, viewer) {
            (FormKind::Profile, Viewer::NonMember) => "Join Now",
            (FormKind::Profile, _) => "Update Profile",
            (FormKind::Login, _) => "Sign In",
            (FormKind::Logout, _) => "Sign Out",
            (FormKind::Payment, _) => "Pay Dues",
        }
    }
}

/// One rendered field.
#[derive(Clone, Debug, Serialize)]
pub struct FieldDescriptor {
    pub id: String,
    pub label: String,
    pub field_type: FieldType,
    pub value: FieldValue,
    pub choices: Vec<Choice>,
    pub required: bool,
    pub repeatable: bool,
    pub max_rows: Option<usize>,
    pub children: Vec<FieldDescriptor>,
    #[serde(skip)]
    pub sanitize: fn(&str) -> String,
}

#[derive(Clone, Debug, Serialize)]
pub struct FormDescriptor {
    pub kind: FormKind,
    pub key: &'static str,
    pub object_id: Option<AccountId>,
    pub submit_label: &'static str,
    pub fields: Vec<FieldDescriptor>,
}

impl FormDescriptor {
    pub fn field(&self, id: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Coerce a submission field by field. Fields this form does not render are ignored.
    pub fn sanitize(&self, input: &FormInput) -> SanitizedValues {
        let mut values = BTreeMap::new();
        for field in &self.fields {
            if let Some(value) = sanitize_field(field, input) {
                values.insert(field.id.clone(), value);
            }
        }
        SanitizedValues { values }
    }
}

fn allowed(field: &FieldDescriptor, value: &str) -> bool {
    field.choices.is_empty() || field.choices.iter().any(|c| c.value == value)
}

fn sanitize_field(field: &FieldDescriptor, input: &FormInput) -> Option<FieldValue> {
    match field.field_type {
        FieldType::Title | FieldType::Hidden => None,
        FieldType::Group => {
            let mut rows: Vec<BTreeMap<String, String>> = input
                .rows(&field.id)
                .into_iter()
                .map(|raw| {
                    field
                        .children
                        .iter()
                        .filter_map(|child| {
                            raw.get(&child.id)
                                .map(|v| (child.id.clone(), (child.sanitize)(v)))
                        })
                        .collect::<BTreeMap<_, _>>()
                })
                .collect();
            if let Some(max) = field.max_rows {
                rows.truncate(max);
            }
            Some(FieldValue::Rows(rows))
        }
        FieldType::MulticheckInline => Some(FieldValue::List(
            input
                .all(&field.id)
                .into_iter()
                .map(field.sanitize)
                .filter(|v| !v.is_empty() && allowed(field, v))
                .collect(),
        )),
        _ if field.repeatable => Some(FieldValue::List(
            input
                .all(&field.id)
                .into_iter()
                .map(field.sanitize)
                .filter(|v| !v.is_empty())
                .collect(),
        )),
        FieldType::Select | FieldType::RadioInline => {
            let value = (field.sanitize)(input.get(&field.id).unwrap_or_default());
            Some(FieldValue::Text(if allowed(field, &value) {
                value
            } else {
                String::new()
            }))
        }
        _ => Some(FieldValue::Text((field.sanitize)(
            input.get(&field.id).unwrap_or_default(),
        ))),
    }
}

/// Sanitized submission keyed by field id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SanitizedValues {
    values: BTreeMap<String, FieldValue>,
}

impl SanitizedValues {
    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.values.get(id)
    }

    /// A scalar value, or `""` when absent.
    pub fn text(&self, id: &str) -> &str {
        self.values
            .get(id)
            .and_then(FieldValue::as_text)
            .unwrap_or_default()
    }

    pub fn rows(&self, id: &str) -> &[BTreeMap<String, String>] {
        match self.values.get(id) {
            Some(FieldValue::Rows(rows)) => rows,
            _ => &[],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.values.iter()
    }

    pub fn insert(&mut self, id: impl Into<String>, value: FieldValue) {
        self.values.insert(id.into(), value);
    }

    /// Remove group rows with no content. Rows keep their submitted positions until this
    /// runs, so errors can be keyed by the row the visitor filled in.
    pub fn drop_blank_rows(&mut self) {
        for value in self.values.values_mut() {
            if let FieldValue::Rows(rows) = value {
                rows.retain(|row| row.values().any(|v| !v.trim().is_empty()));
            }
        }
    }
}

/// Raw urlencoded form pairs, in submission order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormInput {
    pairs: Vec<(String, String)>,
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormInput {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl FormInput {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Values posted as `name`, `name[]` or `name[<n>]`.
    pub fn all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| {
                k == name
                    || k.strip_prefix(name)
                        .and_then(|rest| rest.strip_prefix('['))
                        .and_then(|rest| rest.strip_suffix(']'))
                        .is_some_and(|index| index.chars().all(|c| c.is_ascii_digit()))
            })
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Rows posted as `name[<row>][<field>]`, ordered by row index.
    pub fn rows(&self, name: &str) -> Vec<BTreeMap<String, String>> {
        let mut rows: BTreeMap<usize, BTreeMap<String, String>> = BTreeMap::new();
        for (key, value) in &self.pairs {
            let Some(rest) = key.strip_prefix(name).and_then(|r| r.strip_prefix('[')) else {
                continue;
            };
            let Some((index, rest)) = rest.split_once("][") else {
                continue;
            };
            let (Ok(index), Some(field)) = (index.parse::<usize>(), rest.strip_suffix(']')) else {
                continue;
            };
            rows.entry(index)
                .or_default()
                .insert(field.to_string(), value.clone());
        }
        rows.into_values().collect()
    }
}

/// Builds form descriptors for one viewer against the current options.
pub struct FormBuilder<'a> {
    options: &'a PortalOptions,
    viewer: Viewer,
}

impl<'a> FormBuilder<'a> {
    pub fn new(options: &'a PortalOptions, viewer: Viewer) -> Self {
        Self { options, viewer }
    }

    /// `fields` must already be filtered for the viewer and sorted by priority. Children
    /// that arrive before their group are held back until the group is emitted.
    pub fn build(
        &self,
        kind: FormKind,
        fields: &[&FieldDefinition],
        account: Option<&MemberAccount>,
        nonce: String,
    ) -> FormDescriptor {
        let mut out: Vec<FieldDescriptor> = Vec::with_capacity(fields.len() + 1);
        let mut emitted: HashSet<(Option<&str>, &str)> = HashSet::new();
        let mut pending: HashMap<&str, Vec<FieldDescriptor>> = HashMap::new();

        for def in fields {
            if !emitted.insert((def.parent.as_deref(), def.id.as_str())) {
                continue;
            }
            let mut descriptor = self.describe(def, account);
            match def.parent.as_deref() {
                Some(parent) => {
                    match out
                        .iter_mut()
                        .find(|f| f.field_type == FieldType::Group && f.id == parent)
                    {
                        Some(group) => group.children.push(descriptor),
                        None => pending.entry(parent).or_default().push(descriptor),
                    }
                }
                None => {
                    if def.field_type == FieldType::Group {
                        if let Some(children) = pending.remove(def.id.as_str()) {
                            descriptor.children.extend(children);
                        }
                    }
                    out.push(descriptor);
                }
            }
        }

        out.push(FieldDescriptor {
            id: kind.nonce_field(),
            label: String::new(),
            field_type: FieldType::Hidden,
            value: FieldValue::Text(nonce),
            choices: Vec::new(),
            required: true,
            repeatable: false,
            max_rows: None,
            children: Vec::new(),
            sanitize: |s| s.to_string(),
        });

        FormDescriptor {
            kind,
            key: kind.key(),
            object_id: account.map(|a| a.id),
            submit_label: kind.submit_label(self.viewer),
            fields: out,
        }
    }

    fn describe(&self, def: &FieldDefinition, account: Option<&MemberAccount>) -> FieldDescriptor {
        let variant = resolve_variant(def, self.viewer, self.options);
        FieldDescriptor {
            id: def.id.clone(),
            label: variant.label,
            field_type: def.field_type,
            value: self.value(def, account),
            choices: def
                .choices
                .as_ref()
                .map(|c| c.resolve(self.options))
                .unwrap_or_default(),
            required: variant.required,
            repeatable: def.repeatable,
            max_rows: def.max_rows.as_ref().map(|m| m.resolve(self.options)),
            children: Vec::new(),
            sanitize: def.sanitizer.function(),
        }
    }

    fn value(&self, def: &FieldDefinition, account: Option<&MemberAccount>) -> FieldValue {
        if def.field_type == FieldType::Password {
            return FieldValue::text("");
        }
        let existing = account.and_then(|a| {
            if def.parent.is_some() {
                return None;
            }
            match def.id.as_str() {
                ids::MEMBER_TYPE | ids::PAYMENT_MEMBER_TYPE => {
                    a.member_role().map(FieldValue::text)
                }
                ids::LOGIN => Some(FieldValue::text(a.login.clone())),
                id => profile_key(id).and_then(|key| a.profile.value(key)),
            }
        });
        if let Some(value) = existing.filter(|v| !v.is_blank()) {
            return value;
        }
        match def.field_type {
            FieldType::Group => FieldValue::Rows(Vec::new()),
            FieldType::MulticheckInline => FieldValue::List(Vec::new()),
            _ if def.repeatable => FieldValue::List(Vec::new()),
            _ => FieldValue::Text(
                def.default
                    .as_ref()
                    .map(|d| d.resolve(self.options))
                    .unwrap_or_default(),
            ),
        }
    }
}
