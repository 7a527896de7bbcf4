//! Pure checks over sanitized form input.
//!
//! Every check reports into a [`FieldErrors`] map keyed by the field id with its form
//! prefix stripped (`company_zip`, `pass`, `company_contacts.1.phone`). An empty map
//! means the submission is valid.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::fields::core::{ids, LOGIN_PREFIX, PAYMENT_PREFIX, PROFILE_PREFIX};
use crate::fields::FieldType;
use crate::forms::{FormDescriptor, SanitizedValues};
use crate::viewer::Viewer;

pub type FieldErrors = BTreeMap<String, String>;

pub const MIN_PASSWORD_LEN: usize = 8;
/// Highest tolerated average similarity between a password and the login, in percent.
pub const MAX_LOGIN_SIMILARITY: f64 = 75.0;

/// Longest password or login the similarity check will compare.
pub const MAX_CREDENTIAL_LEN: usize = 128;

static ZIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{5}(-[0-9]{4})?$").expect("zip pattern"));

/// Error-map key for a field id.
pub fn error_key(id: &str) -> &str {
    [PROFILE_PREFIX, LOGIN_PREFIX, PAYMENT_PREFIX]
        .iter()
        .find_map(|prefix| id.strip_prefix(prefix))
        .unwrap_or(id)
}

pub fn is_valid_zip(zip: &str) -> bool {
    ZIP.is_match(zip)
}

/// Reduce a phone number to its ten digits, dropping a leading country code `1` from an
/// eleven digit number. `None` if what remains is not exactly ten digits.
pub fn normalize_phone(input: &str) -> Option<String> {
    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    let digits = match digits.strip_prefix('1') {
        Some(rest) if digits.len() == 11 => rest.to_string(),
        _ => digits,
    };
    (digits.len() == 10).then_some(digits)
}

/// Structural email check: a permitted local part, `@`, and a dotted domain whose labels
/// are alphanumeric with inner hyphens.
pub fn is_email(email: &str) -> bool {
    if email.len() < 6 {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty()
        || !local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c))
    {
        return false;
    }
    if domain.contains("..") || domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Number of characters `a` and `b` share, found by repeatedly taking the longest
/// common substring and recursing on what lies to either side of it.
pub fn similar_text(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    common_chars(&a, &b)
}

fn common_chars(a: &[char], b: &[char]) -> usize {
    let (mut best, mut pos_a, mut pos_b) = (0, 0, 0);
    for i in 0..a.len() {
        for j in 0..b.len() {
            let mut len = 0;
            while i + len < a.len() && j + len < b.len() && a[i + len] == b[j + len] {
                len += 1;
            }
            if len > best {
                (best, pos_a, pos_b) = (len, i, j);
            }
        }
    }
    if best == 0 {
        return 0;
    }
    best + common_chars(&a[..pos_a], &b[..pos_b])
        + common_chars(&a[pos_a + best..], &b[pos_b + best..])
}

/// `similar_text` as a percentage of the combined length.
pub fn similarity_percent(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 0.0;
    }
    (similar_text(a, b) * 2) as f64 * 100.0 / total as f64
}

/// First password-policy violation, if any.
pub fn password_problem(password: &str, login: &str) -> Option<&'static str> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Some("Password must be at least 8 characters long.");
    }
    if password.chars().count() > MAX_CREDENTIAL_LEN {
        return Some("Password must be at most 128 characters long.");
    }
    if login.chars().count() > MAX_CREDENTIAL_LEN {
        return Some("Username must be at most 128 characters long.");
    }
    let has = |pred: fn(&char) -> bool| password.chars().any(|c| pred(&c));
    if !has(char::is_ascii_uppercase) || !has(char::is_ascii_lowercase) || !has(char::is_ascii_digit)
    {
        return Some("Password must contain upper and lower case letters and a number.");
    }
    if !login.is_empty() {
        let (p, l) = (password.to_lowercase(), login.to_lowercase());
        let average = (similarity_percent(&p, &l) + similarity_percent(&l, &p)) / 2.0;
        if average > MAX_LOGIN_SIMILARITY {
            return Some("Password is too similar to the username.");
        }
    }
    None
}

/// Every field the form marks required must be non-blank.
pub fn check_required(form: &FormDescriptor, values: &SanitizedValues, errors: &mut FieldErrors) {
    for field in &form.fields {
        if !field.required || matches!(field.field_type, FieldType::Hidden | FieldType::Title) {
            continue;
        }
        if values.get(&field.id).map_or(true, |v| v.is_blank()) {
            errors
                .entry(error_key(&field.id).to_string())
                .or_insert_with(|| format!("{} is required.", field.label));
        }
    }
}

fn check_phone(key: String, value: &str, what: &str, errors: &mut FieldErrors) {
    if !value.trim().is_empty() && normalize_phone(value).is_none() {
        errors.insert(key, format!("Please enter a 10 digit {} number.", what));
    }
}

fn check_email(key: String, value: &str, errors: &mut FieldErrors) {
    if !value.trim().is_empty() && !is_email(value) {
        errors.insert(key, "Please enter a valid email address.".to_string());
    }
}

/// Validate a profile submission. `login` is the account's login for members and the
/// submitted login for registrations.
pub fn validate_profile(
    form: &FormDescriptor,
    values: &SanitizedValues,
    viewer: Viewer,
    login: &str,
) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if values.text(ids::COMPANY_NAME).trim().is_empty() {
        errors.insert(
            error_key(ids::COMPANY_NAME).to_string(),
            "Company Name is required.".to_string(),
        );
    }
    check_required(form, values, &mut errors);

    let zip = values.text(ids::COMPANY_ZIP).trim();
    if !zip.is_empty() && !is_valid_zip(zip) {
        errors.insert(
            error_key(ids::COMPANY_ZIP).to_string(),
            "Please enter a valid ZIP code.".to_string(),
        );
    }
    check_phone(
        error_key(ids::COMPANY_PHONE).to_string(),
        values.text(ids::COMPANY_PHONE),
        "phone",
        &mut errors,
    );
    check_email(
        error_key(ids::COMPANY_EMAIL).to_string(),
        values.text(ids::COMPANY_EMAIL),
        &mut errors,
    );

    let group = error_key(ids::COMPANY_CONTACTS);
    for (row, contact) in values.rows(ids::COMPANY_CONTACTS).iter().enumerate() {
        let key = |field: &str| format!("{}.{}.{}", group, row, field);
        let get = |field: &str| contact.get(field).map(String::as_str).unwrap_or_default();
        check_phone(key("phone"), get("phone"), "phone", &mut errors);
        check_phone(key("fax"), get("fax"), "fax", &mut errors);
        check_email(key("email"), get("email"), &mut errors);
    }

    if form.field(ids::PASS).is_some() {
        let password = values.text(ids::PASS);
        let confirm = values.text(ids::PASS_CONFIRM);
        let unchanged = viewer == Viewer::Member && password.is_empty() && confirm.is_empty();
        if !unchanged {
            if let Some(problem) = password_problem(password, login) {
                errors.insert(error_key(ids::PASS).to_string(), problem.to_string());
            }
            if password != confirm {
                errors.insert(
                    error_key(ids::PASS_CONFIRM).to_string(),
                    "Passwords do not match.".to_string(),
                );
            }
        }
    }

    errors
}

/// Rewrite phone fields (company and contacts) to their normalized digits.
pub fn normalize_phones(values: &mut SanitizedValues) {
    let phone = values.text(ids::COMPANY_PHONE).to_string();
    if let Some(digits) = normalize_phone(&phone) {
        values.insert(ids::COMPANY_PHONE, store::FieldValue::Text(digits));
    }
    let rows: Vec<BTreeMap<String, String>> = values
        .rows(ids::COMPANY_CONTACTS)
        .iter()
        .cloned()
        .map(|mut row| {
            for field in ["phone", "fax"] {
                if let Some(digits) = row.get(field).and_then(|v| normalize_phone(v)) {
                    row.insert(field.to_string(), digits);
                }
            }
            row
        })
        .collect();
    if values.get(ids::COMPANY_CONTACTS).is_some() {
        values.insert(ids::COMPANY_CONTACTS, store::FieldValue::Rows(rows));
    }
}
