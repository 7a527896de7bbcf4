//! # Dues payment
//!
//! [`validate_payment`] turns a sanitized payment form into a [`PaymentRequest`]
//! (member type plus card details), [`PaymentGateway`] captures the charge, and
//! [`extend_expiry`] computes the member's new expiry date.

pub mod card;
mod gateway;

use chrono::{Datelike, Months, NaiveDate};
use store::options::PortalOptions;
use store::MemberType;

#[cfg(feature = "server")]
pub use gateway::StripeGateway;
pub use gateway::{Capture, CardDetails, Charge, DisabledGateway, PaymentGateway};

use crate::fields::core::ids;
use crate::forms::{FormDescriptor, SanitizedValues};
use crate::validation::{check_required, error_key, FieldErrors};

#[derive(Clone, Debug, PartialEq)]
pub struct PaymentRequest {
    pub member_type: MemberType,
    pub card: CardDetails,
}

impl PaymentRequest {
    pub fn charge(&self, receipt_email: &str) -> Charge {
        Charge {
            amount: self.member_type.dues,
            description: format!("{} dues", self.member_type.name),
            receipt_email: receipt_email.to_string(),
            card: self.card.clone(),
        }
    }
}

/// Membership runs one year from the later of today and the current expiry.
pub fn extend_expiry(today: NaiveDate, previous: Option<NaiveDate>) -> NaiveDate {
    let base = previous.map_or(today, |p| p.max(today));
    base.checked_add_months(Months::new(12))
        .unwrap_or(NaiveDate::MAX)
}

pub fn validate_payment(
    form: &FormDescriptor,
    values: &SanitizedValues,
    options: &PortalOptions,
    today: NaiveDate,
) -> Result<PaymentRequest, FieldErrors> {
    let mut errors = FieldErrors::new();
    check_required(form, values, &mut errors);
    let mut fail = |id: &str, message: &str| {
        errors
            .entry(error_key(id).to_string())
            .or_insert_with(|| message.to_string());
    };

    let member_type = options.member_type_by_slug(values.text(ids::PAYMENT_MEMBER_TYPE));
    if member_type.is_none() {
        fail(
            ids::PAYMENT_MEMBER_TYPE,
            &format!("Please choose a {}.", options.member_type_label()),
        );
    }

    let number = card::card_digits(values.text(ids::PAYMENT_CARD_NUMBER));
    let brand = card::detect_brand(&number).filter(|_| card::luhn_valid(&number));
    if brand.is_none() {
        fail(ids::PAYMENT_CARD_NUMBER, "Please enter a valid card number.");
    }

    let month = values
        .text(ids::PAYMENT_CARD_EXP_MONTH)
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|m| (1..=12).contains(m));
    let year = values.text(ids::PAYMENT_CARD_EXP_YEAR).trim().parse::<i32>().ok();
    match (month, year) {
        (Some(month), Some(year)) => {
            if (year, month) < (today.year(), today.month()) {
                fail(ids::PAYMENT_CARD_EXP_YEAR, "This card has expired.");
            }
        }
        (None, _) => fail(ids::PAYMENT_CARD_EXP_MONTH, "Please choose an expiration month."),
        (_, None) => fail(ids::PAYMENT_CARD_EXP_YEAR, "Please choose an expiration year."),
    }

    let cvv = values.text(ids::PAYMENT_CARD_CVV).trim().to_string();
    if let Some(brand) = brand {
        if !card::cvv_valid(&cvv, brand) {
            fail(ids::PAYMENT_CARD_CVV, "Please enter a valid security code.");
        }
    }

    let holder = values.text(ids::PAYMENT_CC_NAME).trim().to_string();
    match (member_type, brand, month, year) {
        (Some(member_type), Some(brand), Some(exp_month), Some(exp_year)) if errors.is_empty() => {
            Ok(PaymentRequest {
                member_type,
                card: CardDetails {
                    number,
                    brand,
                    exp_month,
                    exp_year,
                    cvv,
                    holder,
                },
            })
        }
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::core::payment_fields;
    use crate::fields::FieldRegistryBuilder;
    use crate::forms::{FormBuilder, FormInput, FormKind};
    use crate::viewer::Viewer;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn submit(pairs: &[(&str, &str)]) -> (FormDescriptor, SanitizedValues, PortalOptions) {
        let options = PortalOptions::default();
        let mut builder = FieldRegistryBuilder::new();
        builder.extend(payment_fields());
        let registry = builder.build().unwrap();
        let active = registry.active(Viewer::Member, &options);
        let form = FormBuilder::new(&options, Viewer::Member).build(FormKind::Payment, &active, None, "t".into());
        let values = form.sanitize(&pairs.iter().copied().collect::<FormInput>());
        (form, values, options)
    }

    fn valid_pairs(year: &str) -> Vec<(&'static str, String)> {
        vec![
            (ids::PAYMENT_MEMBER_TYPE, "asamp_standardasamember".to_string()),
            (ids::PAYMENT_CC_NAME, "Jane Smith".to_string()),
            (ids::PAYMENT_CARD_NUMBER, "4111 1111 1111 1111".to_string()),
            (ids::PAYMENT_CARD_EXP_MONTH, "12".to_string()),
            (ids::PAYMENT_CARD_EXP_YEAR, year.to_string()),
            (ids::PAYMENT_CARD_CVV, "123".to_string()),
        ]
    }

    #[test]
    fn test_extend_expiry_from_later_date() {
        let today = date(2026, 10, 19);
        assert_eq!(extend_expiry(today, None), date(2027, 10, 19));
        assert_eq!(extend_expiry(today, Some(date(2025, 1, 1))), date(2027, 10, 19));
        assert_eq!(extend_expiry(today, Some(date(2027, 3, 1))), date(2028, 3, 1));
        assert_eq!(extend_expiry(date(2028, 2, 29), None), date(2029, 2, 28));
    }

    #[test]
    fn test_valid_payment_parses() {
        let today = chrono::Local::now().date_naive();
        let year = (today.year() + 1).to_string();
        let pairs = valid_pairs(&year);
        let pairs: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let (form, values, options) = submit(&pairs);
        let request = validate_payment(&form, &values, &options, today).unwrap();
        assert_eq!(request.member_type.name, "Standard ASA Member");
        assert_eq!(request.card.number, "4111111111111111");
        assert_eq!(request.card.brand, card::CardBrand::Visa);
        let charge = request.charge("office@acme.test");
        assert_eq!(charge.amount.cents(), 90000);
        assert!(!format!("{:?}", charge).contains("4111111111111111"));
    }

    #[test]
    fn test_invalid_payment_fields() {
        let today = chrono::Local::now().date_naive();
        let year = (today.year() + 1).to_string();
        let mut pairs = valid_pairs(&year);
        pairs[0].1 = "asamp_unknown".into();
        pairs[2].1 = "4111 1111 1111 1112".into();
        let pairs: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let (form, values, options) = submit(&pairs);
        let errors = validate_payment(&form, &values, &options, today).unwrap_err();
        assert!(errors.contains_key("member_type"));
        assert!(errors.contains_key("card_number"));
        assert!(!errors.contains_key("card_cvv"));
    }

    #[test]
    fn test_expired_card_rejected() {
        let today = chrono::Local::now().date_naive();
        let year = today.year().to_string();
        let mut pairs = valid_pairs(&year);
        pairs[3].1 = format!("{:02}", today.month());
        pairs[5].1 = "12".into();
        let pairs: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let (form, values, options) = submit(&pairs);
        let errors = validate_payment(&form, &values, &options, today).unwrap_err();
        assert!(!errors.contains_key("card_exp_year"));
        assert!(errors.contains_key("card_cvv"));

        let last_year = (today.year() - 1).to_string();
        let pairs = valid_pairs(&last_year);
        let pairs: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let (form, values, options) = submit(&pairs);
        let errors = validate_payment(&form, &values, &options, today).unwrap_err();
        assert!(errors.contains_key("card_exp_year"));
    }
}
