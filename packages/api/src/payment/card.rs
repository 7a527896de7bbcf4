use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Diners,
    Jcb,
}

impl CardBrand {
    pub fn as_str(self) -> &'static str {
        match self {
            CardBrand::Visa => "visa",
            CardBrand::Mastercard => "mastercard",
            CardBrand::Amex => "amex",
            CardBrand::Discover => "discover",
            CardBrand::Diners => "diners",
            CardBrand::Jcb => "jcb",
        }
    }

    pub fn cvv_len(self) -> usize {
        match self {
            CardBrand::Amex => 4,
            _ => 3,
        }
    }
}

impl fmt::Display for CardBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static BRANDS: LazyLock<Vec<(CardBrand, Regex)>> = LazyLock::new(|| {
    [
        (CardBrand::Visa, r"^4[0-9]{12}(?:[0-9]{3})?$"),
        (
            CardBrand::Mastercard,
            r"^(?:5[1-5][0-9]{2}|222[1-9]|22[3-9][0-9]|2[3-6][0-9]{2}|27[01][0-9]|2720)[0-9]{12}$",
        ),
        (CardBrand::Amex, r"^3[47][0-9]{13}$"),
        (CardBrand::Discover, r"^6(?:011|5[0-9]{2})[0-9]{12}$"),
        (CardBrand::Diners, r"^3(?:0[0-5]|[68][0-9])[0-9]{11}$"),
        (CardBrand::Jcb, r"^(?:2131|1800|35[0-9]{3})[0-9]{11}$"),
    ]
    .into_iter()
    .filter_map(|(brand, pattern)| Regex::new(pattern).ok().map(|re| (brand, re)))
    .collect()
});

/// Strip spaces and dashes from a typed card number.
pub fn card_digits(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

pub fn detect_brand(digits: &str) -> Option<CardBrand> {
    BRANDS
        .iter()
        .find(|(_, re)| re.is_match(digits))
        .map(|(brand, _)| *brand)
}

pub fn luhn_valid(digits: &str) -> bool {
    if digits.len() < 12 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = digits
        .bytes()
        .rev()
        .map(|b| u32::from(b - b'0'))
        .enumerate()
        .map(|(i, d)| match (i % 2, d * 2) {
            (1, doubled) if doubled > 9 => doubled - 9,
            (1, doubled) => doubled,
            _ => d,
        })
        .sum();
    sum % 10 == 0
}

/// `************1234`
pub fn mask(digits: &str) -> String {
    let count = digits.chars().count();
    let visible: String = digits.chars().skip(count.saturating_sub(4)).collect();
    format!("{}{}", "*".repeat(count.saturating_sub(4)), visible)
}

pub fn cvv_valid(cvv: &str, brand: CardBrand) -> bool {
    cvv.len() == brand.cvv_len() && cvv.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_detection() {
        assert_eq!(detect_brand("4111111111111111"), Some(CardBrand::Visa));
        assert_eq!(detect_brand("5555555555554444"), Some(CardBrand::Mastercard));
        assert_eq!(detect_brand("2223003122003222"), Some(CardBrand::Mastercard));
        assert_eq!(detect_brand("378282246310005"), Some(CardBrand::Amex));
        assert_eq!(detect_brand("6011111111111117"), Some(CardBrand::Discover));
        assert_eq!(detect_brand("30569309025904"), Some(CardBrand::Diners));
        assert_eq!(detect_brand("3530111333300000"), Some(CardBrand::Jcb));
        assert_eq!(detect_brand("9111111111111111"), None);
    }

    #[test]
    fn test_luhn() {
        assert!(luhn_valid("4111111111111111"));
        assert!(luhn_valid("378282246310005"));
        assert!(!luhn_valid("4111111111111112"));
        assert!(!luhn_valid("41111"));
        assert!(!luhn_valid("4111x11111111111"));
    }

    #[test]
    fn test_mask_and_cvv() {
        assert_eq!(card_digits("4111 1111-1111 1111"), "4111111111111111");
        assert_eq!(mask("4111111111111111"), "************1111");
        assert_eq!(mask("12"), "12");
        assert!(cvv_valid("123", CardBrand::Visa));
        assert!(!cvv_valid("123", CardBrand::Amex));
        assert!(cvv_valid("1234", CardBrand::Amex));
        assert!(!cvv_valid("12a", CardBrand::Visa));
    }
}
