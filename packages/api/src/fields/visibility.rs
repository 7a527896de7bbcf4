//! Field visibility and per-viewer variants.
//!
//! A field with no rules and no viewer set is always shown. Otherwise the conditional
//! rules run first: a rule *matches* when `(option == value) != negate`. A matching
//! negated rule includes the field outright; a matching plain rule falls through to the
//! viewer set; a rule that does not match excludes the field. Finally the viewer set, if
//! any, must contain the current viewer.

use std::collections::BTreeSet;

use store::options::PortalOptions;

use super::definition::{FieldDefinition, OptionKey};
use crate::viewer::Viewer;

/// Include or exclude a field depending on an option's current value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionalRule {
    pub option: OptionKey,
    pub value: String,
    pub negate: bool,
}

impl ConditionalRule {
    /// Shown only while `option` equals `value`.
    pub fn when(option: OptionKey, value: impl Into<String>) -> Self {
        Self {
            option,
            value: value.into(),
            negate: false,
        }
    }

    /// Shown whenever `option` does not equal `value`.
    pub fn unless(option: OptionKey, value: impl Into<String>) -> Self {
        Self {
            option,
            value: value.into(),
            negate: true,
        }
    }

    pub fn matches(&self, options: &PortalOptions) -> bool {
        (self.option.text(options) == self.value) != self.negate
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Visibility {
    pub rules: Vec<ConditionalRule>,
    pub viewers: Option<BTreeSet<Viewer>>,
}

impl Visibility {
    pub fn is_absent(&self) -> bool {
        self.rules.is_empty() && self.viewers.is_none()
    }

    pub fn includes(&self, viewer: Viewer, options: &PortalOptions) -> bool {
        for rule in &self.rules {
            if !rule.matches(options) {
                return false;
            }
            if rule.negate {
                return true;
            }
        }
        match &self.viewers {
            Some(viewers) => viewers.contains(&viewer),
            None => true,
        }
    }
}

/// Label and required-ness of a field as seen by one viewer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedVariant {
    pub label: String,
    pub required: bool,
}

pub fn resolve_variant(
    field: &FieldDefinition,
    viewer: Viewer,
    options: &PortalOptions,
) -> ResolvedVariant {
    let variant = field.variants.get(&viewer);
    let label = variant
        .and_then(|v| v.label.as_ref())
        .unwrap_or(&field.label)
        .resolve(options);
    let required = variant
        .and_then(|v| v.required)
        .unwrap_or(field.required);
    ResolvedVariant { label, required }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::definition::{FieldType, Variant};
    use store::options::Toggle;

    fn options(trades_other: Toggle) -> PortalOptions {
        PortalOptions {
            trades_other,
            ..PortalOptions::default()
        }
    }

    #[test]
    fn test_absent_visibility_always_included() {
        let visibility = Visibility::default();
        assert!(visibility.is_absent());
        for viewer in Viewer::ALL {
            assert!(visibility.includes(viewer, &options(Toggle::No)));
        }
    }

    #[test]
    fn test_member_and_non_member_excludes_admin() {
        let field = FieldDefinition::new("f", "F", FieldType::Text)
            .visible_to([Viewer::Member, Viewer::NonMember]);
        let opts = options(Toggle::Yes);
        assert!(!field.visibility.includes(Viewer::Admin, &opts));
        assert!(field.visibility.includes(Viewer::Member, &opts));
        assert!(field.visibility.includes(Viewer::NonMember, &opts));
    }

    #[test]
    fn test_negated_rule_tracks_option() {
        let field = FieldDefinition::new("f", "F", FieldType::Text)
            .rule(ConditionalRule::unless(OptionKey::TradesOther, "no"));
        for viewer in Viewer::ALL {
            assert!(field.visibility.includes(viewer, &options(Toggle::Yes)));
            assert!(!field.visibility.includes(viewer, &options(Toggle::No)));
        }
    }

    #[test]
    fn test_negated_match_short_circuits_viewer_set() {
        let field = FieldDefinition::new("f", "F", FieldType::Text)
            .visible_to([Viewer::Member])
            .rule(ConditionalRule::unless(OptionKey::TradesOther, "no"));
        assert!(field.visibility.includes(Viewer::NonMember, &options(Toggle::Yes)));
    }

    #[test]
    fn test_plain_rule_falls_through_to_viewers() {
        let field = FieldDefinition::new("f", "F", FieldType::Text)
            .visible_to([Viewer::Member])
            .rule(ConditionalRule::when(OptionKey::TradesOther, "yes"));
        let yes = options(Toggle::Yes);
        assert!(field.visibility.includes(Viewer::Member, &yes));
        assert!(!field.visibility.includes(Viewer::NonMember, &yes));
        assert!(!field.visibility.includes(Viewer::Member, &options(Toggle::No)));
    }

    #[test]
    fn test_empty_viewer_set_excludes() {
        let field = FieldDefinition::new("f", "F", FieldType::Text).visible_to([]);
        for viewer in Viewer::ALL {
            assert!(!field.visibility.includes(viewer, &options(Toggle::Yes)));
        }
    }

    #[test]
    fn test_variant_resolution() {
        let field = FieldDefinition::new("pass", "Password", FieldType::Password)
            .required()
            .variant(
                Viewer::Member,
                Variant {
                    label: Some("New Password".into()),
                    required: Some(false),
                },
            );
        let opts = PortalOptions::default();
        assert_eq!(
            resolve_variant(&field, Viewer::Member, &opts),
            ResolvedVariant {
                label: "New Password".into(),
                required: false
            }
        );
        assert_eq!(
            resolve_variant(&field, Viewer::NonMember, &opts),
            ResolvedVariant {
                label: "Password".into(),
                required: true
            }
        );
    }
}
