use std::collections::HashSet;

use store::options::PortalOptions;

use super::core;
use super::definition::{FieldDefinition, FieldType};
use crate::viewer::Viewer;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("field {field} names unknown group {parent}")]
    UnknownParent { field: String, parent: String },
    #[error("field {0} registered twice")]
    Duplicate(String),
}

/// Collects field definitions at startup; [`build`](Self::build) freezes them.
#[derive(Debug, Default)]
pub struct FieldRegistryBuilder {
    defs: Vec<FieldDefinition>,
}

impl FieldRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the member profile fields.
    pub fn with_core_profile_fields(mut self) -> Self {
        self.extend(core::profile_fields());
        self
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn register(&mut self, def: FieldDefinition) {
        self.defs.push(def);
    }

    pub fn extend<I: IntoIterator<Item = FieldDefinition>>(&mut self, defs: I) {
        self.defs.extend(defs);
    }

    /// Validates parents and ids, then stable-sorts by priority.
    pub fn build(self) -> Result<FieldRegistry, RegistryError> {
        let mut defs = self.defs;

        let mut seen = HashSet::with_capacity(defs.len());
        for def in &defs {
            if !seen.insert((def.parent.as_deref(), def.id.as_str())) {
                return Err(RegistryError::Duplicate(def.id.clone()));
            }
        }

        let groups: HashSet<&str> = defs
            .iter()
            .filter(|d| d.field_type == FieldType::Group && d.parent.is_none())
            .map(|d| d.id.as_str())
            .collect();
        if let Some(orphan) = defs
            .iter()
            .find(|d| d.parent.as_deref().is_some_and(|p| !groups.contains(p)))
        {
            return Err(RegistryError::UnknownParent {
                field: orphan.id.clone(),
                parent: orphan.parent.clone().unwrap_or_default(),
            });
        }

        defs.sort_by_key(|d| d.priority);
        Ok(FieldRegistry { defs })
    }
}

/// Immutable, priority-ordered field set for one form.
#[derive(Debug)]
pub struct FieldRegistry {
    defs: Vec<FieldDefinition>,
}

impl FieldRegistry {
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.defs
    }

    /// A top-level field by id.
    pub fn get(&self, id: &str) -> Option<&FieldDefinition> {
        self.defs.iter().find(|d| d.parent.is_none() && d.id == id)
    }

    pub fn children<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a FieldDefinition> + 'a {
        self.defs
            .iter()
            .filter(move |d| d.parent.as_deref() == Some(group))
    }

    /// Fields visible to `viewer`, in priority order. Children of a hidden group are dropped.
    pub fn active(&self, viewer: Viewer, options: &PortalOptions) -> Vec<&FieldDefinition> {
        let shown: Vec<&FieldDefinition> = self
            .defs
            .iter()
            .filter(|d| d.visibility.includes(viewer, options))
            .collect();
        let groups: HashSet<&str> = shown
            .iter()
            .filter(|d| d.field_type == FieldType::Group)
            .map(|d| d.id.as_str())
            .collect();
        shown
            .into_iter()
            .filter(|d| d.parent.as_deref().map_or(true, |p| groups.contains(p)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::core::ids;
    use store::options::Toggle;

    #[test]
    fn test_unknown_parent_fails() {
        let mut builder = FieldRegistryBuilder::new();
        builder.register(FieldDefinition::new("phone", "Phone", FieldType::Text).parent("nope"));
        assert_eq!(
            builder.build().unwrap_err(),
            RegistryError::UnknownParent {
                field: "phone".into(),
                parent: "nope".into()
            }
        );
    }

    #[test]
    fn test_parent_must_be_group() {
        let mut builder = FieldRegistryBuilder::new();
        builder.register(FieldDefinition::new("contacts", "Contacts", FieldType::Text));
        builder.register(FieldDefinition::new("phone", "Phone", FieldType::Text).parent("contacts"));
        assert!(matches!(builder.build(), Err(RegistryError::UnknownParent { .. })));
    }

    #[test]
    fn test_duplicate_id_fails() {
        let mut builder = FieldRegistryBuilder::new();
        builder.register(FieldDefinition::new("a", "A", FieldType::Text));
        builder.register(FieldDefinition::new("a", "A again", FieldType::Text));
        assert_eq!(builder.build().unwrap_err(), RegistryError::Duplicate("a".into()));
    }

    #[test]
    fn test_extension_sorted_by_priority() {
        let mut builder = FieldRegistryBuilder::new().with_core_profile_fields();
        builder.register(
            FieldDefinition::new("asamp_user_company_fein", "FEIN", FieldType::Text).priority(55),
        );
        let registry = builder.build().unwrap();
        let order: Vec<&str> = registry.fields().iter().map(|d| d.id.as_str()).collect();
        let name = order.iter().position(|id| *id == ids::COMPANY_NAME).unwrap();
        let fein = order.iter().position(|id| *id == "asamp_user_company_fein").unwrap();
        let description = order.iter().position(|id| *id == ids::COMPANY_DESCRIPTION).unwrap();
        assert!(name < fein && fein < description);
    }

    #[test]
    fn test_active_set_per_viewer() {
        let registry = FieldRegistryBuilder::new()
            .with_core_profile_fields()
            .build()
            .unwrap();
        let options = PortalOptions::default();
        let ids_for = |viewer| -> Vec<String> {
            registry
                .active(viewer, &options)
                .into_iter()
                .map(|d| d.id.clone())
                .collect()
        };

        let admin = ids_for(Viewer::Admin);
        assert!(admin.contains(&ids::MEMBER_STATUS.to_string()));
        assert!(!admin.contains(&ids::MEMBER_TYPE.to_string()));
        assert!(!admin.contains(&ids::PASS.to_string()));

        let member = ids_for(Viewer::Member);
        assert!(member.contains(&ids::COMPANY_LOGO.to_string()));
        assert!(!member.contains(&ids::LOGIN.to_string()));
        assert!(!member.contains(&ids::MEMBER_STATUS.to_string()));

        let non_member = ids_for(Viewer::NonMember);
        assert!(non_member.contains(&ids::LOGIN.to_string()));
        assert!(!non_member.contains(&ids::COMPANY_LOGO.to_string()));

        // Fields with no visibility appear for everyone.
        for list in [&admin, &member, &non_member] {
            assert!(list.contains(&ids::COMPANY_NAME.to_string()));
            assert!(list.contains(&"phone".to_string()));
        }
    }

    #[test]
    fn test_trades_other_hidden_when_disabled() {
        let registry = FieldRegistryBuilder::new()
            .with_core_profile_fields()
            .build()
            .unwrap();
        let options = PortalOptions {
            trades_other: Toggle::No,
            ..PortalOptions::default()
        };
        assert!(registry
            .active(Viewer::Member, &options)
            .iter()
            .all(|d| d.id != ids::COMPANY_BUSINESS_TYPE_OTHER));
    }
}
