//! # Field definitions
//!
//! Every member-facing form is described declaratively. A [`FieldDefinition`] carries an
//! id, a label, a [`FieldType`], a default and choices that may depend on the admin
//! options ([`Resolvable`]), a [`Visibility`] predicate, per-viewer [`Variant`]s, a
//! [`Sanitizer`] and validation hints.
//!
//! Collaborators contribute fields at startup through a [`FieldRegistryBuilder`]; the
//! resulting [`FieldRegistry`] is immutable for the life of the process.
//!
//! ```ignore
//! let mut builder = FieldRegistryBuilder::new().with_core_profile_fields();
//! builder.register(
//!     FieldDefinition::new("asamp_user_company_fein", "FEIN", FieldType::Text).priority(55),
//! );
//! let registry = builder.build()?;
//! let active = registry.active(scope.viewer(), &options);
//! ```

pub mod core;
mod definition;
mod registry;
pub mod states;
mod visibility;

pub use definition::{
    Choice, FieldDefinition, FieldType, FromOption, OptionKey, Resolvable, Sanitizer, Variant,
};
pub use registry::{FieldRegistry, FieldRegistryBuilder, RegistryError};
pub use visibility::{resolve_variant, ConditionalRule, ResolvedVariant, Visibility};
