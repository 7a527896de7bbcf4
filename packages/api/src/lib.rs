//! # API crate: the ASA member portal
//!
//! Everything the web front end calls lives here. The crate is written against the
//! [`store::MemberStore`] trait so every operation can run on the in-memory store in tests
//! and on PostgreSQL in production.
//!
//! ## Modules
//!
//! | Module | Feature gate | Purpose |
//! |--------|-------------|---------|
//! | [`auth`] | none | Password hashing, session keys, anti-forgery tokens |
//! | [`db`] | `server` | PostgreSQL pool and the [`db::PgStore`] backend |
//! | [`directory`] | none | Member directory and map listings per viewer |
//! | [`error`] | none | [`PortalError`] and the messages shown to visitors |
//! | [`fields`] | none | Field definitions, per-viewer states and the registries |
//! | [`forms`] | none | Form descriptors, input sanitizing |
//! | [`geocode`] | none | Throttled address lookups for the map |
//! | [`handlers`] | none | Profile, sign-in, sign-out, payment and import submissions |
//! | [`lifecycle`] | none | Activation, deactivation, options saving, settings tabs |
//! | [`mail`] | none | Payment receipt and admin notification emails |
//! | [`pages`] | none | Shortcode rendering into [`PageView`]s |
//! | [`payment`] | none | Card checks, dues and expiry arithmetic, gateways |
//! | [`portal`] | none | The [`Portal`] context shared by every request |
//! | [`roles`] | none | Member roles derived from the configured member types |
//! | [`settings`] | none | Deployment settings from `portal.toml` and the environment |
//! | [`shortcodes`] | none | Shortcode parsing and redirect status flags |
//! | [`transfer`] | none | Members CSV import and export |
//! | [`validation`] | none | Profile and sign-in validation rules |
//! | [`viewer`] | none | Admin / member / non-member classification |

pub mod auth;
pub mod db;
pub mod directory;
pub mod error;
pub mod fields;
pub mod forms;
pub mod geocode;
pub mod handlers;
pub mod lifecycle;
pub mod mail;
pub mod pages;
pub mod payment;
pub mod portal;
pub mod roles;
pub mod settings;
pub mod shortcodes;
pub mod transfer;
pub mod validation;
pub mod viewer;

pub use error::{PortalError, Result};
pub use forms::{FormInput, FormKind};
pub use handlers::{Outcome, SessionChange, Submission};
pub use pages::{FormFailure, PageContext, PageView};
pub use portal::{Portal, PortalBuilder};
pub use settings::Settings;
pub use shortcodes::{parse_shortcodes, Shortcode, StatusFlag, StatusFlags};
pub use viewer::{RequestScope, Viewer};
