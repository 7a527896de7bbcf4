pub mod models;
pub mod notices;
pub mod options;
pub mod repo;

mod memory;
pub use memory::MemoryStore;

pub use models::{
    sanitize_key, AccountId, Cardinality, Contact, DuesPayment, FieldValue, Geocode,
    MemberAccount, MemberStatus, MemberType, Money, NewAccount, NewPayment, PaymentId,
    PaymentStatus, Profile, Role, ROLE_PREFIX,
};
pub use notices::{Notice, NoticeLevel, StoredNotice};
pub use options::{AdminContact, PortalOptions, ProfilesPublic, RecipientKind, Toggle};
pub use repo::{MemberRepository, MemberStore, StoreError};
