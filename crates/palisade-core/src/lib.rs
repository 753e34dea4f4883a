//! Core domain types and traits for the Palisade entity gateway.

pub mod auth;
pub mod config;
pub mod error;
pub mod linkage;
pub mod mask;
pub mod obfuscate;
pub mod profile;
pub mod providers;
pub mod record;
pub mod registry;
pub mod traits;
pub mod value;
pub mod vocabulary;

pub use auth::{credential_matches, hash_credential};
pub use config::{DatabaseConfig, EnvironmentProfile, PalisadeConfig, TargetSelector};
pub use error::{CoreError, CoreResult};
pub use linkage::{
    manual_linkage_profile, LinkageKey, LinkageKind, LinkageProfile, LinkageTemplate,
    MANUAL_LINKAGE_TYPE,
};
pub use mask::{Expression, FilterMask};
pub use obfuscate::{
    Base64Obfuscator, Base64ObfuscatorProvider, HexObfuscator, HexObfuscatorProvider,
};
pub use profile::{DefaultRule, EntityProfile, FieldKind, FieldProfile, Operation, ProfileMeta};
pub use providers::ProviderCatalog;
pub use record::Record;
pub use registry::{GatewayRuleSet, ProfileRegistry};
pub use traits::{BackendProvider, BackendStatus, EntityBackend, Obfuscator, ObfuscatorProvider};
pub use value::{value_contains, value_is_contained, values_equal};
pub use vocabulary::{ComparisonOp, OperatorVocabulary};
