//! Provider identity, tool descriptors, and the connector/credential-store
//! capability sets the Tool Gateway (C5) depends on (§3, §6).

pub mod model;
pub mod registry;
pub mod traits;

pub use model::{Provider, ProviderSession, ToolCallRecord, ToolDescriptor};
pub use registry::ProviderRegistry;
pub use traits::{CredentialStore, InMemoryCredentialStore, ProviderConnector};
