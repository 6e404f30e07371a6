pub mod builder;
pub mod config;
pub mod error;
pub mod media;
pub mod medium;
pub mod store;

pub use builder::ConversationStoreBuilder;
pub use config::{StoreConfig, DEFAULT_BUDGET_BYTES, DEFAULT_STORE_KEY};
pub use error::PersistError;
pub use media::{FileMedium, MemoryMedium};
pub use medium::{entry_size, StorageMedium};
pub use store::ConversationStore;
