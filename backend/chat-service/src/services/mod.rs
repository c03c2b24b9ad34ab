pub mod conversation_store;
pub mod pg_store;

pub use conversation_store::{ConversationStore, StoreError};
pub use pg_store::PgConversationStore;
