//! Backend module - conversational backend clients and their shared shapes

pub mod official;
pub mod reverse_proxy;
pub mod store;
pub mod traits;
pub mod transport;
pub mod types;
pub mod web_chat;

pub use official::{OfficialApiBackend, OfficialApiOptions};
pub use reverse_proxy::{ReverseProxyBackend, ReverseProxyOptions};
pub use store::ConversationStore;
pub use traits::{ChatBackend, ProgressFn};
pub use transport::NetworkTransport;
pub use types::{
    BackendKind, ChatMessage, ConversationContext, SendContext, SendOptions, TokenBudget,
};
pub use web_chat::{WebChatBackend, WebChatOptions};
