mod chat;
mod provider;

pub use chat::RunpodChatModel;
pub use provider::RunpodProvider;
