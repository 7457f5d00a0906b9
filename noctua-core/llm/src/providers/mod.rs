pub(crate) mod mock;
pub(crate) mod runpod;

pub use mock::{MockChatModel, MockReply};
pub use runpod::{RunpodChatModel, RunpodProvider};
