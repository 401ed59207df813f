pub mod history;

pub use history::{
    ChatHistoryCache, ClearOutcome, LastReply, ROLE_ASSISTANT, ROLE_SYSTEM, ROLE_USER,
};
