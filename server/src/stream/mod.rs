pub mod events;
pub mod login;
pub mod logs;
pub mod registry;

pub use registry::{ChannelStream, PushOutcome, StreamConfig, StreamRegistry};
