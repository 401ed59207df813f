pub mod codes;

pub use codes::AuthCodeBroker;
