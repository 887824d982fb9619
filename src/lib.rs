pub mod cli;
pub mod config;
pub mod context;
pub mod report;
pub mod resolve;
pub mod stack;
pub mod template;
pub mod topology;
pub mod userdata;
pub mod validate;

// Convenience re-exports (optional, but nice)
pub use config::StackConfig;
pub use context::DeployContext;
pub use stack::build;
pub use template::Template;
