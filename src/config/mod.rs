pub mod env;
mod loader;

pub use env::{
    AppConfig, ConfigError, DirectoryConfig, DispatchConfig, GroupTarget, SendFailurePolicy,
};
pub use loader::load_config;
