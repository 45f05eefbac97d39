mod listener;
pub mod media;
mod service;

pub use service::TelegramPlatform;
