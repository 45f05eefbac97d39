pub mod app;
pub mod capture;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod domain;
pub mod infrastructure;
pub mod platform;
pub mod resolver;
pub mod telegram;

#[cfg(test)]
mod test_support;
