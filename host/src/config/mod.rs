//! Configuration management: defaults, validation, loading from DB + environment.

pub mod app_config;
pub mod defaults;
pub mod manager;
pub mod validation;

pub use app_config::HostConfig;
pub use manager::SettingsManager;
