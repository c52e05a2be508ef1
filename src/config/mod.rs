/// Database configuration and connection management
pub mod database;

/// Credit settings and session prices loaded from config.toml
pub mod credits;
