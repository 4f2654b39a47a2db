//! Core constants for Home Assistant
//!
//! Configuration keys and well-known identifiers shared between the config
//! entry machinery and the integrations, mirroring `homeassistant.const`.

/// Keys used in integration configuration and config entry data
pub mod conf {
    /// Account name or e-mail address
    pub const CONF_USERNAME: &str = "username";

    /// Account password (never persisted)
    pub const CONF_PASSWORD: &str = "password";

    /// Long-lived token stored in place of a password
    pub const CONF_TOKEN: &str = "token";
}

/// Config flow sources
pub mod sources {
    /// Flow started by a user from the UI
    pub const SOURCE_USER: &str = "user";

    /// Flow started from YAML configuration
    pub const SOURCE_IMPORT: &str = "import";
}

/// Error key for errors not tied to a single form field
pub const ERROR_BASE: &str = "base";
