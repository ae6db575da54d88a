//! Layered runtime configuration.
//!
//! Sources, lowest to highest precedence: `config/default.toml`, then
//! `config/<CARELINK_ENV>.toml`, then `CARELINK_*` environment variables
//! (`__` separates nesting, e.g. `CARELINK_ACTOR__ID`). All settings have
//! defaults so the binary runs with no files present.

use serde::Deserialize;

use crate::models::message::SenderRole;
use crate::store::Actor;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub actor: ActorConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// The session actor the demo binary authenticates as.
#[derive(Debug, Deserialize)]
pub struct ActorConfig {
    pub id: String,
    pub name: String,
    #[serde(default = "default_role")]
    pub role: String, // "doctor" | "patient"
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_role() -> String {
    "doctor".to_string()
}

fn default_filter() -> String {
    "carelink=info".to_string()
}

impl Settings {
    pub fn actor(&self) -> Actor {
        let role = match self.actor.role.as_str() {
            "patient" => SenderRole::Patient,
            _ => SenderRole::Doctor,
        };
        Actor {
            id: self.actor.id.clone(),
            name: self.actor.name.clone(),
            role,
        }
    }
}

/// Loads configuration from files and environment.
pub fn load() -> Result<Settings, config::ConfigError> {
    let env = std::env::var("CARELINK_ENV").unwrap_or_else(|_| "development".into());
    config::Config::builder()
        .set_default("actor.id", "doc-0001")?
        .set_default("actor.name", "Dr. Carelink")?
        .set_default("actor.role", "doctor")?
        .set_default("log.filter", default_filter())?
        .add_source(config::File::with_name("config/default").required(false))
        .add_source(config::File::with_name(&format!("config/{env}")).required(false))
        .add_source(config::Environment::with_prefix("CARELINK").separator("__"))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_setting() {
        let settings = load().expect("defaults should satisfy the schema");
        assert!(!settings.actor.id.is_empty());
        assert_eq!(settings.actor().role, SenderRole::Doctor);
        assert!(settings.log.filter.contains("carelink"));
    }
}
