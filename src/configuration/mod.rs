use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

mod error;

use crate::middleware::AuthenticateOptions;
pub use error::Error;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Configuration {
    #[serde(default = "Configuration::default_user_property")]
    pub user_property: String,
    #[serde(default = "Configuration::default_session_key")]
    pub session_key: String,
    #[serde(default)]
    pub keep_session_info: bool,
    #[serde(default)]
    pub profiles: HashMap<String, AuthenticateOptions>, // hashmap of profile name <-> authenticate options
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            user_property: Configuration::default_user_property(),
            session_key: Configuration::default_session_key(),
            keep_session_info: false,
            profiles: HashMap::new(),
        }
    }
}

impl Configuration {
    fn default_user_property() -> String {
        "user".to_string()
    }

    fn default_session_key() -> String {
        "passport".to_string()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_str = fs::read_to_string(path)?;
        Self::load_from_str(&config_str)
    }

    pub fn load_from_str(slice: &str) -> Result<Self, Error> {
        let config: Configuration = toml::from_str(slice)?;

        if config.user_property.is_empty() {
            return Err(Error::InvalidValue(
                "user_property must not be empty".to_string(),
            ));
        }
        if config.session_key.is_empty() {
            return Err(Error::InvalidValue(
                "session_key must not be empty".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn profile(&self, name: &str) -> Option<&AuthenticateOptions> {
        self.profiles.get(name)
    }
}
