use super::parser::{Config, ConfigError};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "json"];

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.bot_token.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "auth.bot_token must not be empty".to_string(),
            ));
        }
        if self.database.filename.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "database.filename must not be empty".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "logging.level must be one of {LOG_LEVELS:?}, got {:?}",
                self.logging.level
            )));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "logging.format must be one of {LOG_FORMATS:?}, got {:?}",
                self.logging.format
            )));
        }
        if self.commands.prefix.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "commands.prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config::parse("auth:\n  bot_token: \"abc123\"\n").expect("parse")
    }

    #[test]
    fn accepts_defaults() {
        valid_config().validate().expect("defaults are valid");
    }

    #[test]
    fn rejects_empty_token() {
        let mut config = valid_config();
        config.auth.bot_token = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = valid_config();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_unknown_log_format() {
        let mut config = valid_config();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_empty_prefix() {
        let mut config = valid_config();
        config.commands.prefix = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }
}
