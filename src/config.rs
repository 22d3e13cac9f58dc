pub mod parser;
pub mod validator;

pub use parser::{
    AuthConfig, CommandsConfig, Config, ConfigError, DatabaseConfig, LoggingConfig,
};
