use derive_more::Display;

use crate::jobs::InvalidCronSchedule;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum ConfigError {
    #[display("At least one chain is required")]
    NoChain,
    #[display("Chain `{_0}` is configured more than once")]
    DuplicateChain(String),
    #[display("Max block range must be at least 1")]
    ZeroBlockRange,
    #[display("Tick interval must be at least 1ms")]
    ZeroTickInterval,
    #[display("Missing environment variable {_0}")]
    MissingEnv(&'static str),
    #[display("Invalid {_0}: {_1}")]
    InvalidEnv(&'static str, String),
    #[display("{_0}")]
    InvalidCronSchedule(InvalidCronSchedule),
    #[display("No runner registered for recurring job type `{_0}`")]
    UnregisteredJobType(String),
}

impl std::error::Error for ConfigError {}

impl From<InvalidCronSchedule> for ConfigError {
    fn from(value: InvalidCronSchedule) -> Self {
        ConfigError::InvalidCronSchedule(value)
    }
}
