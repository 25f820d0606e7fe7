mod chains;
mod config;
mod contracts;
mod cursors;
mod diesel;
pub mod events;
pub mod filters;
mod hashes;
pub mod jobs;
mod notifications;
pub mod poller;
mod repos;
mod retention;
pub mod scheduler;
mod worker;

pub use chains::Chain;
pub use config::{Config, ConfigError};
pub use contracts::{ContractEvent, ContractEventTopic, InvalidEventAbi};
pub use cursors::{CursorKey, FilterCursor};
pub use events::{EventParam, LogEvent};
pub use filters::{FilterContext, FilterError, LogFilter};
pub use jobs::{Job, JobAuditRecord, JobStatus, UnsavedJob};
pub use notifications::{Notification, NotificationKind, UnsavedNotification};
pub use poller::{
    PollReport, Poller, PollerConfig, PollerError, Provider, ProviderError, StartBlock,
};
pub use repos::*;
pub use retention::RetentionConfig;
pub use scheduler::{JobError, JobRegistry, JobRunner, Scheduler, SchedulerConfig, SchedulerError};
pub use worker::{build_pollers, build_registry, get_default_filters, start, WorkerTask};

pub use ethers::types::{Address, U256};

use derive_more::Display;

#[cfg(feature = "postgres")]
pub type ChainwatchRepo = PostgresRepo;

#[derive(Debug, Display)]
pub enum ChainwatchError {
    #[display("Config error: {_0}")]
    Config(ConfigError),
    #[display("{_0}")]
    Repo(RepoError),
    #[display("Provider error: {_0}")]
    Provider(ProviderError),
    #[display("{_0}")]
    Scheduler(SchedulerError),
    #[display("{_0}")]
    InvalidEventAbi(InvalidEventAbi),
}

impl std::error::Error for ChainwatchError {}

impl From<ConfigError> for ChainwatchError {
    fn from(value: ConfigError) -> Self {
        ChainwatchError::Config(value)
    }
}

impl From<RepoError> for ChainwatchError {
    fn from(value: RepoError) -> Self {
        ChainwatchError::Repo(value)
    }
}

impl From<ProviderError> for ChainwatchError {
    fn from(value: ProviderError) -> Self {
        ChainwatchError::Provider(value)
    }
}

impl From<SchedulerError> for ChainwatchError {
    fn from(value: SchedulerError) -> Self {
        ChainwatchError::Scheduler(value)
    }
}

impl From<InvalidEventAbi> for ChainwatchError {
    fn from(value: InvalidEventAbi) -> Self {
        ChainwatchError::InvalidEventAbi(value)
    }
}
