mod error;

pub use error::ConfigError;

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use ethers::types::Address;

use crate::chains::Chain;
use crate::jobs::{
    watch_chain_job_data, CronSchedule, UnsavedJob, CLEANUP_AUDIT_LOG_JOB,
    REMOVE_OLD_WORKER_JOBS_JOB, WATCH_CHAIN_JOB,
};
use crate::poller::{PollerConfig, StartBlock, DEFAULT_MAX_BLOCK_RANGE};
use crate::retention::RetentionConfig;
use crate::scheduler::{
    SchedulerConfig, DEFAULT_BATCH_SIZE, DEFAULT_JOB_TIMEOUT_MS, DEFAULT_STALE_CLAIM_GRACE_MS,
    DEFAULT_TICK_INTERVAL_MS,
};

pub const DEFAULT_WATCH_CHAIN_CRON: &str = "*/15 * * * * *";
pub const DEFAULT_REMOVE_OLD_JOBS_CRON: &str = "0 */10 * * * *";
pub const DEFAULT_CLEANUP_AUDIT_LOG_CRON: &str = "0 0 * * * *";

#[derive(Clone, Debug)]
pub struct Config {
    pub chains: Vec<Chain>,
    pub database_url: Option<String>,
    pub max_block_range: u64,
    pub start_block: StartBlock,
    pub tick_interval_ms: u64,
    pub job_timeout_ms: u64,
    pub watch_chain_cron: String,
    pub remove_old_jobs_cron: String,
    pub cleanup_audit_log_cron: String,
    pub retention_config: RetentionConfig,
    /// Restricts the token-created filter to logs emitted by the factory
    pub token_factory_address: Option<Address>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            chains: vec![],
            database_url: None,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            start_block: StartBlock::Head,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            job_timeout_ms: DEFAULT_JOB_TIMEOUT_MS,
            watch_chain_cron: DEFAULT_WATCH_CHAIN_CRON.to_string(),
            remove_old_jobs_cron: DEFAULT_REMOVE_OLD_JOBS_CRON.to_string(),
            cleanup_audit_log_cron: DEFAULT_CLEANUP_AUDIT_LOG_CRON.to_string(),
            retention_config: RetentionConfig::default(),
            token_factory_address: None,
        }
    }

    pub fn add_chain(mut self, chain: Chain) -> Self {
        self.chains.push(chain);

        self
    }

    pub fn with_database_url(mut self, database_url: &str) -> Self {
        self.database_url = Some(database_url.to_string());

        self
    }

    pub fn with_max_block_range(mut self, max_block_range: u64) -> Self {
        self.max_block_range = max_block_range;

        self
    }

    pub fn with_start_block(mut self, start_block: StartBlock) -> Self {
        self.start_block = start_block;

        self
    }

    pub fn with_tick_interval_ms(mut self, tick_interval_ms: u64) -> Self {
        self.tick_interval_ms = tick_interval_ms;

        self
    }

    pub fn with_job_timeout_ms(mut self, job_timeout_ms: u64) -> Self {
        self.job_timeout_ms = job_timeout_ms;

        self
    }

    pub fn with_watch_chain_cron(mut self, cron_schedule: &str) -> Self {
        self.watch_chain_cron = cron_schedule.to_string();

        self
    }

    pub fn with_remove_old_jobs_cron(mut self, cron_schedule: &str) -> Self {
        self.remove_old_jobs_cron = cron_schedule.to_string();

        self
    }

    pub fn with_cleanup_audit_log_cron(mut self, cron_schedule: &str) -> Self {
        self.cleanup_audit_log_cron = cron_schedule.to_string();

        self
    }

    pub fn with_audit_log_max_age(mut self, audit_log_max_age: Duration) -> Self {
        self.retention_config = RetentionConfig {
            audit_log_max_age,
            ..self.retention_config
        };

        self
    }

    pub fn with_token_factory_address(mut self, token_factory_address: Address) -> Self {
        self.token_factory_address = Some(token_factory_address);

        self
    }

    /// Reads the configuration from the environment, after loading `.env` if present
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(get_var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get_var("DATABASE_URL").ok_or(ConfigError::MissingEnv("DATABASE_URL"))?;
        let chains = get_var("CHAINS").ok_or(ConfigError::MissingEnv("CHAINS"))?;

        let mut config = parse_chains(&chains)?
            .into_iter()
            .fold(Self::new(), |config, chain| config.add_chain(chain))
            .with_database_url(&database_url);

        if let Some(max_block_range) = parse_var(&get_var, "MAX_BLOCK_RANGE")? {
            config = config.with_max_block_range(max_block_range);
        }
        if let Some(start_block) = parse_var(&get_var, "START_BLOCK")? {
            config = config.with_start_block(start_block);
        }
        if let Some(tick_interval_ms) = parse_var(&get_var, "TICK_INTERVAL_MS")? {
            config = config.with_tick_interval_ms(tick_interval_ms);
        }
        if let Some(job_timeout_ms) = parse_var(&get_var, "JOB_TIMEOUT_MS")? {
            config = config.with_job_timeout_ms(job_timeout_ms);
        }
        if let Some(cron_schedule) = get_var("WATCH_CHAIN_CRON") {
            config = config.with_watch_chain_cron(&cron_schedule);
        }
        if let Some(cron_schedule) = get_var("REMOVE_OLD_JOBS_CRON") {
            config = config.with_remove_old_jobs_cron(&cron_schedule);
        }
        if let Some(cron_schedule) = get_var("CLEANUP_AUDIT_LOG_CRON") {
            config = config.with_cleanup_audit_log_cron(&cron_schedule);
        }
        if let Some(max_age_secs) = parse_var::<u64>(&get_var, "AUDIT_LOG_MAX_AGE_SECS")? {
            config = config.with_audit_log_max_age(Duration::from_secs(max_age_secs));
        }
        if let Some(token_factory_address) = parse_var(&get_var, "TOKEN_FACTORY_ADDRESS")? {
            config = config.with_token_factory_address(token_factory_address);
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chains.is_empty() {
            return Err(ConfigError::NoChain);
        }

        let mut chain_names = HashSet::new();
        if let Some(chain) = self.chains.iter().find(|c| !chain_names.insert(c.name.as_str())) {
            return Err(ConfigError::DuplicateChain(chain.name.clone()));
        }

        if self.max_block_range == 0 {
            return Err(ConfigError::ZeroBlockRange);
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }

        for cron_schedule in [
            &self.watch_chain_cron,
            &self.remove_old_jobs_cron,
            &self.cleanup_audit_log_cron,
        ] {
            CronSchedule::parse(cron_schedule)?;
        }

        Ok(())
    }

    pub fn get_poller_config(&self) -> PollerConfig {
        PollerConfig {
            max_block_range: self.max_block_range,
            start_block: self.start_block,
        }
    }

    pub fn get_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            job_timeout: Duration::from_millis(self.job_timeout_ms),
            batch_size: DEFAULT_BATCH_SIZE,
            stale_claim_grace: Duration::from_millis(DEFAULT_STALE_CLAIM_GRACE_MS),
            retention_config: self.retention_config.clone(),
        }
    }

    /// First instances of the jobs that keep the worker busy: one chain watch per
    /// chain plus the two retention purges
    pub fn get_recurring_jobs(&self) -> Vec<UnsavedJob> {
        let window = self.retention_config.job_retention_window;

        self.chains
            .iter()
            .map(|chain| {
                UnsavedJob::new(WATCH_CHAIN_JOB, watch_chain_job_data(&chain.name))
                    .with_cron_schedule(&self.watch_chain_cron)
            })
            .chain([
                UnsavedJob::new(REMOVE_OLD_WORKER_JOBS_JOB, serde_json::json!({}))
                    .with_cron_schedule(&self.remove_old_jobs_cron),
                UnsavedJob::new(CLEANUP_AUDIT_LOG_JOB, serde_json::json!({}))
                    .with_cron_schedule(&self.cleanup_audit_log_cron),
            ])
            .map(|job| job.with_retention(window))
            .collect()
    }
}

fn parse_var<T: FromStr>(
    get_var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    get_var(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|error: T::Err| ConfigError::InvalidEnv(key, error.to_string()))
        })
        .transpose()
}

/// `name=url` pairs separated by commas
fn parse_chains(chains: &str) -> Result<Vec<Chain>, ConfigError> {
    chains
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((name, json_rpc_url))
                if !name.trim().is_empty() && !json_rpc_url.trim().is_empty() =>
            {
                Ok(Chain::new(name.trim(), json_rpc_url.trim()))
            }
            _ => Err(ConfigError::InvalidEnv(
                "CHAINS",
                format!("expected name=url, got `{entry}`"),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();

        move |key| vars.get(key).cloned()
    }

    #[test]
    fn reads_config_from_vars_with_defaults() {
        let config = Config::from_vars(vars(&[
            ("DATABASE_URL", "postgres://localhost/chainwatch"),
            ("CHAINS", "mainnet=http://localhost:8545, base=http://localhost:9545"),
            ("START_BLOCK", "genesis"),
        ]))
        .unwrap();

        assert_eq!(config.chains.len(), 2);
        assert_eq!(config.chains[1].name, "base");
        assert_eq!(config.start_block, StartBlock::Genesis);
        assert_eq!(config.max_block_range, 500);
        assert_eq!(config.tick_interval_ms, 1_000);
        assert_eq!(config.job_timeout_ms, 300_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn requires_database_url_and_chains() {
        assert_eq!(
            Config::from_vars(vars(&[("CHAINS", "mainnet=http://localhost:8545")])).unwrap_err(),
            ConfigError::MissingEnv("DATABASE_URL")
        );
        assert!(matches!(
            Config::from_vars(vars(&[("DATABASE_URL", "postgres://"), ("CHAINS", "mainnet")])),
            Err(ConfigError::InvalidEnv("CHAINS", _))
        ));
    }

    #[test]
    fn rejects_invalid_numbers() {
        assert!(matches!(
            Config::from_vars(vars(&[
                ("DATABASE_URL", "postgres://"),
                ("CHAINS", "mainnet=http://localhost:8545"),
                ("MAX_BLOCK_RANGE", "lots"),
            ])),
            Err(ConfigError::InvalidEnv("MAX_BLOCK_RANGE", _))
        ));
    }

    #[test]
    fn validates_chains_ranges_and_cron_schedules() {
        assert_eq!(Config::new().validate(), Err(ConfigError::NoChain));

        let chain = Chain::new("mainnet", "http://localhost:8545");
        assert_eq!(
            Config::new().add_chain(chain.clone()).add_chain(chain.clone()).validate(),
            Err(ConfigError::DuplicateChain("mainnet".to_string()))
        );
        assert_eq!(
            Config::new().add_chain(chain.clone()).with_max_block_range(0).validate(),
            Err(ConfigError::ZeroBlockRange)
        );
        assert!(matches!(
            Config::new().add_chain(chain).with_watch_chain_cron("soon").validate(),
            Err(ConfigError::InvalidCronSchedule(_))
        ));
    }

    #[test]
    fn builds_one_watch_job_per_chain() {
        let config = Config::new()
            .add_chain(Chain::new("mainnet", "http://localhost:8545"))
            .add_chain(Chain::new("base", "http://localhost:9545"));

        let job_types: Vec<_> =
            config.get_recurring_jobs().into_iter().map(|job| job.job_type).collect();

        assert_eq!(
            job_types,
            vec![
                WATCH_CHAIN_JOB,
                WATCH_CHAIN_JOB,
                REMOVE_OLD_WORKER_JOBS_JOB,
                CLEANUP_AUDIT_LOG_JOB,
            ]
        );
    }
}
