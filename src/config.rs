use {
    compute_attribution::{
        labels::AddressLabels, pipeline::PipelineConfig, scheduler::SchedulerConfig,
    },
    serde::Deserialize,
    solana_commitment_config::CommitmentLevel,
    std::{
        collections::HashMap,
        path::{Path, PathBuf},
    },
};

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8899";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl From<Commitment> for CommitmentLevel {
    fn from(value: Commitment) -> Self {
        match value {
            Commitment::Processed => CommitmentLevel::Processed,
            Commitment::Confirmed => CommitmentLevel::Confirmed,
            Commitment::Finalized => CommitmentLevel::Finalized,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc_url: String,
    pub commitment: Commitment,
    pub request_timeout_ms: u64,
    pub scheduler: SchedulerConfig,
    pub pipeline: PipelineConfig,
    /// Extra address labels, taking precedence over the built-in table.
    pub labels: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_owned(),
            commitment: Commitment::default(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            scheduler: SchedulerConfig::default(),
            pipeline: PipelineConfig::default(),
            labels: HashMap::new(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid("rpc_url must not be empty".to_owned()));
        }
        if self.scheduler.max_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.max_in_flight must be at least 1".to_owned(),
            ));
        }
        if self.scheduler.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.fetch_timeout_ms must be positive".to_owned(),
            ));
        }
        if self.pipeline.window_capacity == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.window_capacity must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    ///
    /// Built-in labels extended with the configured ones.
    ///
    pub fn address_labels(&self) -> AddressLabels {
        let mut labels = AddressLabels::with_well_known();
        labels.extend(self.labels.clone());
        labels
    }
}

#[cfg(test)]
mod tests {
    use {super::*, common_macros::hash_map};

    #[test]
    fn it_should_default_every_field() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.scheduler.slot_lag, 32);
        assert_eq!(config.scheduler.max_in_flight, 1);
        assert!(!config.scheduler.publish_no_data);
        assert_eq!(config.pipeline.window_capacity, 5);
        assert_eq!(config.pipeline.insights_top_k, 10);
        assert_eq!(config.pipeline.top_accounts, 50);
        assert_eq!(CommitmentLevel::from(config.commitment), CommitmentLevel::Confirmed);
    }

    #[test]
    fn it_should_parse_full_config() {
        let yaml = r#"
rpc_url: https://api.mainnet-beta.solana.com
commitment: finalized
request_timeout_ms: 5000
scheduler:
  slot_lag: 10
  max_in_flight: 4
  min_fetch_interval_ms: 100
  publish_no_data: true
pipeline:
  window_capacity: 3
  top_accounts: 20
labels:
  MyProgram1111111111111111111111111111111111: My Program
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.rpc_url, "https://api.mainnet-beta.solana.com");
        assert_eq!(config.commitment, Commitment::Finalized);
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.scheduler.slot_lag, 10);
        assert_eq!(config.scheduler.max_in_flight, 4);
        assert_eq!(config.scheduler.min_fetch_interval_ms, 100);
        assert!(config.scheduler.publish_no_data);
        assert_eq!(
            config.scheduler.fetch_retries,
            SchedulerConfig::default().fetch_retries
        );
        assert_eq!(config.pipeline.window_capacity, 3);
        assert_eq!(config.pipeline.top_accounts, 20);
        assert_eq!(config.pipeline.insights_top_k, 10);
        assert_eq!(
            config.labels,
            hash_map! {
                "MyProgram1111111111111111111111111111111111".to_owned() => "My Program".to_owned(),
            }
        );
    }

    #[test]
    fn it_should_let_configured_labels_override_built_in() {
        let config = Config {
            labels: hash_map! {
                "11111111111111111111111111111111".to_owned() => "Sys".to_owned(),
                "Custom".to_owned() => "Custom Label".to_owned(),
            },
            ..Default::default()
        };
        let labels = config.address_labels();
        assert_eq!(labels.label("11111111111111111111111111111111"), "Sys");
        assert_eq!(labels.label("Custom"), "Custom Label");
        assert_eq!(labels.label("Unknown"), "Unknown");
    }

    #[test]
    fn it_should_reject_invalid_values() {
        for yaml in [
            "rpc_url: ''",
            "scheduler: {max_in_flight: 0}",
            "scheduler: {fetch_timeout_ms: 0}",
            "pipeline: {window_capacity: 0}",
        ] {
            assert!(
                matches!(Config::from_yaml_str(yaml), Err(ConfigError::Invalid(_))),
                "{yaml} should be rejected"
            );
        }
        assert!(matches!(
            Config::from_yaml_str("commitment: recent"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn it_should_report_missing_file() {
        let err = Config::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
