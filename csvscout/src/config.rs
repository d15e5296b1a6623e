use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::errors::{FilterError, FilterResult};
use crate::filter::source::DEFAULT_MMAP_THRESHOLD;

/// Environment variable selecting `config/config.{env}.yaml`
pub const ENV_VAR: &str = "CSVSCOUT_ENV";
const DEFAULT_ENV: &str = "dev";

/// Configuration for filtering and the record store.
///
/// # Configuration Locations
///
/// Sources are layered, later ones overriding earlier ones:
/// 1. Global `$HOME/.config/csvscout/config.yaml`
/// 2. `config/config.{env}.yaml`, where `env` comes from `CSVSCOUT_ENV`
///    (default `dev`)
/// 3. Local `.csvscout.yaml` in the current directory
/// 4. Custom config file specified via `--config`
///
/// # Configuration Format
///
/// ```yaml
/// # CSV file with `id,name[,image]` rows
/// data_file: "data/pokemon.csv"
///
/// # Upper bound on worker threads per filter call (default: CPU cores)
/// thread_count: 4
///
/// # Capacity of the match channel (default: requested items, at most 4096)
/// channel_capacity: 64
///
/// # Files at least this large are memory-mapped instead of read
/// mmap_threshold: 10485760
///
/// # Sort results by id instead of returning them in arrival order
/// sort_results: false
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
///
/// # Image URL template; `{id}` and `{name}` are substituted
/// image_url_template: "https://example.org/sprites/{id}.png"
/// ```
///
/// Command-line values take precedence, see [`FilterConfig::merge_with_cli`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,

    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    #[serde(default)]
    pub channel_capacity: Option<usize>,

    #[serde(default = "default_mmap_threshold")]
    pub mmap_threshold: u64,

    #[serde(default)]
    pub sort_results: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_image_url_template")]
    pub image_url_template: String,
}

fn default_data_file() -> PathBuf {
    PathBuf::from("data/pokemon.csv")
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_mmap_threshold() -> u64 {
    DEFAULT_MMAP_THRESHOLD
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_image_url_template() -> String {
    "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon/{id}.png".to_string()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            thread_count: default_thread_count(),
            channel_capacity: None,
            mmap_threshold: default_mmap_threshold(),
            sort_results: false,
            log_level: default_log_level(),
            image_url_template: default_image_url_template(),
        }
    }
}

/// Values given on the command line; `None` leaves the file value alone
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_file: Option<PathBuf>,
    pub thread_count: Option<NonZeroUsize>,
    pub channel_capacity: Option<usize>,
    pub sort_results: bool,
    pub log_level: Option<String>,
    pub image_url_template: Option<String>,
}

impl FilterConfig {
    /// Loads configuration from the default locations
    pub fn load() -> FilterResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus an optional
    /// explicit file, which must exist.
    pub fn load_from(config_path: Option<&Path>) -> FilterResult<Self> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(FilterError::config_error(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }

        let env = std::env::var(ENV_VAR).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_files = [
            dirs::config_dir().map(|p| p.join("csvscout/config.yaml")),
            Some(PathBuf::from("config").join(format!("config.{}.yaml", env))),
            Some(PathBuf::from(".csvscout.yaml")),
            config_path.map(PathBuf::from),
        ];

        let mut builder = ConfigBuilder::builder();
        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Merges command-line values over configuration file values
    pub fn merge_with_cli(mut self, cli: ConfigOverrides) -> Self {
        if let Some(data_file) = cli.data_file {
            self.data_file = data_file;
        }
        if let Some(thread_count) = cli.thread_count {
            self.thread_count = thread_count;
        }
        if cli.channel_capacity.is_some() {
            self.channel_capacity = cli.channel_capacity;
        }
        if cli.sort_results {
            self.sort_results = true;
        }
        if let Some(log_level) = cli.log_level {
            self.log_level = log_level;
        }
        if let Some(template) = cli.image_url_template {
            self.image_url_template = template;
        }
        self
    }

    /// Renders the effective configuration as YAML
    pub fn to_yaml(&self) -> FilterResult<String> {
        serde_yaml::to_string(self).map_err(|e| FilterError::config_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let config_content = r#"
            data_file: "resources/pokemon.csv"
            thread_count: 4
            channel_capacity: 16
            mmap_threshold: 1024
            sort_results: true
            log_level: "debug"
            image_url_template: "https://img.example/{name}.png"
        "#;

        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = FilterConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.data_file, PathBuf::from("resources/pokemon.csv"));
        assert_eq!(config.thread_count, NonZeroUsize::new(4).unwrap());
        assert_eq!(config.channel_capacity, Some(16));
        assert_eq!(config.mmap_threshold, 1024);
        assert!(config.sort_results);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.image_url_template, "https://img.example/{name}.png");
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, "data_file: \"pokemon.csv\"\n").unwrap();

        let config = FilterConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.data_file, PathBuf::from("pokemon.csv"));
        assert_eq!(config.channel_capacity, None);
        assert_eq!(config.mmap_threshold, DEFAULT_MMAP_THRESHOLD);
        assert!(!config.sort_results);
        assert_eq!(
            config.thread_count,
            NonZeroUsize::new(num_cpus::get()).unwrap()
        );
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_merge_with_cli() {
        let file_config = FilterConfig {
            data_file: PathBuf::from("file.csv"),
            thread_count: NonZeroUsize::new(4).unwrap(),
            channel_capacity: Some(8),
            mmap_threshold: 1024,
            sort_results: false,
            log_level: "warn".to_string(),
            image_url_template: "file/{id}".to_string(),
        };

        let merged = file_config.clone().merge_with_cli(ConfigOverrides {
            data_file: Some(PathBuf::from("cli.csv")),
            thread_count: Some(NonZeroUsize::new(2).unwrap()),
            sort_results: true,
            ..Default::default()
        });

        assert_eq!(merged.data_file, PathBuf::from("cli.csv")); // CLI value
        assert_eq!(merged.thread_count, NonZeroUsize::new(2).unwrap()); // CLI value
        assert_eq!(merged.channel_capacity, Some(8)); // File value
        assert!(merged.sort_results); // CLI value
        assert_eq!(merged.log_level, "warn"); // File value
        assert_eq!(merged.image_url_template, "file/{id}"); // File value

        let untouched = file_config.clone().merge_with_cli(ConfigOverrides::default());
        assert_eq!(untouched, file_config);
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            "thread_count: \"many\"\nsort_results: [1, 2]\n",
        )
        .unwrap();

        let result = FilterConfig::load_from(Some(&config_path));
        assert!(matches!(result, Err(FilterError::ConfigError(_))));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, "thread_count: 0\n").unwrap();
        assert!(FilterConfig::load_from(Some(&config_path)).is_err());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = FilterConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(matches!(result, Err(FilterError::ConfigError(_))));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = FilterConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("data_file: data/pokemon.csv"));
        let parsed: FilterConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
