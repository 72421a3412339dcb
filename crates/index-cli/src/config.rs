//! Command line configuration for `hfs-index`.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HFS_INDEX_BASE_URL` | http://localhost:8080/ | Base URL for relative references |
//! | `HFS_INDEX_LOG_LEVEL` | warn | Log level |
//! | `HFS_INDEX_SCHEMA` | | Extra schema files (comma-separated) |
//! | `HFS_INDEX_LOOKUP_DIR` | | Directory of `<Type>/<id>.json` documents for chaining |
//! | `HFS_INDEX_MAX_CHAIN_DEPTH` | 1 | Hops followed per reference |
//! | `HFS_INDEX_CONCURRENCY` | 8 | Documents indexed at once |
//! | `HFS_INDEX_TZ_OFFSET` | +00:00 | Offset for timestamps without one |
//! | `HFS_INDEX_NO_CHAIN` | false | Disable chaining |

use std::path::PathBuf;

use clap::Parser;
use helios_index::IndexerConfig;
use helios_index::config::parse_offset;

/// Projects FHIR JSON documents into search index entries.
#[derive(Debug, Clone, Parser)]
#[command(name = "hfs-index")]
#[command(about = "Project FHIR resources into search index entries")]
#[command(version)]
pub struct CliConfig {
    /// Files or directories of JSON documents. Bundles are expanded.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Base URL used to absolutize relative references.
    #[arg(long, env = "HFS_INDEX_BASE_URL", default_value = "http://localhost:8080/")]
    pub base_url: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "HFS_INDEX_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Schema files (schema-file format or SearchParameter resources),
    /// applied over the built-in table in order.
    #[arg(long, env = "HFS_INDEX_SCHEMA", value_delimiter = ',')]
    pub schema: Vec<PathBuf>,

    /// Directory laid out as `<Type>/<id>.json` used to resolve references.
    #[arg(long, env = "HFS_INDEX_LOOKUP_DIR")]
    pub lookup_dir: Option<PathBuf>,

    /// Hops followed from a top-level document.
    #[arg(long, env = "HFS_INDEX_MAX_CHAIN_DEPTH", default_value = "1")]
    pub max_chain_depth: usize,

    /// Documents indexed (and lookups issued) at once.
    #[arg(long, env = "HFS_INDEX_CONCURRENCY", default_value = "8")]
    pub concurrency: usize,

    /// Offset assumed for timestamps without one.
    #[arg(long, env = "HFS_INDEX_TZ_OFFSET", default_value = "+00:00", allow_hyphen_values = true)]
    pub tz_offset: String,

    /// Do not follow references even when a lookup directory is given.
    #[arg(long, env = "HFS_INDEX_NO_CHAIN")]
    pub no_chain: bool,

    /// Write entries to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CliConfig {
    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.base_url.trim().is_empty() {
            errors.push("Base URL cannot be empty".to_string());
        }

        if self.concurrency == 0 {
            errors.push("Concurrency cannot be 0".to_string());
        }

        if !self.no_chain && self.lookup_dir.is_some() && self.max_chain_depth == 0 {
            errors.push("Max chain depth must be at least 1 when chaining".to_string());
        }

        if let Err(e) = parse_offset(&self.tz_offset) {
            errors.push(e);
        }

        if let Some(dir) = &self.lookup_dir
            && !dir.is_dir()
        {
            errors.push(format!("Lookup directory {} does not exist", dir.display()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Returns true if references should be followed.
    pub fn chaining(&self) -> bool {
        !self.no_chain && self.lookup_dir.is_some()
    }

    /// Builds the library configuration.
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            base_url: self.base_url.clone(),
            chaining_enabled: self.chaining(),
            max_chain_depth: self.max_chain_depth,
            default_timezone_offset: self.tz_offset.clone(),
            lookup_concurrency: self.concurrency,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CliConfig::try_parse_from(["hfs-index", "data"]).unwrap();
        assert_eq!(config.inputs, vec![PathBuf::from("data")]);
        assert_eq!(config.max_chain_depth, 1);
        assert!(!config.chaining());
        assert!(config.validate().is_ok());

        let indexer = config.indexer_config();
        assert!(!indexer.chaining_enabled);
        assert!(indexer.validate().is_ok());
    }

    #[test]
    fn test_negative_offset_and_schemas() {
        let config = CliConfig::try_parse_from([
            "hfs-index",
            "--tz-offset",
            "-05:00",
            "--schema",
            "a.json,b.json",
            "in.json",
        ])
        .unwrap();
        assert_eq!(config.tz_offset, "-05:00");
        assert_eq!(config.schema.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let config = CliConfig::try_parse_from([
            "hfs-index",
            "--concurrency",
            "0",
            "--tz-offset",
            "EST",
            "--lookup-dir",
            "/nonexistent/lookup",
            "in.json",
        ])
        .unwrap();
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_chaining_with_lookup_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::try_parse_from([
            "hfs-index".into(),
            "--lookup-dir".into(),
            dir.path().as_os_str().to_owned(),
            "in.json".into(),
        ] as [std::ffi::OsString; 4])
        .unwrap();
        assert!(config.chaining());
        assert!(config.indexer_config().chaining_enabled);
    }

    #[test]
    fn test_requires_input() {
        assert!(CliConfig::try_parse_from(["hfs-index"]).is_err());
    }
}
