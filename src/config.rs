//! Optional YAML settings shared by the subcommands.
//!
//! ```yaml
//! terms: hp_labels.tsv
//! mining:
//!   delimiters: [";", "\n", ","]
//!   not_applicable: ["na", "n/a", "?"]
//! ```

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

use crate::mining::MiningOptions;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EtlConfig {
    /// Term list used when a command is not given `--terms`. Relative paths
    /// resolve against the config file's directory.
    pub terms: Option<PathBuf>,
    pub mining: MiningOptions,
}

impl EtlConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let mut file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let mut raw = String::new();
        file.read_to_string(&mut raw)
            .with_context(|| format!("Reading config file {path:?}"))?;
        let mut config: EtlConfig =
            serde_yaml::from_str(&raw).with_context(|| format!("Parsing config file {path:?}"))?;
        if let Some(terms) = config.terms.as_mut()
            && terms.is_relative()
            && let Some(parent) = path.parent()
        {
            *terms = parent.join(&*terms);
        }
        config.mining.normalize();
        debug!("Loaded config from {path:?}: {config:?}");
        Ok(config)
    }

    /// Defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("phenoetl.yml");
        std::fs::write(&path, "terms: labels.tsv\n").unwrap();

        let config = EtlConfig::load(&path).unwrap();
        assert_eq!(config.terms, Some(dir.path().join("labels.tsv")));
        assert_eq!(config.mining, MiningOptions::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("phenoetl.yml");
        std::fs::write(&path, "mystery: 1\n").unwrap();
        assert!(EtlConfig::load(&path).is_err());
    }

    #[test]
    fn not_applicable_tokens_are_lowercased() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("phenoetl.yml");
        std::fs::write(&path, "mining:\n  not_applicable: [\" NA \", Unknown]\n").unwrap();
        let config = EtlConfig::load(&path).unwrap();
        assert_eq!(config.mining.not_applicable, vec!["na", "unknown"]);
    }
}
