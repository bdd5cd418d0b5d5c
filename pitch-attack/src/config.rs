use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use rusty_audiohash::{AttackConfig, Configuration, DEFAULT_BANK_OFFSET, DEFAULT_BANK_STEP, DEFAULT_MAX_OFFSET, DEFAULT_THRESHOLD};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub attack: AttackSection,
    #[serde(default)]
    pub trials: TrialsSection,
    #[serde(default)]
    pub analysis: AnalysisSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttackSection {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_max_offset")]
    pub max_offset: f64,
    #[serde(default = "default_bank_offset")]
    pub bank_offset: f64,
    #[serde(default = "default_bank_step")]
    pub bank_step: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrialsSection {
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Spectrogram parameters. An unset hop follows the frame duration with 31/32 overlap.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisSection {
    pub frame_duration: Option<f64>,
    pub hop_duration: Option<f64>,
    #[serde(default = "default_min_freq")]
    pub min_freq: f64,
    #[serde(default = "default_max_freq")]
    pub max_freq: f64,
}

impl Default for AttackSection {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_offset: default_max_offset(),
            bank_offset: default_bank_offset(),
            bank_step: default_bank_step(),
        }
    }
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            frame_duration: None,
            hop_duration: None,
            min_freq: default_min_freq(),
            max_freq: default_max_freq(),
        }
    }
}

impl Default for TrialsSection {
    fn default() -> Self {
        Self {
            count: default_count(),
            seed: None,
        }
    }
}

fn default_threshold() -> f64 { DEFAULT_THRESHOLD }
fn default_max_offset() -> f64 { DEFAULT_MAX_OFFSET }
fn default_bank_offset() -> f64 { DEFAULT_BANK_OFFSET }
fn default_bank_step() -> f64 { DEFAULT_BANK_STEP }
fn default_count() -> usize { 10 }
fn default_min_freq() -> f64 { 300.0 }
fn default_max_freq() -> f64 { 2000.0 }

impl ExperimentConfig {
    pub fn attack_config(&self) -> anyhow::Result<AttackConfig> {
        let config = AttackConfig::default()
            .with_threshold(self.attack.threshold)
            .with_max_offset(self.attack.max_offset)
            .with_bank(self.attack.bank_offset, self.attack.bank_step);
        config.validate().context("invalid [attack] section")?;
        Ok(config)
    }

    pub fn fingerprint_config(&self) -> Configuration {
        let mut config = Configuration::default();
        if let Some(seconds) = self.analysis.frame_duration {
            config = config.with_frame_duration(seconds);
            if self.analysis.hop_duration.is_none() {
                config = config.with_hop_duration(seconds / 32.0);
            }
        }
        if let Some(seconds) = self.analysis.hop_duration {
            config = config.with_hop_duration(seconds);
        }
        config.with_frequency_range(self.analysis.min_freq, self.analysis.max_freq)
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<ExperimentConfig> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
}
