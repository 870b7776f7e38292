//! Configuration System
//!
//! Loads runtime tuning for the coercion policy, DSL/projection size limits,
//! and logging, merged in order from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (`FILTERQL_*` prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [coercion]
//! null_value_policy = "coerce_to_is_null"
//! enum_match_mode = "case_insensitive"
//! string_case_strategy = "none"
//!
//! [limits]
//! max_dsl_length = 4096
//! max_projection_page_size = 10000
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! FILTERQL_COERCION__NULL_VALUE_POLICY=strict
//! FILTERQL_LIMITS__MAX_DSL_LENGTH=2048
//! ```

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::coerce::{CoercionPolicy, EnumMatchMode, NullValuePolicy, StringCaseStrategy};
use crate::projection::MAX_PROJECTION_PAGE_SIZE;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub coercion: CoercionConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Mirrors [`CoercionPolicy`] (spec.md §4.2) for on-disk/env representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoercionConfig {
    pub null_value_policy: NullValuePolicy,
    pub enum_match_mode: EnumMatchMode,
    pub string_case_strategy: StringCaseStrategy,
}

impl Default for CoercionConfig {
    fn default() -> Self {
        let policy = CoercionPolicy::default();
        CoercionConfig {
            null_value_policy: policy.null_value_policy,
            enum_match_mode: policy.enum_match_mode,
            string_case_strategy: policy.string_case_strategy,
        }
    }
}

impl CoercionConfig {
    pub fn to_policy(&self) -> CoercionPolicy {
        CoercionPolicy {
            null_value_policy: self.null_value_policy,
            enum_match_mode: self.enum_match_mode,
            string_case_strategy: self.string_case_strategy,
        }
    }
}

/// DSL and projection size limits (spec.md §6 `maxDslLength`/`maxProjectionPageSize`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_dsl_length: usize,
    pub max_projection_page_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_dsl_length: 4096,
            max_projection_page_size: MAX_PROJECTION_PAGE_SIZE,
        }
    }
}

/// Logging configuration consumed by [`crate::telemetry::init`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (text, json).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            coercion: CoercionConfig::default(),
            limits: LimitsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (`FILTERQL_*` prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("FILTERQL_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("FILTERQL_").split("__"))
            .extract()
    }
}
