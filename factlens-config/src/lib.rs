//! Loader for workspace configuration with YAML + environment overlays.
//!
//! Sources are merged in order: YAML file(s)/snippets, then `FACTLENS_`
//! prefixed environment variables (`__` as the nesting separator), then
//! recursive `${VAR}` expansion inside string values. Every field has a
//! default so a missing config file yields a usable configuration.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Top-level configuration for the extraction engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FactlensConfig {
    pub version: Option<String>,
    pub browser: BrowserConfig,
    pub images: ImageConfig,
    pub analysis: AnalysisConfig,
}

impl Default for FactlensConfig {
    fn default() -> Self {
        Self {
            version: None,
            browser: BrowserConfig::default(),
            images: ImageConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

/// Settings for the rendering sessions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver endpoint the session factory connects to.
    pub webdriver_url: String,
    pub headless: bool,
    /// Hosts mapped to NXDOMAIN inside the session. These are analytics and
    /// NAT-traversal endpoints whose long-lived connections keep the load
    /// spinner alive on otherwise finished pages.
    pub blocked_hosts: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            headless: true,
            blocked_hosts: vec![
                "mmstat.com".into(),
                "*.mmstat.com".into(),
                "stun.l.google.com".into(),
                "*.g.doubleclick.net".into(),
            ],
        }
    }
}

/// Settings for the image-selection pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Hostname substrings whose images are dropped (ad/tracking hosts).
    pub blocked_domains: Vec<String>,
    /// Lowercase file extensions that never qualify as article photos.
    pub blocked_formats: Vec<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            blocked_domains: vec![
                "adserver.com".into(),
                "example-blocked.com".into(),
                "doubleclick.net".into(),
            ],
            blocked_formats: vec!["gif".into(), "svg".into()],
        }
    }
}

/// Settings for the external authenticity-analysis service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub endpoint: Option<String>,
    pub auth_token: Option<String>,
    /// Concurrent in-flight analysis calls.
    pub pool_size: usize,
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            auth_token: None,
            pool_size: 2,
            timeout_secs: 120,
            max_attempts: 3,
        }
    }
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct FactlensConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for FactlensConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl FactlensConfigLoader {
    /// Start with sensible defaults: `FACTLENS_` env overrides only.
    ///
    /// ```
    /// use factlens_config::FactlensConfigLoader;
    ///
    /// let config = FactlensConfigLoader::new().load().expect("defaults load");
    /// assert_eq!(config.browser.webdriver_url, "http://localhost:9515");
    /// assert_eq!(config.analysis.pool_size, 2);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a config file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self.builder.add_source(File::from(path.as_ref()));
        self
    }

    /// Merge an inline YAML snippet (tests, CLI overrides).
    ///
    /// ```
    /// use factlens_config::FactlensConfigLoader;
    ///
    /// let cfg = FactlensConfigLoader::new()
    ///     .with_yaml_str("browser:\n  headless: false")
    ///     .load()
    ///     .unwrap();
    /// assert!(!cfg.browser.headless);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    pub fn load(self) -> Result<FactlensConfig, ConfigError> {
        // The env source merges last so `FACTLENS_` variables override file
        // values. `try_parsing` keeps booleans and numbers typed.
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("FACTLENS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // Round-trip through serde_json::Value so `${VAR}` placeholders can
        // be expanded before the typed deserialize.
        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FL_HOST", Some("example.org"), || {
            let mut v = json!("https://${FL_HOST}/analyze");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("https://example.org/analyze"));
        });
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("A", Some("ads")), ("B", Some("cdn"))], || {
            let mut v = json!([
                "block-$A",
                { "hosts": "${A}.${B}.example" },
                7,
                false,
                null
            ]);
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!(["block-ads", { "hosts": "ads.cdn.example" }, 7, false, null])
            );
        });
    }

    #[test]
    fn expands_recursively_across_env_values() {
        temp_env::with_vars(
            [
                ("INNER", Some("token")),
                ("MID", Some("x-${INNER}")),
                ("OUTER", Some("v-${MID}")),
            ],
            || {
                let mut v = json!("${OUTER}");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("v-x-token"));
            },
        );
    }

    #[test]
    fn stops_on_env_cycles() {
        temp_env::with_vars([("P", Some("${Q}")), ("Q", Some("${P}"))], || {
            let mut v = json!("pre-${P}-post");
            // Only termination matters; the cycle leaves a placeholder behind.
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("pre-") && s.ends_with("-post"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("x-${FACTLENS_NO_SUCH_VAR}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("x-${FACTLENS_NO_SUCH_VAR}"));
    }
}
