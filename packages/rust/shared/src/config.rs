//! Application configuration for RecipeFinder.
//!
//! User config lives at `~/.recipefinder/recipefinder.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RecipeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "recipefinder.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".recipefinder";

// ---------------------------------------------------------------------------
// Config structs (matching recipefinder.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation service settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Document acquisition settings.
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Output and post-processing settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for interpret, judge and polish calls.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "DASHSCOPE_API_KEY".into()
}
fn default_base_url() -> String {
    "https://dashscope.aliyuncs.com/compatible-mode/v1".into()
}
fn default_model() -> String {
    "qwen-plus".into()
}
fn default_generation_timeout() -> u64 {
    60
}

/// `[acquisition]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Search page URL; `{query}` is replaced by the encoded search terms.
    #[serde(default = "default_search_url_template")]
    pub search_url_template: String,

    /// CSS selector for recipe links on the search results page.
    #[serde(default = "default_result_link_selector")]
    pub result_link_selector: String,

    /// How many documents to request per desired recipe.
    #[serde(default = "default_fetch_multiplier")]
    pub fetch_multiplier: u32,

    /// Minimum ms between detail-page requests.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_acquisition_timeout")]
    pub timeout_secs: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            search_url_template: default_search_url_template(),
            result_link_selector: default_result_link_selector(),
            fetch_multiplier: default_fetch_multiplier(),
            rate_limit_ms: default_rate_limit(),
            timeout_secs: default_acquisition_timeout(),
        }
    }
}

fn default_search_url_template() -> String {
    "https://www.douguo.com/search/recipe/{query}".into()
}
fn default_result_link_selector() -> String {
    "ul.cook-list li.clearfix a.cookname".into()
}
fn default_fetch_multiplier() -> u32 {
    5
}
fn default_rate_limit() -> u64 {
    500
}
fn default_acquisition_timeout() -> u64 {
    30
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for saved markdown files.
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Run the polish stage after rendering.
    #[serde(default = "default_true")]
    pub polish: bool,

    /// Save the rendered recipes as a markdown file.
    #[serde(default = "default_true")]
    pub save_markdown: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            polish: true,
            save_markdown: true,
        }
    }
}

fn default_output_dir() -> String {
    "output".into()
}
fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.recipefinder/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RecipeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.recipefinder/recipefinder.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RecipeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        RecipeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    if config.acquisition.fetch_multiplier == 0 {
        return Err(RecipeError::config(
            "acquisition.fetch_multiplier must be at least 1",
        ));
    }
    if !config.acquisition.search_url_template.contains("{query}") {
        return Err(RecipeError::config(
            "acquisition.search_url_template must contain a {query} placeholder",
        ));
    }

    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RecipeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RecipeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RecipeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the generation API key from the env var named in the config.
pub fn resolve_api_key(config: &GenerationConfig) -> Result<String> {
    let var_name = &config.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(RecipeError::config(format!(
            "generation API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the generation API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_api_key(&config.generation).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("search_url_template"));
        assert!(toml_str.contains("DASHSCOPE_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.acquisition.fetch_multiplier, 5);
        assert_eq!(parsed.generation.api_key_env, "DASHSCOPE_API_KEY");
        assert!(parsed.output.polish);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[generation]
model = "qwen-max"

[output]
polish = false
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.generation.model, "qwen-max");
        assert_eq!(config.generation.timeout_secs, 60);
        assert!(!config.output.polish);
        assert!(config.output.save_markdown);
        assert_eq!(config.acquisition.rate_limit_ms, 500);
    }

    #[test]
    fn load_rejects_template_without_placeholder() {
        let dir = std::env::temp_dir().join(format!("rf-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "[acquisition]\nsearch_url_template = \"https://example.com/search\"\n",
        )
        .unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("{query}"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.generation.api_key_env = "RF_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
