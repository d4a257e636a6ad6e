use crate::utils::error::{EstatError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_ESTAT_BASE_URL: &str = "https://api.e-stat.go.jp/rest/3.0/app";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// e-Stat の1リクエストあたり最大取得件数
pub const ESTAT_MAX_PAGE_SIZE: usize = 100_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub estat: EstatSettings,
    pub storage: StorageSettings,
    pub ollama: OllamaSettings,
    pub translator: TranslatorSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstatSettings {
    pub app_id: Option<String>,
    pub base_url: String,
    pub lang: String,
    pub timeout_seconds: u64,
    pub page_size: usize,
    pub max_records: usize,
}

impl Default for EstatSettings {
    fn default() -> Self {
        Self {
            app_id: None,
            base_url: DEFAULT_ESTAT_BASE_URL.to_string(),
            lang: "J".to_string(),
            timeout_seconds: 60,
            page_size: 10_000,
            max_records: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: String,
    pub catalog_dir: String,
    pub output_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: "data/mcp".to_string(),
            catalog_dir: "estat_catalog".to_string(),
            output_dir: "output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            model: "llama3.2".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorSettings {
    pub result_limit: usize,
    /// Year used for cdTime when a query asks for the latest data.
    pub latest_year: u16,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            result_limit: 5,
            latest_year: 2024,
        }
    }
}

impl Settings {
    /// 設定を読み込む: 既定値 → TOML ファイル → 環境変数
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EstatError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// `${VAR_NAME}` を環境変数で置換する。未定義の変数はそのまま残す。
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EstatError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    fn apply_env(&mut self) {
        let app_id_missing = self
            .estat
            .app_id
            .as_deref()
            .map_or(true, |id| id.trim().is_empty() || id.starts_with("${"));
        if app_id_missing {
            self.estat.app_id = std::env::var("ESTAT_APPID").ok().filter(|v| !v.is_empty());
        }
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            self.ollama.base_url = url;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            self.ollama.model = model;
        }
    }

    pub fn require_app_id(&self) -> Result<&str> {
        let app_id = validation::validate_required_field("estat.app_id", &self.estat.app_id)?;
        validation::validate_non_empty_string("estat.app_id", app_id)?;
        Ok(app_id)
    }

    pub fn index_db_path(&self) -> PathBuf {
        Path::new(&self.storage.data_dir).join("catalog_index.db")
    }

    pub fn metadata_db_path(&self) -> PathBuf {
        Path::new(&self.storage.data_dir).join("estat_metadata.db")
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_url("estat.base_url", &self.estat.base_url)?;
        validation::validate_range(
            "estat.page_size",
            self.estat.page_size,
            1,
            ESTAT_MAX_PAGE_SIZE,
        )?;
        validation::validate_positive_number("estat.max_records", self.estat.max_records, 1)?;
        validation::validate_positive_number(
            "estat.timeout_seconds",
            self.estat.timeout_seconds as usize,
            1,
        )?;
        validation::validate_path("storage.data_dir", &self.storage.data_dir)?;
        validation::validate_path("storage.catalog_dir", &self.storage.catalog_dir)?;
        validation::validate_path("storage.output_dir", &self.storage.output_dir)?;
        if self.ollama.enabled {
            validation::validate_url("ollama.base_url", &self.ollama.base_url)?;
            validation::validate_non_empty_string("ollama.model", &self.ollama.model)?;
        }
        validation::validate_positive_number(
            "translator.result_limit",
            self.translator.result_limit,
            1,
        )?;
        validation::validate_range("translator.latest_year", self.translator.latest_year, 1900, 2100)?;
        Ok(())
    }
}
