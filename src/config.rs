use crate::error::{AppraiserError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 環境変数名（保存済みのキーより優先）
pub const ENV_VISION_API_KEY: &str = "GOOGLE_VISION_API_KEY";
pub const ENV_SEARCH_API_KEY: &str = "GOOGLE_SEARCH_API_KEY";
pub const ENV_SEARCH_ENGINE_ID: &str = "GOOGLE_SEARCH_ENGINE_ID";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub vision_api_key: Option<String>,
    pub search_api_key: Option<String>,
    pub search_engine_id: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub vision_timeout_seconds: u64,
    pub search_timeout_seconds: u64,
    pub synthesis_timeout_seconds: u64,
    /// Noneなら無制限
    pub free_scan_limit: Option<usize>,
    /// スキャン履歴の保存先（未指定なら設定ディレクトリ）
    pub history_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vision_api_key: None,
            search_api_key: None,
            search_engine_id: None,
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".into(),
            vision_timeout_seconds: 15,
            search_timeout_seconds: 10,
            synthesis_timeout_seconds: 30,
            free_scan_limit: Some(5),
            history_dir: None,
        }
    }
}

impl Config {
    /// 設定ファイル + 環境変数
    pub fn load() -> Result<Self> {
        let stored = Self::load_stored()?;
        Ok(stored.with_env_overrides(|name| std::env::var(name).ok()))
    }

    /// 設定ファイルのみ（無ければ既定値）
    pub fn load_stored() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&config_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AppraiserError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("thrift-appraiser"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn history_dir(&self) -> Result<PathBuf> {
        match &self.history_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::config_dir(),
        }
    }

    /// 環境変数で資格情報を上書き（空文字は無視）
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_VISION_API_KEY) {
            self.vision_api_key = Some(key);
        }
        if let Some(key) = get(ENV_SEARCH_API_KEY) {
            self.search_api_key = Some(key);
        }
        if let Some(id) = get(ENV_SEARCH_ENGINE_ID) {
            self.search_engine_id = Some(id);
        }
        if let Some(key) = get(ENV_GEMINI_API_KEY) {
            self.gemini_api_key = Some(key);
        }
        self
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            vision_timeout: Duration::from_secs(self.vision_timeout_seconds.max(1)),
            search_timeout: Duration::from_secs(self.search_timeout_seconds.max(1)),
            synthesis_timeout: Duration::from_secs(self.synthesis_timeout_seconds.max(1)),
            ..PipelineConfig::default()
        }
    }
}

/// `config --set-*` で指定された資格情報
#[derive(Debug, Clone, Default)]
pub struct KeyUpdates {
    pub gemini_api_key: Option<String>,
    pub vision_api_key: Option<String>,
    pub search_api_key: Option<String>,
    pub search_engine_id: Option<String>,
}

impl KeyUpdates {
    pub fn is_empty(&self) -> bool {
        self.gemini_api_key.is_none()
            && self.vision_api_key.is_none()
            && self.search_api_key.is_none()
            && self.search_engine_id.is_none()
    }

    /// 指定された項目だけを上書き
    pub fn apply_to(self, config: &mut Config) {
        if let Some(key) = self.gemini_api_key {
            config.gemini_api_key = Some(key);
        }
        if let Some(key) = self.vision_api_key {
            config.vision_api_key = Some(key);
        }
        if let Some(key) = self.search_api_key {
            config.search_api_key = Some(key);
        }
        if let Some(id) = self.search_engine_id {
            config.search_engine_id = Some(id);
        }
    }
}

/// パイプライン構築時に渡す設定
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub vision_timeout: Duration,
    pub search_timeout: Duration,
    pub synthesis_timeout: Duration,
    pub max_search_results: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vision_timeout: Duration::from_secs(15),
            search_timeout: Duration::from_secs(10),
            synthesis_timeout: Duration::from_secs(30),
            max_search_results: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts_are_bounded() {
        let pipeline = Config::default().pipeline_config();
        assert_eq!(pipeline.vision_timeout, Duration::from_secs(15));
        assert_eq!(pipeline.search_timeout, Duration::from_secs(10));
        assert_eq!(pipeline.synthesis_timeout, Duration::from_secs(30));
        assert_eq!(pipeline.max_search_results, 5);
    }

    #[test]
    fn test_zero_timeout_is_raised_to_one_second() {
        let config = Config {
            search_timeout_seconds: 0,
            ..Config::default()
        };
        assert_eq!(config.pipeline_config().search_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_env_overrides_stored_keys() {
        let config = Config {
            gemini_api_key: Some("stored".into()),
            vision_api_key: Some("stored-vision".into()),
            ..Config::default()
        };

        let config = config.with_env_overrides(|name| match name {
            ENV_GEMINI_API_KEY => Some("from-env".into()),
            ENV_VISION_API_KEY => Some("  ".into()),
            ENV_SEARCH_ENGINE_ID => Some("cx-123".into()),
            _ => None,
        });

        assert_eq!(config.gemini_api_key.as_deref(), Some("from-env"));
        assert_eq!(config.vision_api_key.as_deref(), Some("stored-vision"));
        assert_eq!(config.search_engine_id.as_deref(), Some("cx-123"));
        assert!(config.search_api_key.is_none());
    }

    #[test]
    fn test_config_deserialize_partial() {
        let config: Config = serde_json::from_str(r#"{"geminiModel": "gemini-1.5-pro"}"#).unwrap();
        assert_eq!(config.gemini_model, "gemini-1.5-pro");
        assert_eq!(config.free_scan_limit, Some(5));
        assert_eq!(config.vision_timeout_seconds, 15);
    }

    #[test]
    fn test_key_updates_apply_only_given_fields() {
        let mut stored = Config {
            vision_api_key: Some("old-vision".into()),
            ..Config::default()
        };
        let updates = KeyUpdates {
            gemini_api_key: Some("new-gemini".into()),
            ..KeyUpdates::default()
        };
        assert!(!updates.is_empty());
        assert!(KeyUpdates::default().is_empty());

        updates.apply_to(&mut stored);
        assert_eq!(stored.gemini_api_key.as_deref(), Some("new-gemini"));
        assert_eq!(stored.vision_api_key.as_deref(), Some("old-vision"));
        assert!(stored.search_api_key.is_none());
    }

    #[test]
    fn test_saved_keys_visible_after_reload() {
        // 保存内容を読み直した値（環境変数の上書き込み）が表示に使われる
        let mut stored = Config::default();
        KeyUpdates {
            gemini_api_key: Some("new-gemini".into()),
            ..KeyUpdates::default()
        }
        .apply_to(&mut stored);

        let json = serde_json::to_string(&stored).unwrap();
        let reloaded: Config = serde_json::from_str(&json).unwrap();
        let effective = reloaded.with_env_overrides(|_| None);

        assert_eq!(effective.gemini_api_key.as_deref(), Some("new-gemini"));
    }
}
