//! 外部サービス連携モジュール
//!
//! パイプラインが依存する3種類の外部サービスをトレイトとして定義する:
//! - VisionProvider: 物体ラベル検出・テキスト検出
//! - SearchProvider: Web検索
//! - GenerativeProvider: テキスト生成
//!
//! ここでのエラーはパイプラインの外へは出ない（各ステージで吸収される）。

mod custom_search;
mod gemini;
mod google_vision;

pub use custom_search::CustomSearchProvider;
pub use gemini::GeminiProvider;
pub use google_vision::GoogleVisionProvider;

use appraiser_common::Listing;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// 外部サービス呼び出しのエラー
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider}: APIキーが設定されていません")]
    MissingApiKey { provider: &'static str },

    #[error("通信エラー: {0}")]
    Network(String),

    #[error("APIエラー (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("レート制限中です")]
    RateLimited,

    #[error("レスポンスのパースに失敗: {0}")]
    Parse(String),

    #[error("空のレスポンス")]
    EmptyResponse,
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(err.to_string())
    }
}

/// 画像認識サービス
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// 物体ラベルを順位順に返す
    async fn detect_labels(&self, image: &[u8], max_results: usize)
        -> Result<Vec<String>, ProviderError>;

    /// 検出テキストブロックを順に返す
    async fn detect_text(&self, image: &[u8], max_results: usize)
        -> Result<Vec<String>, ProviderError>;

    fn name(&self) -> &'static str;
}

/// Web検索サービス
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// 欠損フィールドは空文字で返すこと
    async fn search(&self, query: &str, num_results: usize)
        -> Result<Vec<Listing>, ProviderError>;

    fn name(&self) -> &'static str;
}

/// テキスト生成サービス
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    fn name(&self) -> &'static str;
}

/// 外部API用HTTPクライアント（全体のタイムアウトはパイプライン側で管理）
pub(crate) fn http_client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// 資格情報が空ならMissingApiKey
pub(crate) fn require_key<'a>(
    key: &'a Option<String>,
    provider: &'static str,
) -> Result<&'a str, ProviderError> {
    key.as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(ProviderError::MissingApiKey { provider })
}

/// 非2xxレスポンスをエラーに変換
pub(crate) async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited);
    }

    let message = response.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        status: status.as_u16(),
        message: truncate_message(&message),
    })
}

/// エラーボディはログ用に先頭だけ残す
fn truncate_message(message: &str) -> String {
    const MAX_CHARS: usize = 300;
    if message.chars().count() <= MAX_CHARS {
        message.to_string()
    } else {
        let head: String = message.chars().take(MAX_CHARS).collect();
        format!("{}…", head)
    }
}
