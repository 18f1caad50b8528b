//! 査定パイプラインの型定義
//!
//! CLIとHTTPフロントエンドで共有される型:
//! - ScanRequest: 1回の査定リクエスト
//! - VisionFindings: Stage1（画像認識）の出力
//! - MarketSearchResult: Stage2（マーケット検索）の出力
//! - AppraisalResult: 最終出力（Stage3の結果 + Stage1/2の記録）

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Stage1でラベルが取れなかった場合のprimary_label
pub const UNKNOWN_ITEM: &str = "unknown item";

/// ヒント文字列の最大長（文字数）
pub const MAX_HINT_CHARS: usize = 200;

/// 価格表示に使う地域情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locale {
    pub country_code: String,
    pub currency_code: String,
}

impl Locale {
    /// 国コード・通貨コードは大文字に正規化、空ならUS/USD
    pub fn new(country_code: &str, currency_code: &str) -> Self {
        let country = country_code.trim().to_uppercase();
        let currency = currency_code.trim().to_uppercase();
        Self {
            country_code: if country.is_empty() { "US".into() } else { country },
            currency_code: if currency.is_empty() { "USD".into() } else { currency },
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::new("US", "USD")
    }
}

/// 査定リクエスト
///
/// `new` は入力検証を行う。画像が空、またはリクエスト元IDが無い場合は
/// ネットワーク呼び出し前に `Error::InvalidInput` で失敗する。
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub image: Vec<u8>,
    pub locale: Locale,
    pub hint: Option<String>,
    pub requester_id: String,
}

impl ScanRequest {
    pub fn new(
        image: Vec<u8>,
        locale: Locale,
        hint: Option<&str>,
        requester_id: &str,
    ) -> Result<Self> {
        if image.is_empty() {
            return Err(Error::InvalidInput("image is required".into()));
        }
        let requester_id = requester_id.trim();
        if requester_id.is_empty() {
            return Err(Error::InvalidInput("requesterId is required".into()));
        }

        Ok(Self {
            image,
            locale,
            hint: hint.and_then(normalize_hint),
            requester_id: requester_id.to_string(),
        })
    }
}

/// 前後の空白を除去し、200文字で切り詰める。空白のみならNone
pub fn normalize_hint(hint: &str) -> Option<String> {
    let trimmed = hint.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_HINT_CHARS).collect::<String>().trim_end().to_string())
}

/// Stage1の出力: 画像認識で得られたラベルとテキスト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisionFindings {
    /// 物体ラベル（プロバイダの順位順、最大5件）
    pub object_labels: Vec<String>,
    /// OCRテキスト（最大3件）
    pub ocr_snippets: Vec<String>,
    pub primary_label: String,
}

impl VisionFindings {
    pub const MAX_LABELS: usize = 5;
    pub const MAX_SNIPPETS: usize = 3;

    /// 件数上限を適用し、primary_labelを決定
    pub fn from_detections(labels: Vec<String>, texts: Vec<String>) -> Self {
        let object_labels: Vec<String> = labels
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .take(Self::MAX_LABELS)
            .collect();
        let ocr_snippets: Vec<String> = texts
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .take(Self::MAX_SNIPPETS)
            .collect();
        let primary_label = object_labels
            .first()
            .cloned()
            .unwrap_or_else(|| UNKNOWN_ITEM.to_string());

        Self {
            object_labels,
            ocr_snippets,
            primary_label,
        }
    }

    /// 実際にラベルが検出されたか（プレースホルダでないか）
    pub fn has_detected_label(&self) -> bool {
        !self.object_labels.is_empty()
    }
}

impl Default for VisionFindings {
    fn default() -> Self {
        Self {
            object_labels: Vec::new(),
            ocr_snippets: Vec::new(),
            primary_label: UNKNOWN_ITEM.to_string(),
        }
    }
}

/// 類似出品1件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Listing {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Stage2の出力: マーケット検索結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketSearchResult {
    /// 実際に発行したクエリ（地域修飾語を含む）
    pub query_used: String,
    pub listings: Vec<Listing>,
}

impl MarketSearchResult {
    pub const MAX_LISTINGS: usize = 5;

    pub fn new(query_used: String, mut listings: Vec<Listing>) -> Self {
        listings.truncate(Self::MAX_LISTINGS);
        Self { query_used, listings }
    }

    /// 検索失敗時: 試行したクエリだけを残す
    pub fn empty(query_used: String) -> Self {
        Self {
            query_used,
            listings: Vec::new(),
        }
    }
}

/// 出品下書き
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
}

/// Stage3の出力: 生成AIによる査定部分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Synthesis {
    pub item_name: String,
    /// 通貨付きの価格帯文字列
    pub estimated_value: String,
    /// 0〜100
    pub confidence_score: u8,
    #[serde(rename = "aiAnalysis", alias = "analysisText")]
    pub analysis_text: String,
    pub listing_draft: ListingDraft,
}

/// 最終出力: 査定結果 + 各ステージの記録
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppraisalResult {
    pub item_name: String,
    pub estimated_value: String,
    pub confidence_score: u8,
    #[serde(rename = "aiAnalysis", alias = "analysisText")]
    pub analysis_text: String,
    pub listing_draft: ListingDraft,

    /// Stage1の生データ
    #[serde(default)]
    pub vision_response: VisionFindings,

    /// Stage2の生データ
    #[serde(default)]
    pub search_response: MarketSearchResult,
}

impl AppraisalResult {
    /// Stage3の結果にStage1/2の記録を添付
    pub fn assemble(
        synthesis: Synthesis,
        vision: VisionFindings,
        search: MarketSearchResult,
    ) -> Self {
        Self {
            item_name: synthesis.item_name,
            estimated_value: synthesis.estimated_value,
            confidence_score: synthesis.confidence_score.min(100),
            analysis_text: synthesis.analysis_text,
            listing_draft: synthesis.listing_draft,
            vision_response: vision,
            search_response: search,
        }
    }
}
