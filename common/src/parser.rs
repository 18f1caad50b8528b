//! 生成AIレスポンスパーサー
//!
//! Stage3のレスポンス文字列からコードフェンスを除去し、
//! 査定JSONオブジェクトをパースする。
//! フォールバックはここでの1種類のパース失敗だけで判定する。

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{ListingDraft, Synthesis};

const FENCE: &str = "```";

lazy_static! {
    /// 開きフェンス（言語タグと改行まで）
    static ref OPENING_FENCE: Regex =
        Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?").expect("valid regex");
}

/// レスポンスからコードフェンスを除去
///
/// 本文がJSONで始まっていればそのまま（値の中のバッククォートは触らない）。
/// そうでなければ最初の開きフェンスから最後の閉じフェンスまでの内側を返す。
/// フェンスが無ければ全体をtrimして返す。
///
/// # Examples
/// ```
/// use appraiser_common::strip_code_fences;
///
/// assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
/// assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
/// assert_eq!(strip_code_fences("{\"a\": \"```x```\"}"), "{\"a\": \"```x```\"}");
/// ```
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }
    let Some(open) = trimmed.find(FENCE) else {
        return trimmed;
    };

    let fenced = &trimmed[open..];
    let body = match OPENING_FENCE.find(fenced) {
        Some(m) => &fenced[m.end()..],
        None => &fenced[FENCE.len()..],
    };
    let inner = match body.rfind(FENCE) {
        Some(close) => &body[..close],
        None => body,
    };
    inner.trim()
}

/// モデル出力の生の形（欠損・型揺れを許容）
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSynthesis {
    item_name: Option<String>,
    estimated_value: Option<Value>,
    confidence_score: Option<Value>,
    #[serde(alias = "analysisText")]
    ai_analysis: Option<String>,
    listing_draft: Option<RawListingDraft>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawListingDraft {
    title: Option<String>,
    description: Option<String>,
}

/// Stage3レスポンスをパース
///
/// # Arguments
/// * `response` - 生成AIの出力テキスト
///
/// # Returns
/// * `Ok(Synthesis)` - JSONオブジェクトとして解釈できた
/// * `Err(Error::Parse)` - フェンス除去後もJSONオブジェクトでない
pub fn parse_synthesis_response(response: &str) -> Result<Synthesis> {
    let payload = strip_code_fences(response);
    if payload.is_empty() {
        return Err(Error::Parse("empty response".into()));
    }

    let value: Value = serde_json::from_str(payload)
        .map_err(|e| Error::Parse(format!("synthesis JSON parse error: {}", e)))?;
    if !value.is_object() {
        return Err(Error::Parse("synthesis payload is not a JSON object".into()));
    }

    let raw: RawSynthesis = serde_json::from_value(value)
        .map_err(|e| Error::Parse(format!("synthesis schema mismatch: {}", e)))?;
    let draft = raw.listing_draft.unwrap_or_default();

    Ok(Synthesis {
        item_name: non_empty_or(raw.item_name, "Unknown Item"),
        estimated_value: non_empty_or(
            raw.estimated_value.as_ref().and_then(text_from_value),
            "Unknown",
        ),
        confidence_score: raw.confidence_score.as_ref().map(confidence_from_value).unwrap_or(0),
        analysis_text: non_empty_or(raw.ai_analysis, "No analysis available"),
        listing_draft: ListingDraft {
            title: draft.title.unwrap_or_default(),
            description: draft.description.unwrap_or_default(),
        },
    })
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// 文字列・数値をテキストとして取り出す
fn text_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// confidenceScoreを0〜100に正規化（整数・小数・数値文字列を許容）
fn confidence_from_value(value: &Value) -> u8 {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    match score {
        Some(s) if s.is_finite() => s.round().clamp(0.0, 100.0) as u8,
        _ => 0,
    }
}
