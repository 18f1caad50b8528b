//! ステージ結果のタグ付け
//!
//! 各ステージは失敗しても値を返す。Degradedは代替値と理由を持つ。

use std::fmt;
use std::time::Duration;

use crate::providers::ProviderError;

/// ステージ名（ログ用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vision,
    Search,
    Synthesis,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Vision => "vision",
            Stage::Search => "search",
            Stage::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 代替値に切り替えた理由
#[derive(Debug)]
pub enum DegradeReason {
    Timeout(Duration),
    Provider(ProviderError),
    Unparseable(String),
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::Timeout(limit) => write!(f, "timed out after {}ms", limit.as_millis()),
            DegradeReason::Provider(err) => write!(f, "provider error: {}", err),
            DegradeReason::Unparseable(msg) => write!(f, "unparseable response: {}", msg),
        }
    }
}

/// ステージの出力
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// プロバイダの結果をそのまま使用
    Fresh(T),
    /// 既定値・定型値で代替
    Degraded { value: T, reason: DegradeReason },
}

impl<T> StageOutcome<T> {
    pub fn degraded(value: T, reason: DegradeReason) -> Self {
        StageOutcome::Degraded { value, reason }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Fresh(value) => value,
            StageOutcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            StageOutcome::Fresh(value) => value,
            StageOutcome::Degraded { value, .. } => value,
        }
    }

    pub fn reason(&self) -> Option<&DegradeReason> {
        match self {
            StageOutcome::Fresh(_) => None,
            StageOutcome::Degraded { reason, .. } => Some(reason),
        }
    }
}
