//! スキャン履歴モジュール
//!
//! 査定結果をリクエスト元IDごとにJSONファイルへ保存する。
//! パイプライン自体は履歴を参照しない（呼び出し側が記録する）。

mod quota;

pub use quota::{FreeScanQuota, QuotaReservation, ScanQuota};

use crate::error::{AppraiserError, Result};
use crate::scanner::image_digest;
use appraiser_common::AppraisalResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

const HISTORY_FILE_NAME: &str = "scan-history.json";

/// 一覧取得時の既定件数
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// 保存されるスキャン1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: String,
    pub requester_id: String,
    pub timestamp: DateTime<Utc>,
    pub image_sha256: String,
    pub result: AppraisalResult,
}

impl ScanRecord {
    pub fn new(requester_id: &str, image: &[u8], result: AppraisalResult) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            requester_id: requester_id.to_string(),
            timestamp: Utc::now(),
            image_sha256: image_digest(image),
            result,
        }
    }
}

/// 履歴の保存先
pub trait ScanHistory: Send + Sync {
    fn record(&self, record: ScanRecord) -> Result<()>;

    /// 新しい順
    fn list(&self, requester_id: &str, limit: usize) -> Result<Vec<ScanRecord>>;

    fn get(&self, id: &str) -> Result<Option<ScanRecord>>;

    fn count_for(&self, requester_id: &str) -> Result<usize>;
}

/// 履歴ファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryFile {
    /// バージョン（互換性チェック用）
    version: u32,
    scans: Vec<ScanRecord>,
}

impl HistoryFile {
    const CURRENT_VERSION: u32 = 1;

    pub fn history_path(folder: &Path) -> PathBuf {
        folder.join(HISTORY_FILE_NAME)
    }

    /// 履歴ファイルを読み込み（無ければ空）
    pub fn load(folder: &Path) -> Result<Self> {
        let path = Self::history_path(folder);
        if !path.exists() {
            return Ok(Self::default());
        }

        let reader = BufReader::new(File::open(&path)?);
        let file: HistoryFile = serde_json::from_reader(reader)
            .map_err(|e| AppraiserError::History(format!("{}: {}", path.display(), e)))?;

        // バージョンチェック
        if file.version != Self::CURRENT_VERSION {
            return Err(AppraiserError::History(format!(
                "未対応の履歴バージョン: {}",
                file.version
            )));
        }
        Ok(file)
    }

    /// 履歴ファイルを保存（一時ファイル経由で置き換え）
    pub fn save(&self, folder: &Path) -> Result<()> {
        std::fs::create_dir_all(folder)?;
        let path = Self::history_path(folder);
        let tmp = path.with_extension("json.tmp");

        let writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(writer, self)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }
}

impl Default for HistoryFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            scans: Vec::new(),
        }
    }
}

/// JSONファイルによる履歴ストア
pub struct JsonHistoryStore {
    folder: PathBuf,
    state: Mutex<HistoryFile>,
}

impl JsonHistoryStore {
    pub fn open(folder: &Path) -> Result<Self> {
        let state = HistoryFile::load(folder)?;
        Ok(Self {
            folder: folder.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> PathBuf {
        HistoryFile::history_path(&self.folder)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut HistoryFile) -> Result<T>) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AppraiserError::History("履歴のロックに失敗".into()))?;
        f(&mut state)
    }
}

impl ScanHistory for JsonHistoryStore {
    fn record(&self, record: ScanRecord) -> Result<()> {
        self.with_state(|state| {
            state.scans.push(record);
            if let Err(e) = state.save(&self.folder) {
                // 保存に失敗した記録はメモリからも外す
                state.scans.pop();
                warn!(error = %e, "failed to persist scan history");
                return Err(e);
            }
            Ok(())
        })
    }

    fn list(&self, requester_id: &str, limit: usize) -> Result<Vec<ScanRecord>> {
        self.with_state(|state| {
            let mut scans: Vec<ScanRecord> = state
                .scans
                .iter()
                .filter(|s| s.requester_id == requester_id)
                .cloned()
                .collect();
            scans.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            scans.truncate(limit);
            Ok(scans)
        })
    }

    fn get(&self, id: &str) -> Result<Option<ScanRecord>> {
        self.with_state(|state| Ok(state.scans.iter().find(|s| s.id == id).cloned()))
    }

    fn count_for(&self, requester_id: &str) -> Result<usize> {
        self.with_state(|state| {
            Ok(state
                .scans
                .iter()
                .filter(|s| s.requester_id == requester_id)
                .count())
        })
    }
}
