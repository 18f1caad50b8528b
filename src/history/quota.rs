//! 無料スキャン回数の判定
//!
//! 判定から履歴記録までの間は枠を予約しておき、同じリクエスト元の
//! 同時リクエストが上限を超えて通らないようにする。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::ScanHistory;
use crate::error::{AppraiserError, Result};

type PendingScans = Arc<Mutex<HashMap<String, usize>>>;

/// パイプライン実行前に呼び出し側が枠を予約する
pub trait ScanQuota: Send + Sync {
    /// 返された予約は履歴に記録し終えるまで保持すること
    fn reserve(&self, requester_id: &str) -> Result<QuotaReservation>;
}

/// 実行中スキャン1件分の予約（drop で解放）
#[derive(Debug)]
pub struct QuotaReservation {
    pending: Option<PendingScans>,
    requester_id: String,
}

impl QuotaReservation {
    /// 上限なしの場合の予約（何も保持しない）
    pub fn unlimited(requester_id: &str) -> Self {
        Self {
            pending: None,
            requester_id: requester_id.to_string(),
        }
    }
}

impl Drop for QuotaReservation {
    fn drop(&mut self) {
        let Some(pending) = &self.pending else {
            return;
        };
        let Ok(mut map) = pending.lock() else {
            return;
        };
        if let Some(count) = map.get_mut(&self.requester_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                map.remove(&self.requester_id);
            }
        }
    }
}

/// 履歴件数 + 実行中件数で判定する無料枠（limitがNoneなら無制限）
pub struct FreeScanQuota {
    history: Arc<dyn ScanHistory>,
    limit: Option<usize>,
    pending: PendingScans,
}

impl FreeScanQuota {
    pub const DEFAULT_LIMIT: usize = 5;

    pub fn new(history: Arc<dyn ScanHistory>, limit: Option<usize>) -> Self {
        Self {
            history,
            limit,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 実行中（未記録）の件数
    pub fn in_flight(&self, requester_id: &str) -> usize {
        self.pending
            .lock()
            .map(|map| map.get(requester_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl ScanQuota for FreeScanQuota {
    fn reserve(&self, requester_id: &str) -> Result<QuotaReservation> {
        let Some(limit) = self.limit else {
            return Ok(QuotaReservation::unlimited(requester_id));
        };

        let mut pending = self
            .pending
            .lock()
            .map_err(|_| AppraiserError::History("無料枠のロックに失敗".into()))?;
        let in_flight = pending.get(requester_id).copied().unwrap_or(0);
        let used = self.history.count_for(requester_id)? + in_flight;
        if used >= limit {
            return Err(AppraiserError::QuotaExceeded { used, limit });
        }

        *pending.entry(requester_id.to_string()).or_insert(0) += 1;
        Ok(QuotaReservation {
            pending: Some(self.pending.clone()),
            requester_id: requester_id.to_string(),
        })
    }
}
