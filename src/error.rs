use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppraiserError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("入力が不正です: {0}")]
    InvalidInput(String),

    #[error("無料スキャン回数の上限に達しました（{used}/{limit}回）")]
    QuotaExceeded { used: usize, limit: usize },

    #[error("スキャン履歴エラー: {0}")]
    History(String),

    #[error("スキャンが見つかりません: {0}")]
    ScanNotFound(String),

    #[error("サーバー起動エラー: {0}")]
    Server(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(appraiser_common::Error),
}

/// 入力検証エラーは呼び出し側の誤りとして区別する
impl From<appraiser_common::Error> for AppraiserError {
    fn from(err: appraiser_common::Error) -> Self {
        match err {
            appraiser_common::Error::InvalidInput(msg) => AppraiserError::InvalidInput(msg),
            other => AppraiserError::Common(other),
        }
    }
}

impl AppraiserError {
    /// 呼び出し側の誤り（リクエストを拒否すべきもの）か
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            AppraiserError::InvalidInput(_)
                | AppraiserError::ImageLoad(_)
                | AppraiserError::FileNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppraiserError>;
