use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI利用時の既定リクエスト元ID
pub const LOCAL_REQUESTER: &str = "local";

#[derive(Parser)]
#[command(name = "thrift-appraiser")]
#[command(about = "リサイクル品の写真査定・出品下書き生成ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 写真（またはフォルダ内の写真）を査定してJSONを出力
    Scan {
        /// 画像ファイルまたはフォルダのパス
        #[arg(required = true)]
        path: PathBuf,

        /// 国コード (US/CA/GB...)
        #[arg(long, default_value = "US")]
        country: String,

        /// 通貨コード (USD/CAD/GBP...)
        #[arg(long, default_value = "USD")]
        currency: String,

        /// 品物のヒント（200文字まで）
        #[arg(long)]
        hint: Option<String>,

        /// リクエスト元ID
        #[arg(long, default_value = LOCAL_REQUESTER)]
        requester: String,

        /// 出力JSONファイル（デフォルト: 標準出力に要約のみ）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 履歴に保存しない（無料枠の判定もしない）
        #[arg(long)]
        no_history: bool,
    },

    /// HTTPサーバーを起動
    Serve {
        /// 待ち受けアドレス
        #[arg(long, default_value = "127.0.0.1:8001")]
        addr: String,
    },

    /// スキャン履歴を表示
    History {
        /// リクエスト元ID
        #[arg(long, default_value = LOCAL_REQUESTER)]
        requester: String,

        /// 表示件数
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// 設定の表示・変更
    Config {
        /// Gemini APIキーを設定
        #[arg(long)]
        set_gemini_key: Option<String>,

        /// Vision APIキーを設定
        #[arg(long)]
        set_vision_key: Option<String>,

        /// Custom Search APIキーを設定
        #[arg(long)]
        set_search_key: Option<String>,

        /// Custom Search エンジンIDを設定
        #[arg(long)]
        set_search_engine_id: Option<String>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_defaults() {
        let cli = Cli::try_parse_from(["thrift-appraiser", "scan", "jacket.jpg"]).unwrap();
        match cli.command {
            Commands::Scan { path, country, currency, hint, requester, output, no_history } => {
                assert_eq!(path, PathBuf::from("jacket.jpg"));
                assert_eq!(country, "US");
                assert_eq!(currency, "USD");
                assert!(hint.is_none());
                assert_eq!(requester, LOCAL_REQUESTER);
                assert!(output.is_none());
                assert!(!no_history);
            }
            _ => panic!("Expected Scan"),
        }
    }

    #[test]
    fn test_parse_scan_with_options() {
        let cli = Cli::try_parse_from([
            "thrift-appraiser", "-v", "scan", "photos/", "--country", "CA", "--currency", "CAD",
            "--hint", "vintage leather jacket", "--requester", "u1", "-o", "out.json", "--no-history",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Scan { country, hint, requester, output, no_history, .. } => {
                assert_eq!(country, "CA");
                assert_eq!(hint.as_deref(), Some("vintage leather jacket"));
                assert_eq!(requester, "u1");
                assert_eq!(output, Some(PathBuf::from("out.json")));
                assert!(no_history);
            }
            _ => panic!("Expected Scan"),
        }
    }

    #[test]
    fn test_scan_requires_path() {
        assert!(Cli::try_parse_from(["thrift-appraiser", "scan"]).is_err());
    }

    #[test]
    fn test_parse_serve_default_addr() {
        let cli = Cli::try_parse_from(["thrift-appraiser", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { addr } if addr == "127.0.0.1:8001"));
    }
}
