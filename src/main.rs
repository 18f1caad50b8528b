use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use thrift_appraiser::{cli, config, error, history, pipeline, scanner, server};
use cli::{Cli, Commands};
use config::{Config, KeyUpdates};
use error::{AppraiserError, Result};
use history::{FreeScanQuota, JsonHistoryStore, ScanHistory, ScanQuota, ScanRecord};
use pipeline::AppraisalPipeline;
use appraiser_common::{is_fallback_result, AppraisalResult, Locale, ScanRequest};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Scan { path, country, currency, hint, requester, output, no_history } => {
            println!("🔍 thrift-appraiser - 査定\n");

            // 1. 画像の収集
            println!("[1/3] 写真を読み込み中...");
            let images = if path.is_dir() {
                scanner::scan_folder(&path)?
                    .into_iter()
                    .map(|info| info.path)
                    .collect::<Vec<_>>()
            } else {
                vec![path.clone()]
            };
            if images.is_empty() {
                return Err(AppraiserError::FileNotFound(format!(
                    "{} (画像がありません)",
                    path.display()
                )));
            }
            println!("✔ {}枚の写真を検出\n", images.len());

            let history: Option<Arc<JsonHistoryStore>> = if no_history {
                None
            } else {
                Some(Arc::new(JsonHistoryStore::open(&config.history_dir()?)?))
            };
            let quota = history.as_ref().map(|store| {
                FreeScanQuota::new(store.clone() as Arc<dyn ScanHistory>, config.free_scan_limit)
            });

            // 2. 査定
            println!("[2/3] 査定中...");
            let pipeline = AppraisalPipeline::from_config(&config);
            let locale = Locale::new(&country, &currency);
            let progress = progress_bar(images.len() as u64);
            let mut results = Vec::with_capacity(images.len());

            for image_path in &images {
                progress.set_message(file_label(image_path));
                let image = scanner::load_image(image_path)?;
                let request = ScanRequest::new(image, locale.clone(), hint.as_deref(), &requester)?;

                let _reservation = match &quota {
                    Some(quota) => Some(quota.reserve(&request.requester_id)?),
                    None => None,
                };

                let result = pipeline.run(&request).await;
                if let Some(store) = &history {
                    let record = ScanRecord::new(&request.requester_id, &request.image, result.clone());
                    store.record(record)?;
                }

                progress.println(format!(
                    "  {} → {} ({} / 信頼度 {}%)",
                    file_label(image_path),
                    result.item_name,
                    result.estimated_value,
                    result.confidence_score
                ));
                results.push(result);
                progress.inc(1);
            }
            progress.finish_and_clear();
            println!("✔ 査定完了\n");

            // 3. 出力
            println!("[3/3] 結果を出力中...");
            let json = if results.len() == 1 {
                serde_json::to_string_pretty(&results[0])?
            } else {
                serde_json::to_string_pretty(&results)?
            };
            match output {
                Some(output) => {
                    std::fs::write(&output, json)?;
                    println!("✔ 結果を保存: {}", output.display());
                }
                None => println!("{}", json),
            }

            print_summary(&results);
            println!("\n✅ 完了");
        }

        Commands::Serve { addr } => {
            println!("🚀 thrift-appraiser - サーバー起動: http://{}/api/\n", addr);

            let history: Arc<dyn ScanHistory> =
                Arc::new(JsonHistoryStore::open(&config.history_dir()?)?);
            let quota: Arc<dyn ScanQuota> =
                Arc::new(FreeScanQuota::new(history.clone(), config.free_scan_limit));
            let state = Arc::new(server::AppState {
                pipeline: AppraisalPipeline::from_config(&config),
                history,
                quota,
            });

            server::serve(&addr, state).await?;
        }

        Commands::History { requester, limit } => {
            let store = JsonHistoryStore::open(&config.history_dir()?)?;
            let scans = store.list(&requester, limit)?;

            if scans.is_empty() {
                println!("履歴がありません: {}", requester);
            } else {
                println!("スキャン履歴 ({}件):", scans.len());
                for scan in &scans {
                    println!(
                        "  {} [{}] {} - {} ({}%)",
                        scan.timestamp.format("%Y-%m-%d %H:%M"),
                        scan.id,
                        scan.result.item_name,
                        scan.result.estimated_value,
                        scan.result.confidence_score
                    );
                }
            }
            println!("  保存先: {}", store.path().display());
        }

        Commands::Config { set_gemini_key, set_vision_key, set_search_key, set_search_engine_id, show } => {
            let updates = KeyUpdates {
                gemini_api_key: set_gemini_key,
                vision_api_key: set_vision_key,
                search_api_key: set_search_key,
                search_engine_id: set_search_engine_id,
            };
            let changed = !updates.is_empty();

            if changed {
                // 環境変数の値を書き戻さないよう、ファイルの内容だけを編集する
                let mut stored = Config::load_stored()?;
                updates.apply_to(&mut stored);
                stored.save()?;
                println!("✔ 設定を保存しました: {}", Config::config_path()?.display());
            }

            if show || !changed {
                // 保存後の内容を表示
                let current = if changed { Config::load()? } else { config };
                print_config(&current)?;
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "thrift_appraiser=debug" } else { "thrift_appraiser=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    let style = ProgressStyle::with_template("  [{bar:30}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_summary(results: &[AppraisalResult]) {
    let without_listings = results
        .iter()
        .filter(|r| r.search_response.listings.is_empty())
        .count();
    if without_listings > 0 {
        println!("⚠ {}件は類似出品が見つかりませんでした", without_listings);
    }

    let fallbacks = results.iter().filter(|r| is_fallback_result(r)).count();
    if fallbacks > 0 {
        println!("⚠ {}件は定型の概算査定です（再スキャンを推奨）", fallbacks);
    }
}

fn print_config(config: &Config) -> Result<()> {
    let status = |value: &Option<String>| if value.is_some() { "設定済み" } else { "未設定" };

    println!("設定:");
    println!("  ファイル: {}", Config::config_path()?.display());
    println!("  Gemini APIキー: {}", status(&config.gemini_api_key));
    println!("  Gemini モデル: {}", config.gemini_model);
    println!("  Vision APIキー: {}", status(&config.vision_api_key));
    println!("  Search APIキー: {}", status(&config.search_api_key));
    println!("  Search エンジンID: {}", status(&config.search_engine_id));
    println!(
        "  タイムアウト: vision {}s / search {}s / synthesis {}s",
        config.vision_timeout_seconds, config.search_timeout_seconds, config.synthesis_timeout_seconds
    );
    match config.free_scan_limit {
        Some(limit) => println!("  無料スキャン上限: {}回", limit),
        None => println!("  無料スキャン上限: なし"),
    }
    println!("  履歴: {}", config.history_dir()?.display());
    Ok(())
}
