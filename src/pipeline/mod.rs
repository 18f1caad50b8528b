//! 査定パイプライン
//!
//! 3段階の外部API呼び出しを順に実行する:
//! - Stage1 (Vision): 画像から物体ラベルとテキストを抽出
//! - Stage2 (Search): Stage1の結果とヒントから類似出品を検索
//! - Stage3 (Synthesis): Stage1+2を埋め込んだプロンプトで査定を生成
//!
//! 入力検証以外のエラーは呼び出し側に返さない。各ステージは失敗時に
//! 既定値・定型値へ切り替え、最終結果は必ず返る。

mod stage;

pub use stage::{DegradeReason, Stage, StageOutcome};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use appraiser_common::{
    build_appraisal_prompt, build_search_query, fallback_synthesis, localize_query,
    parse_synthesis_response, AppraisalResult, FallbackReason, Locale, MarketSearchResult,
    ScanRequest, Synthesis, VisionFindings,
};
use tracing::{info, warn};

use crate::config::{Config, PipelineConfig};
use crate::error::Result;
use crate::providers::{
    CustomSearchProvider, GeminiProvider, GenerativeProvider, GoogleVisionProvider,
    ProviderError, SearchProvider, VisionProvider,
};

pub struct AppraisalPipeline {
    config: PipelineConfig,
    vision: Arc<dyn VisionProvider>,
    search: Arc<dyn SearchProvider>,
    generative: Arc<dyn GenerativeProvider>,
}

impl AppraisalPipeline {
    pub fn new(
        config: PipelineConfig,
        vision: Arc<dyn VisionProvider>,
        search: Arc<dyn SearchProvider>,
        generative: Arc<dyn GenerativeProvider>,
    ) -> Self {
        Self {
            config,
            vision,
            search,
            generative,
        }
    }

    /// Google Vision / Custom Search / Gemini で構築
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.pipeline_config(),
            Arc::new(GoogleVisionProvider::new(config.vision_api_key.clone())),
            Arc::new(CustomSearchProvider::new(
                config.search_api_key.clone(),
                config.search_engine_id.clone(),
            )),
            Arc::new(GeminiProvider::new(
                config.gemini_api_key.clone(),
                &config.gemini_model,
            )),
        )
    }

    /// 入力を検証してから査定を実行
    ///
    /// 画像が空、またはリクエスト元IDが無い場合は外部呼び出し前に失敗する。
    pub async fn appraise(
        &self,
        image: Vec<u8>,
        locale: Locale,
        hint: Option<&str>,
        requester_id: &str,
    ) -> Result<AppraisalResult> {
        let request = ScanRequest::new(image, locale, hint, requester_id)?;
        Ok(self.run(&request).await)
    }

    /// 検証済みリクエストで3ステージを実行
    pub async fn run(&self, request: &ScanRequest) -> AppraisalResult {
        info!(
            requester = %request.requester_id,
            image_bytes = request.image.len(),
            country = %request.locale.country_code,
            "appraisal started"
        );

        let vision = self.recognize(&request.image).await;
        log_outcome(Stage::Vision, &vision);
        let vision = vision.into_value();

        let search = self
            .search_market(&vision, request.hint.as_deref(), &request.locale)
            .await;
        log_outcome(Stage::Search, &search);
        let search = search.into_value();

        let synthesis = self.synthesize(&vision, &search, &request.locale).await;
        log_outcome(Stage::Synthesis, &synthesis);

        let result = AppraisalResult::assemble(synthesis.into_value(), vision, search);
        info!(
            requester = %request.requester_id,
            item = %result.item_name,
            confidence = result.confidence_score,
            "appraisal finished"
        );
        result
    }

    /// Stage1: 物体ラベル検出 → テキスト検出
    pub async fn recognize(&self, image: &[u8]) -> StageOutcome<VisionFindings> {
        let detect = async {
            let labels = self
                .vision
                .detect_labels(image, VisionFindings::MAX_LABELS)
                .await?;
            let texts = self
                .vision
                .detect_text(image, VisionFindings::MAX_SNIPPETS)
                .await?;
            Ok::<_, ProviderError>(VisionFindings::from_detections(labels, texts))
        };

        match bounded(self.config.vision_timeout, detect).await {
            Ok(findings) => StageOutcome::Fresh(findings),
            Err(reason) => StageOutcome::degraded(VisionFindings::default(), reason),
        }
    }

    /// Stage2: クエリ生成 → Web検索
    pub async fn search_market(
        &self,
        vision: &VisionFindings,
        hint: Option<&str>,
        locale: &Locale,
    ) -> StageOutcome<MarketSearchResult> {
        let query = localize_query(&build_search_query(vision, hint), locale);
        let limit = self.config.max_search_results;

        match bounded(self.config.search_timeout, self.search.search(&query, limit)).await {
            Ok(mut listings) => {
                listings.truncate(limit);
                StageOutcome::Fresh(MarketSearchResult::new(query, listings))
            }
            Err(reason) => StageOutcome::degraded(MarketSearchResult::empty(query), reason),
        }
    }

    /// Stage3: プロンプト生成 → 生成AI → パース（失敗時は定型結果）
    pub async fn synthesize(
        &self,
        vision: &VisionFindings,
        search: &MarketSearchResult,
        locale: &Locale,
    ) -> StageOutcome<Synthesis> {
        let prompt = build_appraisal_prompt(vision, search, locale);

        let generation = self.generative.generate(&prompt);
        let text = match bounded(self.config.synthesis_timeout, generation).await {
            Ok(text) => text,
            Err(reason) => {
                let fallback = fallback_synthesis(vision, locale, FallbackReason::ProviderFailure);
                return StageOutcome::degraded(fallback, reason);
            }
        };

        match parse_synthesis_response(&text) {
            Ok(synthesis) => StageOutcome::Fresh(synthesis),
            Err(err) => StageOutcome::degraded(
                fallback_synthesis(vision, locale, FallbackReason::Unparseable),
                DegradeReason::Unparseable(err.to_string()),
            ),
        }
    }
}

/// 外部呼び出しをタイムアウト付きで実行
async fn bounded<T, F>(limit: Duration, call: F) -> std::result::Result<T, DegradeReason>
where
    F: Future<Output = std::result::Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(DegradeReason::Provider(err)),
        Err(_) => Err(DegradeReason::Timeout(limit)),
    }
}

fn log_outcome<T>(stage: Stage, outcome: &StageOutcome<T>) {
    match outcome.reason() {
        None => info!(stage = %stage, "stage completed"),
        Some(reason) => warn!(stage = %stage, reason = %reason, "stage degraded, using defaults"),
    }
}
