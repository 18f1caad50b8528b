use appraiser_common::{build_appraisal_prompt, parse_synthesis_response, Locale, MarketSearchResult, VisionFindings};
use thrift_appraiser::providers::{GeminiProvider, GenerativeProvider};

#[tokio::test]
async fn gemini_synthesis_integration() {
    let api_key = match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            eprintln!("GEMINI_API_KEY not set; skipping integration test");
            return;
        }
    };

    let vision = VisionFindings::from_detections(
        vec!["Teapot".into(), "Tableware".into()],
        vec!["IRONSTONE CHINA".into()],
    );
    let search = MarketSearchResult::empty("IRONSTONE CHINA Teapot price value US".into());
    let prompt = build_appraisal_prompt(&vision, &search, &Locale::default());

    let provider = GeminiProvider::new(Some(api_key), "gemini-2.0-flash");
    let text = match provider.generate(&prompt).await {
        Ok(text) => text,
        Err(e) => panic!("gemini api failed: {}", e),
    };

    let synthesis = parse_synthesis_response(&text).expect("failed to parse synthesis response");
    assert!(!synthesis.item_name.is_empty());
    assert!(synthesis.confidence_score <= 100);
}
