//! Thrift Appraiser Common Library
//!
//! CLIとHTTPフロントエンドで共有される型と、I/Oを持たないパイプラインロジック

pub mod types;
pub mod error;
pub mod parser;
pub mod prompts;
pub mod analyzer;

pub use types::{
    AppraisalResult, Listing, ListingDraft, Locale, MarketSearchResult, ScanRequest, Synthesis,
    VisionFindings, UNKNOWN_ITEM,
};
pub use error::{Error, Result};
pub use parser::{parse_synthesis_response, strip_code_fences};
pub use prompts::build_appraisal_prompt;
pub use analyzer::{
    build_search_query, fallback_synthesis, is_fallback_result, localize_query, FallbackReason, DEFAULT_QUERY,
    FALLBACK_CONFIDENCE,
};
