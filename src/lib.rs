//! thrift-appraiser
//!
//! 写真から品物を認識し、類似出品を検索し、生成AIで査定と出品下書きを作る。

pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod providers;
pub mod scanner;
pub mod server;
