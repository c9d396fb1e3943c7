pub mod classifier;
pub mod config;
pub mod detection;
pub mod domain_utils;
pub mod error;
pub mod language;
pub mod message;
pub mod normalization;
pub mod pool;
pub mod scanner;
pub mod stopwords;
pub mod tokenizer;
pub mod training;

pub use classifier::{Classification, Classifier};
pub use config::Config;
pub use error::ScanError;
pub use message::ParsedMail;
pub use pool::WorkerPool;
pub use scanner::{ScanVerdict, Scanner};
pub use tokenizer::Tokenizer;
