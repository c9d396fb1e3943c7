use crate::classifier::Classifier;
use crate::config::Config;
use crate::error::ScanError;
use crate::message::ParsedMail;
use crate::pool::WorkerPool;
use crate::scanner::tokenize_mail_on_pool;
use std::fs;
use std::path::{Path, PathBuf};

/// Bookkeeping files and mailbox archives found in public spam corpora.
const IGNORED_NAMES: &[&str] = &["Summary.txt", "cmds", "cmd", "index", "current", "current.old"];
const IGNORED_SUFFIXES: &[&str] = &[".mbox", ".mail", ".orig", ".z", "."];
const IGNORED_INFIXES: &[&str] = &[".mbox.", ".mail."];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingSummary {
    pub sources: usize,
    pub learned: usize,
    pub empty: usize,
    pub failed: usize,
}

pub fn is_ignored(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };

    name.starts_with('.')
        || IGNORED_NAMES.contains(&name)
        || IGNORED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
        || IGNORED_INFIXES.iter().any(|infix| name.contains(infix))
}

/// Every trainable file below `dir`, sorted so training is repeatable.
pub fn collect_sources(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut sources = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if is_ignored(&path) {
                log::debug!("Skipping {}", path.display());
                continue;
            }
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                sources.push(path);
            }
        }
    }

    sources.sort();
    Ok(sources)
}

/// Learn every message below `dir` as `category`.
///
/// Messages are tokenized on the pool; learning stays on the caller's task.
/// When `duplicate_ham_tokens` is set, documents of the default category
/// have their token list doubled to bias against false positives.
pub async fn train_directory(
    pool: &WorkerPool,
    classifier: &mut Classifier,
    config: &Config,
    dir: &Path,
    category: &str,
) -> Result<TrainingSummary, ScanError> {
    let sources = collect_sources(dir)?;
    let mut summary = TrainingSummary {
        sources: sources.len(),
        ..Default::default()
    };
    log::info!("Training {} messages from {} as {category}", sources.len(), dir.display());

    let duplicate = config.duplicate_ham_tokens && category == config.default_category;
    let batch_size = pool.num_threads().max(1) * 4;

    for batch in sources.chunks(batch_size) {
        let handles: Vec<_> = batch
            .iter()
            .cloned()
            .map(|path| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    let tokens = source_tokens(&pool, &path).await;
                    (path, tokens)
                })
            })
            .collect();

        for handle in handles {
            let (path, tokens) = handle
                .await
                .map_err(|e| ScanError::Worker(e.to_string()))?;

            match tokens {
                Ok(tokens) if tokens.is_empty() => {
                    log::debug!("No tokens in {}", path.display());
                    summary.empty += 1;
                }
                Ok(mut tokens) => {
                    if duplicate {
                        tokens.extend_from_within(..);
                    }
                    classifier.learn(&tokens, category);
                    summary.learned += 1;
                }
                Err(ScanError::PoolClosed) => return Err(ScanError::PoolClosed),
                Err(e) => {
                    log::warn!("Could not train on {}: {e}", path.display());
                    summary.failed += 1;
                }
            }
        }
    }

    log::info!(
        "Learned {} of {} messages ({} empty, {} failed)",
        summary.learned,
        summary.sources,
        summary.empty,
        summary.failed
    );
    Ok(summary)
}

async fn source_tokens(pool: &WorkerPool, path: &Path) -> Result<Vec<String>, ScanError> {
    let raw = tokio::fs::read(path).await?;
    match ParsedMail::parse(&raw) {
        Some(mail) => tokenize_mail_on_pool(pool, &mail).await,
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_ignored_names() {
        for name in [
            "Summary.txt",
            "cmds",
            "cmd",
            "index",
            ".DS_Store",
            "archive.mbox",
            "archive.mbox.1",
            "backup.orig",
            "trailing.",
        ] {
            assert!(is_ignored(Path::new(name)), "{name} should be ignored");
        }
        for name in ["0001.eml", "message.txt", "spam-42"] {
            assert!(!is_ignored(Path::new(name)), "{name} should be kept");
        }
    }

    #[test]
    fn test_collect_sources() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.eml", "Subject: b\n\nbody");
        write(dir.path(), "a.eml", "Subject: a\n\nbody");
        write(dir.path(), "nested/c.eml", "Subject: c\n\nbody");
        write(dir.path(), "Summary.txt", "summary");
        write(dir.path(), ".hidden/d.eml", "Subject: d\n\nbody");

        let sources = collect_sources(dir.path()).unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.eml", "b.eml", "nested/c.eml"]);
    }

    #[test]
    fn test_missing_directory() {
        assert!(matches!(
            collect_sources(Path::new("/nonexistent/training/dir")),
            Err(ScanError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_train_directory() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "1.eml", "Subject: Lunch\n\nHello world");
        write(dir.path(), "2.eml", "Subject: Notes\n\nMeeting notes attached");
        write(dir.path(), "cmds", "not a message");

        let config = Config {
            num_threads: 2,
            ..Config::default()
        };
        let tokenizer = Tokenizer::new(&config).unwrap();
        let mut classifier = Classifier::new(config.vocabulary_limit, &config.default_category);
        let pool = WorkerPool::new(&config, tokenizer, classifier.clone()).unwrap();

        let summary = train_directory(&pool, &mut classifier, &config, dir.path(), "ham")
            .await
            .unwrap();
        assert_eq!(
            summary,
            TrainingSummary {
                sources: 2,
                learned: 2,
                empty: 0,
                failed: 0,
            }
        );
        assert_eq!(classifier.total_documents(), 2);
        // ham tokens are counted twice
        assert_eq!(classifier.token_count("hello", "ham"), 2);
        pool.close().await;
    }

    #[tokio::test]
    async fn test_spam_tokens_not_duplicated() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "1.eml", "Subject: Offer\n\nCheap pills");

        let config = Config {
            num_threads: 1,
            ..Config::default()
        };
        let tokenizer = Tokenizer::new(&config).unwrap();
        let mut classifier = Classifier::new(config.vocabulary_limit, &config.default_category);
        let pool = WorkerPool::new(&config, tokenizer, classifier.clone()).unwrap();

        train_directory(&pool, &mut classifier, &config, dir.path(), "spam")
            .await
            .unwrap();
        assert_eq!(classifier.token_count("cheap", "spam"), 1);
        assert!(classifier.is_loaded());
        pool.close().await;
    }
}
