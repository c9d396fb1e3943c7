use anyhow::{bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;
use spam_sentinel::training::train_directory;
use spam_sentinel::{Classifier, Config, ParsedMail, ScanVerdict, Scanner, Tokenizer, WorkerPool};
use std::io::Read;
use std::path::Path;
use std::process;

const DEFAULT_CONFIG: &str = "/etc/spam-sentinel.yaml";
const DEFAULT_MODEL: &str = "classifier.json";

fn cli() -> Command {
    Command::new("spam-sentinel")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Naive Bayes spam classifier with phishing and executable attachment detection")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("scan")
                .long("scan")
                .value_name("FILE")
                .help("Scan a raw email message (use - for stdin)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("train")
                .long("train")
                .value_name("DIR")
                .help("Train the model on every message in a directory")
                .requires("category")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("category")
                .long("category")
                .value_name("NAME")
                .help("Category the training messages belong to (e.g. ham or spam)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("FILE")
                .help("Classifier model file")
                .default_value(DEFAULT_MODEL),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .value_name("N")
                .help("Worker threads per task kind (overrides num_threads)")
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the scan verdict as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Err(e) = run(&matches).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        Config::default()
            .to_file(generate_path)
            .with_context(|| format!("writing configuration to {generate_path}"))?;
        println!("Default configuration written to: {generate_path}");
        println!("Please edit the configuration file to suit your needs.");
        return Ok(());
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG);
    let mut config = load_config(config_path)?;
    if let Some(threads) = matches.get_one::<usize>("threads") {
        config.num_threads = *threads;
    }
    config.validate()?;

    if matches.get_flag("test-config") {
        print_config_summary(config_path, &config);
        return Ok(());
    }

    let model_path = matches
        .get_one::<String>("model")
        .map(String::as_str)
        .unwrap_or(DEFAULT_MODEL);

    if let Some(dir) = matches.get_one::<String>("train") {
        let category = matches
            .get_one::<String>("category")
            .context("--train needs --category")?;
        return train(config, model_path, Path::new(dir), category).await;
    }

    if let Some(source) = matches.get_one::<String>("scan") {
        return scan(config, model_path, source, matches.get_flag("json"));
    }

    cli().print_help()?;
    println!();
    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if Path::new(path).exists() {
        Config::from_file(path).with_context(|| format!("loading configuration from {path}"))
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(Config::default())
    }
}

fn print_config_summary(path: &str, config: &Config) {
    println!("✅ Configuration is valid: {path}");
    println!("   Locale: {}", config.locale);
    println!("   Vocabulary limit: {}", config.vocabulary_limit);
    println!("   Worker threads: {}", config.num_threads);
    println!(
        "   Categories: {} (default), {} (spam)",
        config.default_category, config.spam_category
    );
    println!(
        "   Language detection: {}",
        if config.language_detection { "on" } else { "off" }
    );
    println!(
        "   Homograph thresholds: similarity {}, risk {}",
        config.similarity_threshold, config.homograph_threshold
    );
    println!(
        "   Macro detection: {}",
        if config.macro_detection { "on" } else { "off" }
    );
    println!("   Heuristic threshold: {}", config.arbitrary_threshold);
    if config.hash_tokens {
        println!("   Tokens are hashed");
    }
}

fn load_model(path: &str, config: &Config) -> anyhow::Result<Classifier> {
    Classifier::load(path, Some(config.vocabulary_limit))
        .with_context(|| format!("loading classifier model from {path}"))
}

async fn train(config: Config, model_path: &str, dir: &Path, category: &str) -> anyhow::Result<()> {
    let mut classifier = if Path::new(model_path).exists() {
        load_model(model_path, &config)?
    } else {
        log::info!("No model at {model_path}, training from scratch");
        Classifier::new(config.vocabulary_limit, &config.default_category)
    };

    let tokenizer = Tokenizer::new(&config)?;
    let pool = WorkerPool::new(&config, tokenizer, classifier.clone())?;
    let summary = train_directory(&pool, &mut classifier, &config, dir, category).await;
    pool.close().await;
    let summary = summary.with_context(|| format!("training on {}", dir.display()))?;

    classifier
        .save(model_path)
        .with_context(|| format!("saving classifier model to {model_path}"))?;

    println!(
        "Learned {} of {} messages as {category} ({} empty, {} failed)",
        summary.learned, summary.sources, summary.empty, summary.failed
    );
    println!(
        "Model written to {model_path}: {} documents, {} tokens",
        classifier.total_documents(),
        classifier.vocabulary_size()
    );
    Ok(())
}

fn scan(config: Config, model_path: &str, source: &str, json: bool) -> anyhow::Result<()> {
    let raw = if source == "-" {
        let mut raw = Vec::new();
        std::io::stdin()
            .read_to_end(&mut raw)
            .context("reading message from stdin")?;
        raw
    } else {
        std::fs::read(source).with_context(|| format!("reading message from {source}"))?
    };

    let Some(mail) = ParsedMail::parse(&raw) else {
        bail!("{source} does not contain a parsable message");
    };

    let classifier = load_model(model_path, &config)?;
    let scanner = Scanner::new(config, classifier)?;
    let verdict = scanner.scan(&mail)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        print_verdict(&verdict);
    }
    Ok(())
}

fn print_verdict(verdict: &ScanVerdict) {
    if verdict.is_spam {
        println!("🚫 Spam");
    } else {
        println!("✅ Not spam");
    }
    println!("   Category: {}", verdict.classification.category);
    println!("   Spam probability: {:.3}", verdict.score);
    println!("   {}", verdict.message);

    if !verdict.links.is_empty() {
        println!("   Links:");
        for link in &verdict.links {
            println!("     {link}");
        }
    }
}
