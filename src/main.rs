//! Carsales - Car sales data analyzer
//!
//! Loads a car sales CSV, prints summaries and yearly trends, and answers
//! free-text questions, falling back to an LLM for what the data alone
//! cannot answer.
//!
//! Exit codes:
//!   0 - Success (including --help)
//!   1 - Startup failure (missing data file, missing credential, failed
//!       LLM verification, unreadable CSV)

mod analysis;
mod analyzer;
mod cli;
mod config;
mod data;
mod error;
mod llm;
mod menu;
mod models;
mod query;
mod report;

use analyzer::{AnalysisRun, SalesAnalyzer};
use anyhow::{Context, Result};
use cli::{Args, OutputFormat, PrintTarget, CSV_FORMAT_HELP};
use config::{Config, CONFIG_FILE_NAME};
use error::LoadError;
use llm::{ChatCompletionsBackend, LlmGateway};
use menu::Menu;
use std::io::IsTerminal;
use tracing::{debug, error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, config.general.verbose);

    info!("Carsales v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .carsales.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to change the data file, model, projection mode and more.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the CLI-derived level.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = if config_verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Dispatch to the requested mode. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    // --print never needs the LLM
    let wants_llm = config.llm.enabled && args.print.is_none();

    let gateway = if wants_llm {
        match connect_gateway(&args, &config).await {
            Ok(gateway) => Some(gateway),
            Err(e) => {
                error!("LLM initialization failed: {}", e);
                eprintln!("❌ LLM initialization failed: {}", e);
                eprintln!("   Run with --offline to analyze without the LLM.");
                return Ok(1);
            }
        }
    } else {
        info!("LLM backend disabled");
        None
    };

    if args.test_llm {
        return match gateway {
            Some(ref gateway) => test_llm(gateway).await,
            None => {
                eprintln!("❌ LLM backend is disabled in the configuration");
                Ok(1)
            }
        };
    }

    let analyzer = match SalesAnalyzer::new(
        config.general.data_path.clone(),
        gateway,
        config.analysis.clone(),
    ) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            return Ok(1);
        }
    };
    info!("Data file: {}", analyzer.data_path().display());

    if let Some(target) = args.print {
        return print_report(&analyzer, target, args.format).await;
    }

    if let Some(ref question) = args.query {
        return answer_query(&analyzer, question, args.format).await;
    }

    println!("🚗 Car Sales Analyzer v{}", env!("CARGO_PKG_VERSION"));
    println!("   Data: {}", analyzer.data_path().display());
    match analyzer.gateway() {
        Some(gateway) => println!("   LLM: {} (verified)", gateway.model_name()),
        None => println!("   LLM: offline"),
    }

    let stdin = std::io::stdin();
    let show_progress = !args.quiet && std::io::stderr().is_terminal();
    Menu::new(&analyzer, stdin.lock(), std::io::stdout(), show_progress)
        .run()
        .await?;

    Ok(0)
}

/// Build the HTTP backend and run the verification handshake.
async fn connect_gateway(args: &Args, config: &Config) -> Result<LlmGateway, error::GatewayError> {
    let settings = config.llm_settings(args.api_key.as_deref())?;
    debug!("LLM settings: {:?}", settings);

    let backend = ChatCompletionsBackend::new(settings)?;
    let gateway = LlmGateway::connect(Box::new(backend)).await?;
    info!("LLM connection verified ({})", gateway.model_name());
    Ok(gateway)
}

/// Handle --test-llm: a known-answer question against the live backend.
async fn test_llm(gateway: &LlmGateway) -> Result<i32> {
    println!("🔌 Testing LLM connection ({})...", gateway.model_name());

    let response = gateway.execute("What is 2+2?").await;
    let call_id = gateway.last_call().map(|call| call.call_id);

    if arithmetic_check_passed(&response, call_id) {
        println!("✅ LLM test passed");
        println!("   Response: {}", response.trim());
        Ok(0)
    } else {
        eprintln!("❌ LLM test failed. Got: {}", response.trim());
        Ok(1)
    }
}

/// Whether a "What is 2+2?" response answers 4. The echoed call id is
/// removed first since it may itself contain a 4.
fn arithmetic_check_passed(response: &str, call_id: Option<u32>) -> bool {
    if response.starts_with(llm::LLM_ERROR_PREFIX) {
        return false;
    }
    let answer = match call_id {
        Some(id) => response.replace(&id.to_string(), ""),
        None => response.to_string(),
    };
    answer.contains('4')
}

/// Handle --print: render the requested sections and exit.
async fn print_report(analyzer: &SalesAnalyzer, target: PrintTarget, format: OutputFormat) -> Result<i32> {
    let Some(run) = load_run(analyzer, None).await else {
        return Ok(1);
    };

    let with_summary = matches!(target, PrintTarget::Summary | PrintTarget::All);
    let with_trends = matches!(target, PrintTarget::Trends | PrintTarget::All);

    match format {
        OutputFormat::Json => {
            let json = report::generate_json_report(&report::JsonReport {
                metadata: &run.metadata,
                summary: with_summary.then(|| report::Section::from(&run.summary)),
                trends: with_trends.then(|| report::Section::from(&run.trends)),
            })?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            if with_summary {
                print!("{}", report::render_result(&run.summary, report::render_summary));
                print!("{}", report::render_metadata(&run.metadata));
            }
            if with_trends {
                print!("{}", report::render_result(&run.trends, report::render_trends));
            }
        }
    }

    Ok(0)
}

/// Handle --query: answer one question and exit.
async fn answer_query(analyzer: &SalesAnalyzer, question: &str, format: OutputFormat) -> Result<i32> {
    let Some(run) = load_run(analyzer, Some(question)).await else {
        return Ok(1);
    };
    let Some(answer) = run.query else {
        return Ok(1);
    };

    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&answer).context("Failed to serialize answer")?;
            println!("{}", json);
        }
        OutputFormat::Text => println!("{}", answer.response),
    }

    Ok(0)
}

/// Run the analyzer once, printing load failures.
async fn load_run(analyzer: &SalesAnalyzer, question: Option<&str>) -> Option<AnalysisRun> {
    match analyzer.run(question).await {
        Ok(run) => {
            let loaded = &run.load_report;
            info!(
                "Loaded {} of {} rows ({} skipped)",
                loaded.rows_read - loaded.rows_skipped,
                loaded.rows_read,
                loaded.rows_skipped
            );
            Some(run)
        }
        Err(e) => {
            error!("Failed to load sales data: {}", e);
            eprintln!("❌ Error: {}", e);
            if matches!(e, LoadError::MissingColumns(_)) {
                eprintln!("\n{}", CSV_FORMAT_HELP);
            }
            None
        }
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so a broken default file is reported on
/// stderr directly.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::llm::gateway::fakes::{EchoBackend, FixedReplyBackend};

    #[test]
    fn test_arithmetic_check_ignores_call_id_digits() {
        assert!(arithmetic_check_passed("[CALL_ID:123456] 2+2 = 4", Some(123456)));
        assert!(!arithmetic_check_passed("[CALL_ID:444444] five", Some(444444)));
        assert!(!arithmetic_check_passed(
            "LLM_ERROR: Call ID 440000 missing in response: 4",
            Some(440000)
        ));
    }

    #[tokio::test]
    async fn test_llm_check_fails_without_answer() {
        // Echoes the prompt and its call id, but never says 4.
        let gateway = LlmGateway::connect(Box::new(EchoBackend)).await.unwrap();
        assert_eq!(test_llm(&gateway).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_llm_check_fails_when_call_id_missing() {
        let gateway = LlmGateway::connect(Box::new(FixedReplyBackend("4".to_string())))
            .await
            .unwrap();
        assert_eq!(test_llm(&gateway).await.unwrap(), 1);
    }

    #[test]
    fn test_load_config_explicit_path_errors() {
        let args = Args::parse_from(["carsales", "--config", "/nonexistent/carsales.toml"]);
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_load_config_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[analysis]\ndefault_top_n = 7\n").unwrap();

        let args = Args::parse_from(["carsales", "--config", file.path().to_str().unwrap()]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.analysis.default_top_n, 7);
    }
}
