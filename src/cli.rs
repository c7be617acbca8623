//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::ProjectionMode;
use clap::Parser;
use std::path::PathBuf;

/// CSV layout shown in `--help` and after column errors.
pub const CSV_FORMAT_HELP: &str = "\
Required CSV format:
Year,Make,Model,Quantity,Region,Price

Example:
2023,Toyota,Camry,15000,North,25000";

/// Car Sales Data Analyzer
///
/// Loads a car sales CSV, prints summaries and yearly trends, and answers
/// free-text questions. Projection, comparison and ranking questions are
/// answered from the data; anything else goes to an LLM.
///
/// Examples:
///   carsales --data data/car_sales.csv
///   carsales --print summary --format json
///   carsales --query "top 5 most expensive models"
///   carsales --test-llm
///   carsales --offline --query "compare Toyota vs Honda"
///   carsales --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None, after_help = CSV_FORMAT_HELP)]
#[command(propagate_version = true)]
pub struct Args {
    /// Sales CSV file to analyze
    ///
    /// Defaults to data/car_sales.csv or the value in .carsales.toml.
    #[arg(short, long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .carsales.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, visible_alias = "debug")]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(long)]
    pub quiet: bool,

    /// Verify LLM connectivity and exit
    #[arg(long, conflicts_with = "offline")]
    pub test_llm: bool,

    /// Run without the LLM backend
    ///
    /// Projection questions use growth-rate extrapolation; general questions
    /// that need the LLM report that it is unavailable.
    #[arg(long)]
    pub offline: bool,

    /// Answer a single question and exit
    #[arg(long, value_name = "TEXT")]
    pub query: Option<String>,

    /// Print a report and exit
    #[arg(long, value_name = "WHAT")]
    pub print: Option<PrintTarget>,

    /// Output format for --print and --query (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Model identifier for the completion API
    #[arg(short, long, env = "CARSALES_MODEL")]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible completion API
    #[arg(long, value_name = "URL", env = "CARSALES_API_URL")]
    pub api_url: Option<String>,

    /// API key for the completion API
    #[arg(long, value_name = "KEY", env = "GROQ_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// How projection questions are answered
    #[arg(long, value_name = "MODE")]
    pub projection: Option<ProjectionMode>,

    /// Generate a default .carsales.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for one-shot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// JSON
    Json,
}

/// Report printed by --print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PrintTarget {
    Summary,
    Trends,
    All,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether the interactive menu will run.
    pub fn is_interactive(&self) -> bool {
        self.query.is_none() && self.print.is_none() && !self.test_llm && !self.init_config
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref api_url) = self.api_url {
            if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref query) = self.query {
            if query.trim().is_empty() {
                return Err("Query must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// The interactive menu stays at WARN so log lines don't interleave
    /// with the prompts.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else if self.is_interactive() {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            data: None,
            config: None,
            verbose: false,
            quiet: false,
            test_llm: false,
            offline: false,
            query: None,
            print: None,
            format: OutputFormat::Text,
            model: None,
            api_url: None,
            api_key: None,
            temperature: None,
            timeout: None,
            projection: None,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from([
            "carsales",
            "--data",
            "sales.csv",
            "--print",
            "trends",
            "--format",
            "json",
            "--projection",
            "llm",
            "--debug",
        ]);
        assert_eq!(args.data, Some(PathBuf::from("sales.csv")));
        assert_eq!(args.print, Some(PrintTarget::Trends));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.projection, Some(ProjectionMode::Llm));
        assert!(args.verbose);
    }

    #[test]
    fn test_offline_conflicts_with_test_llm() {
        let result = Args::try_parse_from(["carsales", "--offline", "--test-llm"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ranges() {
        let mut args = make_args();
        args.temperature = Some(1.5);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.api_url = Some("ftp://example.com".to_string());
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.query = Some("   ".to_string());
        assert!(args.validate().is_err());

        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::WARN);

        args.query = Some("top 3".to_string());
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
