//! Interactive menu loop.
//!
//! Reads choices line by line from any `BufRead` and writes to any `Write`,
//! so the loop can be driven from stdin or from a test buffer.

use crate::analyzer::{AnalysisRun, SalesAnalyzer};
use crate::cli::CSV_FORMAT_HELP;
use crate::error::LoadError;
use crate::report;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};
use tracing::{debug, error};

const RULE: &str = "──────────────────────────────────────────";

const MENU: &str = "\n🚗 Car Sales Analysis Menu
  1. Sales Summary
  2. Yearly Trends
  3. Ask a Question
  4. Exit";

/// A parsed menu selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Summary,
    Trends,
    Query,
    Exit,
}

impl Choice {
    fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Choice::Summary),
            "2" => Some(Choice::Trends),
            "3" => Some(Choice::Query),
            "4" => Some(Choice::Exit),
            _ => None,
        }
    }
}

/// The interactive session.
pub struct Menu<'a, R, W> {
    analyzer: &'a SalesAnalyzer,
    input: R,
    output: W,
    show_progress: bool,
}

impl<'a, R: BufRead, W: Write> Menu<'a, R, W> {
    pub fn new(analyzer: &'a SalesAnalyzer, input: R, output: W, show_progress: bool) -> Self {
        Self {
            analyzer,
            input,
            output,
            show_progress,
        }
    }

    /// Run until the user exits or input ends.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            writeln!(self.output, "{}", MENU)?;
            let Some(line) = self.prompt("Enter choice (1-4): ")? else {
                debug!("Input closed, leaving menu");
                break;
            };

            match Choice::parse(&line) {
                Some(Choice::Summary) => self.show_summary().await?,
                Some(Choice::Trends) => self.show_trends().await?,
                Some(Choice::Query) => self.ask_question().await?,
                Some(Choice::Exit) => break,
                None => writeln!(self.output, "⚠️ Invalid choice. Please enter 1-4")?,
            }
        }

        writeln!(self.output, "\n👋 Goodbye!")?;
        Ok(())
    }

    /// Print `message` and read one line. `None` at end of input.
    fn prompt(&mut self, message: &str) -> Result<Option<String>> {
        write!(self.output, "{}", message)?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read from input")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    async fn show_summary(&mut self) -> Result<()> {
        let Some(run) = self.load(None).await? else {
            return Ok(());
        };
        write!(
            self.output,
            "{}",
            report::render_result(&run.summary, report::render_summary)
        )?;
        write!(self.output, "{}", report::render_metadata(&run.metadata))?;
        Ok(())
    }

    async fn show_trends(&mut self) -> Result<()> {
        let Some(run) = self.load(None).await? else {
            return Ok(());
        };
        write!(
            self.output,
            "{}",
            report::render_result(&run.trends, report::render_trends)
        )?;
        Ok(())
    }

    async fn ask_question(&mut self) -> Result<()> {
        let Some(question) = self.prompt("\n❓ Enter your question: ")? else {
            return Ok(());
        };
        if question.is_empty() {
            writeln!(self.output, "⚠️ Please enter a question")?;
            return Ok(());
        }

        let started = Instant::now();
        let spinner = self.spinner("Analyzing...");
        let run = self.load(Some(&question)).await;
        spinner.finish_and_clear();

        let Some(answer) = run?.and_then(|run| run.query) else {
            return Ok(());
        };

        writeln!(self.output, "\n{}", RULE)?;
        writeln!(self.output, "{}", answer.response)?;
        writeln!(self.output, "{}", RULE)?;
        writeln!(
            self.output,
            "⏱️ Answered in {:.2}s",
            started.elapsed().as_secs_f64()
        )?;
        Ok(())
    }

    /// Run the analyzer. Load errors are printed and yield `None`.
    async fn load(&mut self, query: Option<&str>) -> Result<Option<AnalysisRun>> {
        match self.analyzer.run(query).await {
            Ok(run) => Ok(Some(run)),
            Err(e) => {
                error!("Failed to load sales data: {}", e);
                writeln!(self.output, "❌ Error: {}", e)?;
                if matches!(e, LoadError::MissingColumns(_)) {
                    writeln!(self.output, "\n{}", CSV_FORMAT_HELP)?;
                }
                Ok(None)
            }
        }
    }

    fn spinner(&self, message: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }
}
