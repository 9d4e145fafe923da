use std::io;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};

use crate::config::{CliOverrides, Settings};
use crate::llm::backend::{ChatBackend, ProviderError, build_backend};
use crate::llm::request::InferenceOptions;
use crate::movies::{self, MovieQuery};
use crate::session::SupportSession;

pub const DEFAULT_DEMO: &str = "bedrock-movie";

/// The closed set of runnable demos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demo {
    Movie,
    MovieConverseTools,
    CustomerSupport,
}

impl Demo {
    pub const ALL: [Demo; 3] = [Demo::Movie, Demo::MovieConverseTools, Demo::CustomerSupport];

    pub fn name(self) -> &'static str {
        match self {
            Self::Movie => "bedrock-movie",
            Self::MovieConverseTools => "bedrock-movie-converse-tools",
            Self::CustomerSupport => "bedrock-customer-support",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|demo| demo.name().eq_ignore_ascii_case(name))
    }
}

/// Everything a demo run needs besides the demo name.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub query: String,
    pub dry_run: bool,
    pub overrides: CliOverrides,
}

pub fn usage() -> String {
    let mut text = String::from("Available demos:\n");
    for demo in Demo::ALL {
        text.push_str(&format!("  aidemos --demo {}\n", demo.name()));
    }
    text
}

/// Runs the named demo; unknown names print the demo list.
pub async fn run(demo_name: &str, options: RunOptions) -> Result<()> {
    println!("Starting AI Demo: {demo_name}\n");

    let Some(demo) = Demo::from_name(demo_name) else {
        print!("{}", usage());
        return Ok(());
    };

    let settings =
        Settings::resolve(&options.overrides).context("failed to resolve settings")?;
    let backend = build_backend(&settings.provider, options.dry_run)
        .context("failed to configure chat backend")?;
    tracing::debug!(demo = demo.name(), "running demo");

    match demo {
        Demo::Movie => run_movie(backend.as_ref(), &options.query, settings.inference).await,
        Demo::MovieConverseTools => {
            run_movie_tools(backend.as_ref(), &options.query, settings.inference).await
        }
        Demo::CustomerSupport => run_customer_support(backend.as_ref(), settings.inference).await,
    }
}

fn heading(text: &str) {
    println!(
        "{}\n",
        text.if_supports_color(Stream::Stdout, |text| text.bold())
    );
}

async fn run_movie(
    backend: &dyn ChatBackend,
    query: &str,
    inference: InferenceOptions,
) -> Result<()> {
    let query = MovieQuery::new(query)?;
    println!("\nSearching for: {}...\n", query.as_str());

    let request = movies::movie_text_request(&query, inference);
    let response = backend
        .invoke(&request)
        .await
        .context("movie lookup failed")?;
    if response.is_dry_run() {
        return Ok(());
    }

    let text = response.text();
    if text.is_empty() {
        println!("No response from model.");
        return Ok(());
    }

    heading("=== Response ===");
    println!("{text}");
    Ok(())
}

async fn run_movie_tools(
    backend: &dyn ChatBackend,
    query: &str,
    inference: InferenceOptions,
) -> Result<()> {
    let query = MovieQuery::new(query)?;
    println!("\nRequesting movie info for: {}...\n", query.as_str());

    let request = movies::movie_tool_request(&query, inference);
    let response = match backend.invoke(&request).await {
        Err(ProviderError::EmptyResponse { provider }) => {
            tracing::warn!(%provider, "reply carried no assistant message");
            heading("=== Movie Information (Structured JSON) ===");
            println!("{}", movies::render_invalid_response(provider));
            return Ok(());
        }
        other => other.context("structured movie lookup failed")?,
    };
    if response.is_dry_run() {
        return Ok(());
    }

    heading("=== Movie Information (Structured JSON) ===");
    println!("{}", movies::render_tool_response(&response));
    Ok(())
}

async fn run_customer_support(
    backend: &dyn ChatBackend,
    inference: InferenceOptions,
) -> Result<()> {
    let mut session = SupportSession::new(backend, inference);
    session
        .run(io::stdin().lock(), io::stdout())
        .await
        .context("customer support chat ended with an error")?;
    Ok(())
}
