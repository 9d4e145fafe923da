use std::io;

use aidemos::config::CliOverrides;
use aidemos::demos::{self, DEFAULT_DEMO, RunOptions};
use aidemos::llm::backend::Provider;
use aidemos::logging;
use aidemos::movies::DEFAULT_MOVIE_QUERY;
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::{generate, shells};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit: ",
    env!("AIDEMOS_GIT_SHA"),
    ", built: ",
    env!("AIDEMOS_BUILD_TS"),
    ")"
);

const HELP_EXAMPLES: &str = "Examples:\n  aidemos --demo bedrock-movie --query \"Inception\"\n  aidemos --demo bedrock-movie-converse-tools --dry-run\n  aidemos --demo bedrock-customer-support --profile work";

#[derive(Debug, Parser)]
#[command(
    name = "aidemos",
    about = "Movie lookup and customer-support demos on a hosted chat model",
    version = VERSION,
    after_help = HELP_EXAMPLES
)]
struct Cli {
    /// Demo to run
    #[arg(
        long,
        num_args = 0..=1,
        default_value = DEFAULT_DEMO,
        default_missing_value = DEFAULT_DEMO
    )]
    demo: String,

    /// Movie title or part of a title
    #[arg(
        long,
        num_args = 0..=1,
        default_value = DEFAULT_MOVIE_QUERY,
        default_missing_value = DEFAULT_MOVIE_QUERY
    )]
    query: String,

    /// Profile from the config file
    #[arg(long)]
    profile: Option<String>,

    #[arg(long, value_enum)]
    provider: Option<Provider>,

    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// AWS region for Bedrock
    #[arg(long)]
    region: Option<String>,

    /// Print the request payload instead of sending it
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    /// Print a shell completion script and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completion: Option<CompletionShell>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "aidemos", &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "aidemos", &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "aidemos", &mut io::stdout()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completion {
        print_completion(shell);
        return;
    }

    logging::init(cli.verbose, cli.quiet);

    let options = RunOptions {
        query: cli.query,
        dry_run: cli.dry_run,
        overrides: CliOverrides {
            profile: cli.profile,
            provider: cli.provider,
            model: cli.model,
            region: cli.region,
        },
    };

    if let Err(err) = demos::run(&cli.demo, options).await {
        println!("Error: {err}");
        for cause in err.chain().skip(1) {
            println!("Caused by: {cause}");
        }
    }
}
