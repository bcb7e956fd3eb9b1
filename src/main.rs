use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use sharelens_core::{OutputFormat, ShareLensConfig, UnknownModelPolicy};
use sharelens_dataset::{derive_rows, load_sources, DatasetSummary, LanguageTable};

const CONFIG_FILE: &str = ".sharelens.toml";

#[derive(Parser)]
#[command(
    name = "sharelens",
    version,
    about = "Merge-rate analysis of pull requests that link a ChatGPT conversation",
    long_about = "Reads a snapshot of pull requests that link a shared ChatGPT conversation,\n\
                   buckets each one by model and repository language, and tests whether\n\
                   either factor is associated with the pull request being merged.\n\n\
                   Examples:\n  \
                     sharelens                                  Analyze the default snapshot\n  \
                     sharelens --input prs.json --format json   Machine-readable results\n  \
                     sharelens --unknown-model separate         Keep transcript-less PRs as a level\n  \
                     sharelens init                             Write a default .sharelens.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the pr_sharings JSON snapshot (overrides the config file)
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Path to configuration file (default: .sharelens.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for the analysis results.\n\n\
                       Formats:\n  \
                         text      Test lines and a regression summary (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Treatment of pull requests without a transcript
    #[arg(
        long,
        global = true,
        long_help = "Treatment of pull requests whose ChatgptSharing list is empty or absent.\n\n\
                       Policies:\n  \
                         as-default  Count them as model 3.5 (default)\n  \
                         exclude     Drop them from every analysis\n  \
                         separate    Keep them as their own model level"
    )]
    unknown_model: Option<UnknownModelPolicy>,

    /// Fail when an expected contingency cell is below the threshold
    #[arg(long, global = true)]
    strict_expected_frequency: bool,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create a default .sharelens.toml configuration file
    #[command(long_about = "Create a default .sharelens.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .sharelens.toml already exists.")]
    Init,
}

const DEFAULT_CONFIG: &str = r#"# sharelens configuration

[dataset]
# path = "./snapshot_20231012/20231012_233628_pr_sharings.json"

[languages]
# systems = ["C", "C++", "Rust", "Go"]
# scripting_or_web = ["Python", "JavaScript", "Ruby", "PHP", "HTML", "CSS", "SCSS", "TypeScript", "Shell"]

[analysis]
# unknown_model = "as-default"   # or "exclude", "separate"
# min_expected_frequency = 5.0
# strict_expected_frequency = false

[analysis.logit]
# max_iterations = 35
# tolerance = 1e-8
"#;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ShareLensConfig> {
    let config = match path {
        Some(path) => ShareLensConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                ShareLensConfig::from_file(default_path)?
            } else {
                ShareLensConfig::default()
            }
        }
    };
    Ok(config)
}

fn log_summary(summary: &DatasetSummary) {
    tracing::info!(
        total = summary.total,
        gpt35 = summary.gpt35,
        gpt4 = summary.gpt4,
        unknown = summary.unknown_model,
        systems = summary.systems,
        scripting_or_web = summary.scripting_or_web,
        merged = summary.merged,
        "derived pull request table"
    );
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(Command::Init) = cli.command {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            miette::bail!("{CONFIG_FILE} already exists");
        }
        std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
        println!("Created {CONFIG_FILE} with default configuration");
        return Ok(());
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(input) = cli.input {
        config.dataset.path = input;
    }
    if let Some(policy) = cli.unknown_model {
        config.analysis.unknown_model = policy;
    }
    if cli.strict_expected_frequency {
        config.analysis.strict_expected_frequency = true;
    }
    tracing::debug!(
        format = %cli.format,
        unknown_model = %config.analysis.unknown_model,
        input = %config.dataset.path.display(),
        "configuration resolved"
    );

    let records = load_sources(&config.dataset.path)?;
    let table = LanguageTable::from_config(&config.languages);
    let rows = derive_rows(&records, &table);
    drop(records);
    log_summary(&DatasetSummary::from_rows(&rows));

    let report = sharelens_stats::run_analysis(&rows, &config.analysis)?;

    match cli.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).into_diagnostic()?
            );
        }
        OutputFormat::Markdown => {
            print!("{}", report.to_markdown());
        }
        OutputFormat::Text => {
            print!("{report}");
        }
    }

    Ok(())
}
