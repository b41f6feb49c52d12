use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_sightings::cache::DatasetCache;
use kira_sightings::config::{ConfigLoader, ResolvedConfig};
use kira_sightings::domain::Period;
use kira_sightings::error::KiraError;
use kira_sightings::loader::LoadOptions;
use kira_sightings::output::{JsonOutput, OutputMode, TextOutput};
use kira_sightings::session::{Action, Session};
use kira_sightings::tui::Tui;

#[derive(Parser)]
#[command(name = "kira-sg")]
#[command(about = "Species sightings dashboard over an occurrence table")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Config file (defaults to ./kira-sightings.json)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Dataset path, overriding `data_path` from the config
    #[arg(long, global = true)]
    data: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Open the interactive dashboard (default)")]
    Dashboard,
    #[command(about = "Print filtered aggregates")]
    Summary(SummaryArgs),
    #[command(about = "List species with their global counts and colors")]
    Species,
}

#[derive(Args)]
struct SummaryArgs {
    /// Restrict to these species (repeatable). Defaults to all.
    #[arg(long = "species")]
    species: Vec<String>,

    /// First month, YYYY-MM (clamped to the data's span)
    #[arg(long)]
    from: Option<Period>,

    /// Last month, YYYY-MM (clamped to the data's span)
    #[arg(long)]
    to: Option<Period>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::DatasetNotFound(_) | KiraError::EmptyDataset => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(data) = cli.data {
        config.data_path = Utf8PathBuf::from(data);
    }
    let session = open_session(&config)?;

    match cli.command.unwrap_or(Commands::Dashboard) {
        Commands::Dashboard => run_dashboard(session, output_mode),
        Commands::Summary(args) => run_summary(session, args, output_mode),
        Commands::Species => {
            let result = session.species();
            let printed = match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_species(&result),
                OutputMode::Interactive => TextOutput::print_species(&result),
            };
            printed.into_diagnostic()
        }
    }
}

fn open_session(config: &ResolvedConfig) -> miette::Result<Session> {
    let options = LoadOptions::from_config(config);
    let loaded = DatasetCache::global().get_or_load(&config.data_path, &options)?;
    tracing::debug!(
        path = %loaded.source,
        kept = loaded.report.rows_kept(),
        dropped = loaded.report.rows_dropped(),
        "dataset ready"
    );
    Ok(Session::start(loaded, config.dashboard.clone())?)
}

fn run_dashboard(session: Session, output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => {
            JsonOutput::print_dashboard(&session.dashboard()).into_diagnostic()
        }
        OutputMode::Interactive => Tui::new(session).run(),
    }
}

fn run_summary(
    mut session: Session,
    args: SummaryArgs,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let mut species = args.species;
    species.sort();
    species.dedup();
    if !species.is_empty() {
        session.apply(Action::DeselectAll)?;
        for name in species {
            session.apply(Action::Toggle(name))?;
        }
    }

    if args.from.is_some() || args.to.is_some() {
        if let Some(bounds) = session.bounds() {
            let range = bounds.narrow(args.from, args.to)?;
            session.apply(Action::SetRange {
                start: range.start(),
                end: range.end(),
            })?;
        }
    }

    let dashboard = session.dashboard();
    let printed = match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_dashboard(&dashboard),
        OutputMode::Interactive => TextOutput::print_dashboard(&dashboard),
    };
    printed.into_diagnostic()
}
