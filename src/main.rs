//! Mnemo CLI entry point.

use clap::Parser;
use mnemo::cli::{commands, Cli, Commands};
use mnemo::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbosity, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbosity: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use the verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbosity {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("mnemo=info"),
            2 => EnvFilter::new("mnemo=debug"),
            _ => EnvFilter::new("mnemo=trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<(), Error> {
    match &cli.command {
        Commands::Init { force } => commands::init::execute(cli.db.as_ref(), *force, cli.json),

        Commands::Status => commands::status::execute(cli.db.as_ref(), cli.json),

        Commands::Index { id } => {
            commands::index::execute(cli.db.as_ref(), id.as_deref(), cli.json)
        }

        Commands::IndexAll => commands::index::execute(cli.db.as_ref(), None, cli.json),

        Commands::Import { dry_run } => {
            commands::import::execute(cli.db.as_ref(), *dry_run, cli.json)
        }

        Commands::Recall {
            query,
            verbose,
            list,
            stats,
            mode,
        } => commands::recall::execute(
            cli.db.as_ref(),
            query.as_deref(),
            *verbose,
            *list,
            *stats,
            *mode,
            cli.json,
        ),

        Commands::RecallApply { selection } => {
            commands::recall::execute_apply(selection, cli.json)
        }

        Commands::Session { id } => commands::session::execute(cli.db.as_ref(), id, cli.json),

        Commands::Config => commands::config::execute(cli.json),
    }
}
