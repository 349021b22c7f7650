//! CLI entry point: parses arguments, loads the tournament/engine-catalogue
//! JSON, resolves the resume prompt, and runs the Scheduler to completion.
//! Grounded in `monitors::main`'s thin wrapper around `cli::parse_cli` plus
//! `ugi_client::Client::new`/`run`, generalized from one match to a whole
//! tournament's worth of Scheduler ticks.

use std::path::PathBuf;
use std::process::ExitCode;

use tourney::cli;
use tourney::config;
use tourney::logger::ConsoleLogger;
use tourney::scheduler::Scheduler;

fn working_dir_of(path: &std::path::Path) -> PathBuf {
    path.parent().map(PathBuf::from).filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| PathBuf::from("."))
}

fn run() -> rules::Res<()> {
    let args = cli::parse_cli(std::env::args().skip(1).peekable())?;
    if args.help {
        println!("{}", cli::usage());
        return Ok(());
    }
    let Some(tournament_path) = args.tournament_json else {
        anyhow::bail!("no tournament JSON given; pass '-t PATH'.\n\n{}", cli::usage());
    };

    let tournament_config = config::load_tournament_config(&tournament_path)?;
    let working_dir = working_dir_of(&tournament_path);
    let catalogue_path = working_dir.join("engines.json");
    let catalogue = config::load_engine_catalogue(&catalogue_path)?;

    let store_path = working_dir.join("playing.json");
    let log_dir = working_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| anyhow::anyhow!("can't create log directory {}: {e}", log_dir.display()))?;
    let pgn_path = Some(working_dir.join("games.pgn"));

    let resumable = tournament_config.resumable;
    let output = Box::new(ConsoleLogger::new(args.verbose));
    let mut scheduler = Scheduler::new(tournament_config, catalogue, store_path, log_dir, pgn_path, output)?;
    if resumable {
        scheduler.resume_or_start(args.auto_answer)?;
    }
    scheduler.run()
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
