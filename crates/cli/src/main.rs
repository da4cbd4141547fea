use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use isodemo_cli::{App, Command, ConnectionArgs, RunArgs, SeedArgs};
use isodemo_core::transcript::StdoutNarrator;
use isodemo_core::{ScenarioReport, ALICE, BOB};
use isodemo_drivers::seed::{current_balance, seed_accounts};
use isodemo_drivers::{scenarios, MySqlDriver};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // before the subscriber, so RUST_LOG may come from .env
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut app = App::parse();
    let command = app.resolve_command().unwrap_or_else(|e| e.exit());
    match dispatch(&app.connection, command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(connection: &ConnectionArgs, command: Command) -> anyhow::Result<ExitCode> {
    let config = connection
        .resolve(|var| std::env::var(var).ok())
        .context("invalid connection settings")?;
    info!(?config, "connection settings");
    let driver = MySqlDriver::new(&config);

    match command {
        Command::Run(args) => run(&driver, &args).await,
        Command::Seed(args) => seed(&driver, &args).await,
    }
}

async fn run(driver: &MySqlDriver, args: &RunArgs) -> anyhow::Result<ExitCode> {
    let reports =
        scenarios::run_all(driver, &args.scenarios(), &args.options(), &StdoutNarrator).await;

    println!();
    println!("Summary:");
    for report in &reports {
        println!("  {}", report.summary());
    }

    if args.json {
        for report in &reports {
            println!("{}", serde_json::to_string(report)?);
        }
    }

    if args.strict && !reports.iter().all(ScenarioReport::passed) {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn seed(driver: &MySqlDriver, args: &SeedArgs) -> anyhow::Result<ExitCode> {
    seed_accounts(driver, args.baseline)
        .await
        .context("could not seed accounts")?;
    let alice = current_balance(driver, ALICE).await?;
    let bob = current_balance(driver, BOB).await?;
    println!("Seeded accounts: {ALICE} = {alice}, {BOB} = {bob}");
    Ok(ExitCode::SUCCESS)
}
