use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod catalog;
mod checklist;
mod config;
mod error;
mod models;
mod normalize;
mod period;
mod quarter;
mod report;
mod scoring;
mod store;
mod util;

use crate::catalog::Catalog;
use crate::checklist::Checklist;
use crate::config::{AppConfig, AppEnvironment, StoreBackend};
use crate::models::{SubmissionAction, SupervisorKind};
use crate::period::{Period, Quarter};
use crate::store::{PgStore, RecordQuery, RecordStore};

#[derive(Parser)]
#[command(name = "branch-visit-checklist")]
#[command(about = "Branch visit inspection checklists and quarterly summaries", long_about = None)]
struct Cli {
    /// Record store to use; defaults to CHECKLIST_STORE
    #[arg(long, global = true, value_enum)]
    store: Option<StoreBackend>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the Postgres schema
    InitDb,
    /// Load demo submissions into Postgres
    Seed,
    /// Import submissions exported from the record store
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Walk the region / zone / branch hierarchy
    Branches {
        #[arg(long)]
        region: Option<String>,
        #[arg(long, requires = "region")]
        zone: Option<String>,
    },
    /// Fill in a new checklist and store it
    New(ChecklistArgs),
    /// Load the latest checklist for a month, amend it and store the result
    Edit {
        #[command(flatten)]
        checklist: ChecklistArgs,
        /// Observation number to remove (repeatable)
        #[arg(long = "remove-obs")]
        remove_obs: Vec<usize>,
    },
    /// Print the quarterly summary for a branch
    Quarter(QuarterArgs),
    /// Write the quarterly summary as markdown
    Report {
        #[command(flatten)]
        quarter: QuarterArgs,
        #[arg(long, default_value = "quarter-report.md")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct ChecklistArgs {
    #[arg(long)]
    branch: String,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    quarter: Option<u32>,
    #[arg(long)]
    month: Option<u32>,
    #[arg(long, value_enum, default_value_t = SupervisorKind::Zonal)]
    supervisor: SupervisorKind,
    /// Item score as ID=SCORE (repeatable)
    #[arg(long = "score", value_parser = parse_score)]
    scores: Vec<(String, i64)>,
    /// Observation text (repeatable)
    #[arg(long = "obs")]
    observations: Vec<String>,
    /// Send by email instead of only saving
    #[arg(long)]
    send: bool,
    /// Print the review without storing anything
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct QuarterArgs {
    #[arg(long)]
    branch: String,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    quarter: Option<u32>,
}

fn parse_score(raw: &str) -> Result<(String, i64), String> {
    let (id, score) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=SCORE, got {raw}"))?;
    let score = score
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("score for {id} must be a whole number"))?;
    Ok((id.trim().to_string(), score))
}

#[tokio::main]
async fn main() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };
    init_tracing(&config.log_level);

    if let Err(err) = run(config).await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let cli = Cli::parse();
    let backend = cli.store.unwrap_or(config.store);

    match cli.command {
        Commands::InitDb => {
            let store = PgStore::open(&config).await.context("failed to connect to Postgres")?;
            store.init_db().await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let store = PgStore::open(&config).await.context("failed to connect to Postgres")?;
            let inserted = store.seed().await?;
            println!("Inserted {inserted} demo submissions.");
        }
        Commands::Import { csv } => {
            let store = PgStore::open(&config).await.context("failed to connect to Postgres")?;
            let inserted = store
                .import_csv(&csv)
                .await
                .with_context(|| format!("failed to import {}", csv.display()))?;
            println!("Inserted {inserted} submissions from {}.", csv.display());
        }
        Commands::Branches { region, zone } => {
            let catalog = Catalog::load(&config.data_dir)?;
            list_branches(&catalog, region.as_deref(), zone.as_deref());
        }
        Commands::New(args) => {
            let catalog = Catalog::load(&config.data_dir)?;
            let mut checklist = start_checklist(&catalog, &args)?;
            apply_changes(&mut checklist, &args, &[])?;
            finish(&config, backend, &checklist, &args).await?;
        }
        Commands::Edit {
            checklist: args,
            remove_obs,
        } => {
            let catalog = Catalog::load(&config.data_dir)?;
            let mut checklist = start_checklist(&catalog, &args)?;
            let store = RecordStore::open(&config, backend).await?;
            let records = store
                .fetch_records(&RecordQuery::month(&checklist.branch.code, checklist.period))
                .await
                .context("error querying the record store")?;

            let period = checklist.period;
            let Some(latest) = quarter::latest_for_month(&records, period.year(), period.month())
            else {
                println!(
                    "No checklist stored for branch {} in {}.",
                    checklist.branch.code, period
                );
                return Ok(());
            };
            checklist.load_record(&normalize::normalize(latest));
            info!(branch_code = %checklist.branch.code, "latest checklist loaded");

            apply_changes(&mut checklist, &args, &remove_obs)?;
            finish(&config, backend, &checklist, &args).await?;
        }
        Commands::Quarter(args) => {
            let catalog = Catalog::load(&config.data_dir)?;
            let output = quarter_report(&config, backend, &catalog, &args).await?;
            print!("{output}");
        }
        Commands::Report { quarter, out } => {
            let catalog = Catalog::load(&config.data_dir)?;
            let output = quarter_report(&config, backend, &catalog, &quarter).await?;
            std::fs::write(&out, output)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn list_branches(catalog: &Catalog, region: Option<&str>, zone: Option<&str>) {
    match (region, zone) {
        (None, _) => {
            for region in catalog.regions() {
                println!("{region}");
            }
        }
        (Some(region), None) => {
            for zone in catalog.zones(region) {
                println!("{zone}");
            }
        }
        (Some(region), Some(zone)) => {
            let branches = catalog.branches_in(region, zone);
            if branches.is_empty() {
                println!("No branches in {region} / {zone}.");
            }
            for branch in branches {
                println!("{} — {}", branch.code, branch.name);
            }
        }
    }
}

fn resolve_period(
    year: Option<i32>,
    quarter: Option<u32>,
    month: Option<u32>,
) -> anyhow::Result<Period> {
    let mut period = Period::current(Utc::now().date_naive());
    if let Some(year) = year {
        period = period.with_year(year);
    }
    if let Some(month) = month {
        period = Period::new(period.year(), month)?;
    }
    if let Some(quarter) = quarter {
        period = period.with_quarter(Quarter::new(quarter)?);
    }
    Ok(period)
}

fn start_checklist(catalog: &Catalog, args: &ChecklistArgs) -> anyhow::Result<Checklist> {
    let branch = catalog.branch(&args.branch)?.clone();
    let supervisor = catalog.supervisor_for(&branch, args.supervisor)?;
    let period = resolve_period(args.year, args.quarter, args.month)?;
    Ok(Checklist::new(
        &catalog.template,
        branch,
        supervisor,
        args.supervisor,
        period,
    ))
}

fn apply_changes(
    checklist: &mut Checklist,
    args: &ChecklistArgs,
    remove_obs: &[usize],
) -> anyhow::Result<()> {
    for (id, score) in &args.scores {
        checklist.set_score(id, *score)?;
    }

    // Positions refer to the loaded list, so remove from the back.
    let mut positions = remove_obs.to_vec();
    positions.sort_unstable_by(|a, b| b.cmp(a));
    positions.dedup();
    for position in positions {
        checklist.remove_observation(position)?;
    }

    for text in &args.observations {
        checklist.add_observation(text);
    }
    Ok(())
}

async fn finish(
    config: &AppConfig,
    backend: StoreBackend,
    checklist: &Checklist,
    args: &ChecklistArgs,
) -> anyhow::Result<()> {
    print!("{}", report::build_review(checklist));
    if args.dry_run {
        return Ok(());
    }

    let action = if args.send {
        SubmissionAction::Send
    } else {
        SubmissionAction::Save
    };
    let payload = checklist.to_payload(action, config.environment, Utc::now())?;
    let store = RecordStore::open(config, backend).await?;
    store
        .append(&payload)
        .await
        .context("error sending the checklist")?;

    match (action, config.environment) {
        (SubmissionAction::Send, AppEnvironment::Production) => println!("Sent by email."),
        (SubmissionAction::Send, AppEnvironment::Development) => {
            println!("Saved (development): no email sent.")
        }
        (SubmissionAction::Save, _) => println!("Saved without sending."),
    }
    Ok(())
}

async fn quarter_report(
    config: &AppConfig,
    backend: StoreBackend,
    catalog: &Catalog,
    args: &QuarterArgs,
) -> anyhow::Result<String> {
    let branch = catalog.branch(&args.branch)?;
    let period = resolve_period(args.year, args.quarter, None)?;
    let store = RecordStore::open(config, backend).await?;
    let records = store
        .fetch_records(&RecordQuery::quarter(&branch.code, period.year(), period.quarter()))
        .await
        .context("error querying the quarter")?;

    let summary = aggregate::summarize_quarter(
        &branch.code,
        &records,
        period.year(),
        period.quarter(),
        &catalog.template,
    );
    info!(
        branch_code = %branch.code,
        quarter = %summary.quarter,
        complete = summary.complete,
        "quarter summarized"
    );
    Ok(report::build_quarter_report(&summary, &catalog.template, Some(branch)))
}
