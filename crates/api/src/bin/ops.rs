use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use mongodb::Database;

use bailbook_api::telemetry;
use bailbook_config::Settings;
use bailbook_db::connect;
use bailbook_services::{
    AuthService, Clock, DashboardService, HealthService, SystemClock, bonds, windows::Window,
};

#[derive(Parser, Debug)]
#[command(name = "bailbook-ops")]
#[command(about = "Maintenance commands for the bailbook datastore")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify raw bond values into bond_amount / bond_status / bond_raw
    BackfillBonds {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Print field coverage over a random sample of each county
    Audit {
        #[arg(long)]
        sample: Option<i64>,
    },
    /// Print per-county counts and bond sums for the last three booking days
    Windows,
    /// Print a session token for a staff uid
    MintSession { uid: String },
}

async fn require_db(settings: &Settings) -> anyhow::Result<Database> {
    match connect(settings).await? {
        Some(db) => Ok(db),
        None => bail!("MONGO_URI is not set"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing("bailbook_services=info,bailbook_db=warn");

    let cli = Cli::parse();
    let settings = Settings::load().context("loading settings")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Command::BackfillBonds { dry_run } => {
            let db = require_db(&settings).await?;
            let report = bonds::backfill_bonds(&db, dry_run).await?;
            println!(
                "{:<10} {:>8} {:>8} {:>10} {:>8} {:>8} {:>8}",
                "county", "scanned", "numeric", "magistrate", "no_bond", "unknown", "updated"
            );
            for row in &report {
                println!(
                    "{:<10} {:>8} {:>8} {:>10} {:>8} {:>8} {:>8}",
                    row.county,
                    row.scanned,
                    row.numeric,
                    row.refer_to_magistrate,
                    row.no_bond,
                    row.unknown,
                    row.updated
                );
            }
            if dry_run {
                println!("dry run: nothing written");
            }
        }
        Command::Audit { sample } => {
            let db = require_db(&settings).await?;
            let health = HealthService::new(Some(db), &settings.health, &settings.dashboard, clock);
            let report = health.fields(sample).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Windows => {
            let db = require_db(&settings).await?;
            let dashboard = DashboardService::new(Some(db), &settings.dashboard, clock.clone());
            let days = dashboard.days().window_days(clock.now(), Window::Rolling72);
            println!("zone {} days {}", settings.dashboard.timezone, days.join(", "));

            let report = dashboard.per_county(Window::Rolling72).await?;
            println!(
                "{:<10} {:>6} {:>12} {:>6} {:>12} {:>6} {:>12}",
                "county", "24h", "bond", "48h", "bond", "72h", "bond"
            );
            for row in &report.items {
                println!(
                    "{:<10} {:>6} {:>12.2} {:>6} {:>12.2} {:>6} {:>12.2}{}",
                    row.county.name(),
                    row.counts.today,
                    row.bond_today,
                    row.counts.yesterday,
                    row.bond_yesterday,
                    row.counts.two_days_ago,
                    row.bond_two_days_ago,
                    if row.degraded { "  (degraded)" } else { "" }
                );
            }
        }
        Command::MintSession { uid } => {
            let auth = AuthService::new(settings.session.clone());
            println!("{}", auth.issue(&uid)?);
        }
    }

    Ok(())
}
