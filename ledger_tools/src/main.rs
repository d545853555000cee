use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::*;
use print_ledger_engine::{
    db_types::Actor,
    events::EventProducers,
    LedgerConfig,
    LedgerError,
    NoopArtifactStore,
    SettlementApi,
    SqliteDatabase,
};

mod artifacts;
mod formatting;
mod maintenance;

use crate::{
    artifacts::DirectoryArtifactStore,
    formatting::{format_balances, format_settlement, format_summary},
    maintenance::run_maintenance_worker,
};

/// Every change made through this tool is recorded under this administrator id.
const ADMIN_ID: &str = "ledger-tools";

#[derive(Parser, Debug)]
#[command(version, about = "Administrative tools for the print ledger")]
pub struct Arguments {
    /// The database to use. Overrides PL_DATABASE_URL
    #[arg(short = 'd', long = "database")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[clap(name = "migrate", about = "Create the database if necessary and bring the schema up to date")]
    Migrate,
    #[clap(name = "unsettled", about = "List the unsettled earnings of every shop, or of one shop")]
    Unsettled {
        #[arg(short = 's', long = "shop")]
        shop: Option<String>,
    },
    #[clap(name = "settle", about = "Settle the unsettled earnings of a shop")]
    Settle(SettleParams),
    #[clap(name = "summary", about = "Show the earnings summary of a shop")]
    Summary {
        #[arg(short = 's', long = "shop")]
        shop: String,
    },
    #[clap(name = "maintain", about = "Purge expired pickup codes and release stale artifacts on an interval")]
    Maintain(MaintainParams),
}

#[derive(Debug, Args)]
pub struct SettleParams {
    /// The shop to settle
    #[arg(short = 's', long = "shop", required_unless_present = "all", conflicts_with = "all")]
    shop: Option<String>,
    /// Settle every shop that has unsettled earnings
    #[arg(short = 'a', long = "all")]
    all: bool,
}

#[derive(Debug, Args)]
pub struct MaintainParams {
    /// The directory that artifact references are relative to. Without it, stale artifacts are only cleared from the
    /// ledger and the files are left alone.
    #[arg(short = 'r', long = "artifact-root")]
    artifact_root: Option<PathBuf>,
    /// Run a single pass and exit
    #[arg(long = "once")]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    let mut config = LedgerConfig::from_env()?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections).await?;
    let admin = Actor::Admin(ADMIN_ID.to_string());
    let settlement = SettlementApi::new(db.clone(), EventProducers::default());
    match cli.command {
        Command::Migrate => {
            db.migrate().await?;
            println!("Database {} is up to date", config.database_url);
        },
        Command::Unsettled { shop } => {
            let balances = match shop {
                Some(shop) => settlement.unsettled_balances(&Actor::Shop(shop)).await?,
                None => settlement.unsettled_balances(&admin).await?,
            };
            println!("{}", format_balances(&balances));
        },
        Command::Settle(params) => {
            let shops = match params.shop {
                Some(shop) => vec![shop],
                None => settlement.unsettled_balances(&admin).await?.into_iter().map(|b| b.shop_id).collect(),
            };
            if shops.is_empty() {
                println!("No shop has unsettled earnings");
            }
            for shop in shops {
                match settlement.settle(&admin, &shop).await {
                    Ok(result) => println!("{}", format_settlement(&result)?),
                    Err(LedgerError::NothingToSettle(id)) => println!("Shop {id} has nothing to settle"),
                    Err(e) => {
                        error!("Settlement of shop {shop} failed. {e}");
                        return Err(e.into());
                    },
                }
            }
        },
        Command::Summary { shop } => {
            let summary = settlement.earnings_summary(&admin, &shop).await?;
            println!("{}", format_summary(&shop, &summary)?);
        },
        Command::Maintain(params) => match params.artifact_root {
            Some(root) => run_maintenance_worker(db, DirectoryArtifactStore::new(root), &config, params.once).await?,
            None => run_maintenance_worker(db, NoopArtifactStore, &config, params.once).await?,
        },
    }
    Ok(())
}
