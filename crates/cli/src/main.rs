//! Depot CLI - inspect and match warehouse stock snapshots.
//!
//! # Usage
//!
//! ```bash
//! # List available lots in one box
//! depot --stock stock.json list --state available --box BOX-A
//!
//! # Rank lots against an article code, falling back to a description
//! depot --stock stock.json match "H129FSQ 104 023" --description "fresa carburo"
//!
//! # Counts and quantities by state
//! depot --stock stock.json stats
//! ```
//!
//! Output is JSON on stdout; logs go to stderr (`RUST_LOG` controls the level).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use depot_core::LotId;
use depot_infra::{DepotConfig, InMemoryLotStore, StockCatalog};
use depot_warehouse::{LotFilter, LotStateKind, MatchCandidate, MatchTier};

#[derive(Parser)]
#[command(name = "depot")]
#[command(author, version, about = "Warehouse stock inspection tools")]
struct Cli {
    /// JSON array of warehouse lots
    #[arg(long, global = true, default_value = "stock.json")]
    stock: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List lots, sorted by article code, box and id
    List {
        /// Only lots in this state (`available`, `reserved`, `sold`)
        #[arg(long)]
        state: Option<LotStateKind>,

        /// Only lots in this box
        #[arg(long = "box")]
        box_label: Option<String>,

        /// Only article codes starting with this prefix
        #[arg(long)]
        article: Option<String>,
    },
    /// Rank lots against an article code
    Match {
        query: String,

        /// Free-text description used when no code match is strong
        #[arg(short, long)]
        description: Option<String>,

        /// Maximum candidates (defaults to DEPOT_MATCH_LIMIT)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Lot ids to leave out
        #[arg(long)]
        exclude: Vec<LotId>,
    },
    /// Per-box lot counts
    Boxes,
    /// Aggregate counts and quantities by state
    Stats,
}

#[derive(Serialize)]
struct MatchRow<'a> {
    lot_id: &'a LotId,
    article_code: &'a str,
    box_label: &'a str,
    quantity: u32,
    state: LotStateKind,
    tier: MatchTier,
    score: u8,
    reason: &'a str,
}

impl<'a> From<&'a MatchCandidate> for MatchRow<'a> {
    fn from(c: &'a MatchCandidate) -> Self {
        Self {
            lot_id: c.lot.id_typed(),
            article_code: c.lot.article_code(),
            box_label: c.lot.box_label(),
            quantity: c.lot.quantity(),
            state: c.lot.state().kind(),
            tier: c.tier,
            score: c.score,
            reason: &c.reason,
        }
    }
}

#[tokio::main]
async fn main() {
    depot_observability::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = DepotConfig::from_env().context("invalid DEPOT_* configuration")?;

    let raw = tokio::fs::read_to_string(&cli.stock)
        .await
        .with_context(|| format!("reading {}", cli.stock.display()))?;
    let store = InMemoryLotStore::from_json(&raw)
        .with_context(|| format!("loading {}", cli.stock.display()))?;
    if store.is_empty() {
        tracing::warn!(path = %cli.stock.display(), "stock snapshot has no lots");
    } else {
        tracing::info!(lots = store.len(), path = %cli.stock.display(), "stock loaded");
    }

    let catalog = StockCatalog::from_config(store, &config);

    match cli.command {
        Commands::List {
            state,
            box_label,
            article,
        } => {
            let filter = LotFilter {
                state,
                box_label,
                article_prefix: article,
            };
            print_json(&catalog.list(&filter).await?)?;
        }
        Commands::Match {
            query,
            description,
            limit,
            exclude,
        } => {
            let candidates = catalog
                .match_article(&query, description.as_deref(), limit, &exclude)
                .await?;
            let rows: Vec<MatchRow<'_>> = candidates.iter().map(MatchRow::from).collect();
            print_json(&rows)?;
        }
        Commands::Boxes => print_json(&catalog.boxes().await?)?,
        Commands::Stats => print_json(&catalog.statistics().await?)?,
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
