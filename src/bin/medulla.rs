//! Medulla CLI: merge extraction batches into the knowledge graph.
//!
//! Usage:
//!   medulla merge <batch.json> [--db path] [--config path] [--tier ai-extracted] [--audit out.json]
//!   medulla stats [--db path]

use clap::{Parser, Subcommand, ValueEnum};
use medulla::{
    decode_batch, AuditLog, GraphStore, MergeConfig, MergeCoordinator, OpenStore, SourceTier,
    SqliteStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "medulla",
    version,
    about = "Biomedical knowledge graph merge engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a batch of extraction documents into the graph
    Merge {
        /// Path to the JSON batch file
        batch: PathBuf,
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
        /// Path to a YAML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Evidence tier of the batch
        #[arg(long, value_enum, default_value_t = TierArg::AiExtracted)]
        tier: TierArg,
        /// Write the full audit trail as JSON to this path
        #[arg(long)]
        audit: Option<PathBuf>,
    },
    /// Show entity and relationship counts
    Stats {
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    Curated,
    AiExtracted,
    Unverified,
}

impl From<TierArg> for SourceTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Curated => SourceTier::Curated,
            TierArg::AiExtracted => SourceTier::AiExtracted,
            TierArg::Unverified => SourceTier::Unverified,
        }
    }
}

/// Get the default database path (~/.local/share/medulla/medulla.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let medulla_dir = data_dir.join("medulla");
    std::fs::create_dir_all(&medulla_dir).ok();
    medulla_dir.join("medulla.db")
}

fn open_store(db: Option<PathBuf>) -> Result<SqliteStore, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))
}

fn write_audit(path: &Path, audit: &AuditLog) -> Result<(), String> {
    let json = serde_json::to_string_pretty(audit.records()).map_err(|e| e.to_string())?;
    std::fs::write(path, json).map_err(|e| e.to_string())
}

async fn cmd_merge(
    batch: &Path,
    db: Option<PathBuf>,
    config_path: Option<PathBuf>,
    tier: SourceTier,
    audit_path: Option<PathBuf>,
) -> i32 {
    let config = match config_path {
        Some(path) => match MergeConfig::from_yaml_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: cannot load '{}': {}", path.display(), e);
                return 1;
            }
        },
        None => MergeConfig::default(),
    };

    let json = match std::fs::read_to_string(batch) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", batch.display(), e);
            return 1;
        }
    };
    let decoded = match decode_batch(&json, tier, &config) {
        Ok(decoded) => decoded,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    for failure in &decoded.failures {
        eprintln!(
            "Warning: document '{}' not decoded: {}",
            failure.document_id, failure.error
        );
    }

    let store = match open_store(db) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let coordinator = MergeCoordinator::new(Arc::new(store), &config);

    let mut report = coordinator.process_batch(&decoded.documents).await;
    report.summary.documents_failed += decoded.failures.len() as u64;
    print!("{}", report.summary);

    if let Some(path) = audit_path {
        if let Err(e) = write_audit(&path, &report.audit) {
            eprintln!("Error: cannot write audit trail: {}", e);
            return 1;
        }
        println!("Audit trail written to {}", path.display());
    }

    if report.summary.deferred > 0 {
        eprintln!("Error: the store became unavailable; deferred candidates were not committed");
        2
    } else {
        0
    }
}

async fn cmd_stats(db: Option<PathBuf>) -> i32 {
    let store = match open_store(db) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let nodes = match store.count_nodes().await {
        Ok(counts) => counts,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let edges = match store.count_edges().await {
        Ok(counts) => counts,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    println!("{:<28}  {:>8}", "ENTITY TYPE", "COUNT");
    println!("{}", "-".repeat(38));
    for (entity_type, count) in &nodes {
        println!("{:<28}  {:>8}", entity_type.as_label(), count);
    }
    let node_total: u64 = nodes.iter().map(|(_, count)| count).sum();
    println!("{:<28}  {:>8}", "total", node_total);

    println!();
    println!("{:<28}  {:>8}", "RELATIONSHIP KIND", "COUNT");
    println!("{}", "-".repeat(38));
    for (kind, count) in &edges {
        println!("{:<28}  {:>8}", kind.as_label(), count);
    }
    let edge_total: u64 = edges.iter().map(|(_, count)| count).sum();
    println!("{:<28}  {:>8}", "total", edge_total);
    0
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Merge {
            batch,
            db,
            config,
            tier,
            audit,
        } => cmd_merge(&batch, db, config, tier.into(), audit).await,
        Commands::Stats { db } => cmd_stats(db).await,
    };
    std::process::exit(code);
}
