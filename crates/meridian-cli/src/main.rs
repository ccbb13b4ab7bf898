//! MERIDIAN - corporate due-diligence investigations from the command line
//!
//! ## Commands
//!
//! - `investigate`: run a full investigation and stream its progress
//! - `show`: print a stored investigation
//! - `list`: list recent investigations
//! - `search`: look up entities by name or alias
//! - `query`: run a raw SurrealQL statement against the data store
//! - `seed`: load demo records from a JSON file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use meridian_core::{
    get_investigation, init_tracing, list_investigations, search_entities, Collections,
    GeminiClient, InvestigationEvent, MeridianConfig, Orchestrator,
};
use meridian_state::{AggregateQuery, DataStore, StoreConfig, SurrealDataStore};
use serde_json::Value;
use tracing::{info, Level};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "meridian")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MERIDIAN due-diligence investigation engine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Investigate a company and stream progress events
    Investigate {
        /// Company name as free text
        target: String,

        /// Investigation id; re-using a completed id replays its verdict
        #[arg(long)]
        id: Option<String>,

        /// Output format for progress events
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Reasoning model override
        #[arg(long)]
        model: Option<String>,
    },

    /// Print a stored investigation as JSON
    Show {
        /// Investigation id
        id: String,
    },

    /// List recent investigations, newest first
    List {
        /// Maximum number of investigations to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Search entities by name or alias
    Search {
        /// Text to match
        query: String,

        /// Maximum number of entities to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Run a SurrealQL statement and print the resulting rows
    Query {
        /// Statement to execute
        statement: String,
    },

    /// Load demo records: a JSON object of collection name to documents
    Seed {
        /// Path to the JSON file
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable progress
    Text,
    /// One JSON event per line
    Json,
    /// Server-sent-events frames
    Sse,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let config = MeridianConfig::from_env().context("Invalid MERIDIAN configuration")?;
    let store = Arc::new(
        SurrealDataStore::connect(&StoreConfig::from_env(), &config.collections.specs())
            .await
            .context("Failed to connect to the MERIDIAN data store")?,
    );

    match cli.command {
        Commands::Investigate {
            target,
            id,
            format,
            model,
        } => {
            let mut config = config;
            if let Some(model) = model {
                config.reasoning.model = model;
            }
            cmd_investigate(config, store, &target, id, format).await
        }
        Commands::Show { id } => cmd_show(store.as_ref(), &config.collections, &id).await,
        Commands::List { limit } => cmd_list(store.as_ref(), &config.collections, limit).await,
        Commands::Search { query, limit } => {
            cmd_search(store.as_ref(), &config.collections, &query, limit).await
        }
        Commands::Query { statement } => cmd_query(store.as_ref(), &statement).await,
        Commands::Seed { file } => cmd_seed(store.as_ref(), &config.collections, &file).await,
    }
}

/// Run an investigation and print every event as it arrives.
async fn cmd_investigate(
    config: MeridianConfig,
    store: Arc<SurrealDataStore>,
    target: &str,
    id: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let reasoner = Arc::new(
        GeminiClient::new(&config.reasoning).context("Failed to configure the reasoning engine")?,
    );
    let orchestrator = Orchestrator::standard(config, store, reasoner)?;
    let mut events = orchestrator.investigate(target, id).await?;

    while let Some(event) = events.next().await {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string(&event)?),
            OutputFormat::Sse => print!("{}", event.to_sse_frame()?),
            OutputFormat::Text => print!("{}", render_text(&event)),
        }
    }
    Ok(())
}

fn render_text(event: &InvestigationEvent) -> String {
    match event {
        InvestigationEvent::InvestigationStarted {
            investigation_id,
            target,
            ..
        } => format!("Investigating '{target}' ({investigation_id})\n"),
        InvestigationEvent::AgentStarted { agent } => format!("  → {agent}\n"),
        InvestigationEvent::AgentComplete(summary) => {
            let mut out = format!(
                "  ✓ {} [{}] risk {:.1}\n",
                summary.agent, summary.status, summary.risk_score
            );
            for flag in &summary.red_flags {
                out.push_str(&format!("      ! {flag}\n"));
            }
            out
        }
        InvestigationEvent::InvestigationComplete {
            overall_risk_score,
            risk_level,
            weighted_score,
            executive_summary,
            top_red_flags,
            recommended_actions,
            proceed_recommendation,
            score_divergence,
            ..
        } => {
            let mut out = String::from("\n");
            out.push_str(&format!(
                "Overall risk: {overall_risk_score:.2} ({risk_level}), weighted {weighted_score:.2}\n"
            ));
            out.push_str(&format!("Recommendation: {proceed_recommendation}\n"));
            if let Some(d) = score_divergence {
                out.push_str(&format!(
                    "Note: engine score {:.2} diverges from weighted score {:.2} by {:.2}\n",
                    d.engine_score, d.weighted_score, d.delta
                ));
            }
            if !executive_summary.is_empty() {
                out.push_str(&format!("\n{executive_summary}\n"));
            }
            if !top_red_flags.is_empty() {
                out.push_str("\nRed flags:\n");
                for flag in top_red_flags {
                    out.push_str(&format!("  - {flag}\n"));
                }
            }
            if !recommended_actions.is_empty() {
                out.push_str("\nRecommended actions:\n");
                for action in recommended_actions {
                    out.push_str(&format!("  - {action}\n"));
                }
            }
            out
        }
        InvestigationEvent::StreamEnd => String::new(),
    }
}

async fn cmd_show(store: &dyn DataStore, collections: &Collections, id: &str) -> Result<()> {
    let Some(investigation) = get_investigation(store, collections, id).await? else {
        bail!("Investigation '{}' not found", id);
    };
    println!("{}", serde_json::to_string_pretty(&investigation)?);
    Ok(())
}

async fn cmd_list(store: &dyn DataStore, collections: &Collections, limit: usize) -> Result<()> {
    let investigations = list_investigations(store, collections, limit).await?;
    if investigations.is_empty() {
        println!("No investigations yet");
        return Ok(());
    }

    for inv in investigations {
        let score = inv
            .overall_risk_score
            .map(|s| format!("{s:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let level = inv
            .risk_level
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {}  {:<8}  {:>5}  {:<8}  {}",
            inv.investigation_id,
            inv.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            if inv.is_complete() { "complete" } else { "running" },
            score,
            level,
            inv.target_name,
        );
    }
    Ok(())
}

async fn cmd_search(
    store: &dyn DataStore,
    collections: &Collections,
    query: &str,
    limit: usize,
) -> Result<()> {
    let entities = search_entities(store, collections, query, limit).await?;
    if entities.is_empty() {
        println!("No entities match '{}'", query);
        return Ok(());
    }

    for entity in entities {
        let text = |field: &str| entity.get(field).and_then(Value::as_str).unwrap_or("-").to_string();
        println!(
            "{}  {}  [{}]  {}",
            text("entity_id"),
            text("name"),
            text("jurisdiction"),
            text("status"),
        );
    }
    Ok(())
}

async fn cmd_query(store: &dyn DataStore, statement: &str) -> Result<()> {
    let rows = store
        .aggregate(&AggregateQuery::new(statement))
        .await
        .context("Query failed")?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

async fn cmd_seed(store: &dyn DataStore, collections: &Collections, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read seed file: {:?}", file))?;
    let data: Value = serde_json::from_str(&content)
        .with_context(|| format!("Seed file is not valid JSON: {:?}", file))?;

    let counts = seed(store, collections, data).await?;
    for (collection, count) in &counts {
        println!("Seeded {count} document(s) into {collection}");
    }
    Ok(())
}

/// Write every document under its natural id, or a fresh UUID when the
/// collection has none or the document lacks it.
async fn seed(
    store: &dyn DataStore,
    collections: &Collections,
    data: Value,
) -> Result<BTreeMap<String, usize>> {
    let Value::Object(by_collection) = data else {
        bail!("Seed data must be a JSON object of collection name to documents");
    };

    let mut counts = BTreeMap::new();
    for (collection, docs) in by_collection {
        let Value::Array(docs) = docs else {
            bail!("Seed entry '{}' must be an array of documents", collection);
        };
        let id_field = collections.id_field(&collection);
        for doc in docs {
            let id = id_field
                .and_then(|field| doc.get(field))
                .and_then(|v| match v {
                    Value::String(s) if !s.is_empty() => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            store
                .put(&collection, &id, doc)
                .await
                .with_context(|| format!("Failed to store {collection}:{id}"))?;
            *counts.entry(collection.clone()).or_insert(0) += 1;
        }
        info!(collection = %collection, count = counts.get(&collection).copied().unwrap_or(0), "seeded");
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::{Finding, Investigation, RiskLevel, TaskStatus};
    use serde_json::json;

    async fn store() -> SurrealDataStore {
        SurrealDataStore::in_memory(&Collections::default().specs())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn seed_uses_natural_ids() {
        let store = store().await;
        let collections = Collections::default();
        let counts = seed(
            &store,
            &collections,
            json!({
                "entities": [
                    {"entity_id": "E-1", "name": "Acme Holdings", "aliases": ["Acme"]},
                    {"entity_id": "E-2", "name": "Acme BVI Ltd", "parent_entity_id": "E-1"}
                ],
                "news": [{"title": "No id here"}]
            }),
        )
        .await
        .unwrap();

        assert_eq!(counts["entities"], 2);
        assert_eq!(counts["news"], 1);
        let acme = store.get("entities", "E-1").await.unwrap().unwrap();
        assert_eq!(acme["name"], "Acme Holdings");

        let hits = search_entities(&store, &collections, "acme", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn seed_rejects_non_object() {
        let store = store().await;
        let err = seed(&store, &Collections::default(), json!([1, 2]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }

    #[tokio::test]
    async fn seed_file_round_trips_through_show() {
        let store = store().await;
        let collections = Collections::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        let mut record = Investigation::start("inv-seeded", "Acme Corp");
        record.findings.push(Finding::running("Financial Signal"));
        std::fs::write(
            &path,
            serde_json::to_string(&json!({ "investigations": [record] })).unwrap(),
        )
        .unwrap();

        cmd_seed(&store, &collections, &path).await.unwrap();

        let loaded = get_investigation(&store, &collections, "inv-seeded")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.target_name, "Acme Corp");
        assert_eq!(loaded.findings[0].status(), TaskStatus::Running);
        assert!(cmd_show(&store, &collections, "missing").await.is_err());
    }

    #[test]
    fn text_rendering_lists_flags() {
        let mut finding = Finding::running("Legal Intelligence");
        finding
            .complete("Sanctioned", 9.0, vec!["OFAC listing".into()])
            .unwrap();
        let text = render_text(&InvestigationEvent::agent_complete(&finding));
        assert!(text.contains("Legal Intelligence [complete] risk 9.0"));
        assert!(text.contains("! OFAC listing"));
        assert_eq!(render_text(&InvestigationEvent::StreamEnd), "");
        assert_eq!(RiskLevel::from_score(9.0).to_string(), "CRITICAL");
    }

    #[test]
    fn cli_parses_investigate_flags() {
        let cli = Cli::try_parse_from([
            "meridian", "--json", "investigate", "Acme Corp", "--id", "inv-1", "--format", "sse",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Investigate { target, id, format, .. } => {
                assert_eq!(target, "Acme Corp");
                assert_eq!(id.as_deref(), Some("inv-1"));
                assert_eq!(format, OutputFormat::Sse);
            }
            _ => panic!("expected investigate"),
        }
    }
}
