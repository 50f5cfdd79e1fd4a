//! Vault Object Store CLI
//!
//! Builds the record cache for a vault, inspects records, and follows live
//! file changes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing_subscriber::EnvFilter;
use vault_objects::watch::{self, VaultWatcher};
use vault_objects::{BuildReport, FsSource, Prop, RecordStore, StoreConfig};

#[derive(Parser)]
#[command(name = "vault-objects")]
#[command(about = "Inspect and follow a vault's structured records")]
struct Cli {
    /// Config file (defaults to vault.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    /// Vault root, overriding the config
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the effective configuration to a file
    Init {
        /// Destination file
        #[arg(default_value = "vault.toml")]
        path: String,
    },

    /// Load every schema and record and report failures
    Build,

    /// List registered types and their fields
    Schemas,

    /// Print one record with references resolved one level deep
    Get {
        /// Record objectId
        id: String,
    },

    /// Build, then apply file changes as they happen
    Watch,

    /// Create an empty record with a fresh objectId
    New {
        /// Schema type name
        type_name: String,
        /// Path relative to the vault root
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = StoreConfig::load_from(cli.config.as_deref()).context("loading config")?;
    if let Some(root) = cli.root {
        config.vault.root = root;
    }

    let root = config.vault_root();
    let mut store = RecordStore::new(Arc::new(FsSource::new(&root)), config.layout());

    match cli.command {
        Commands::Init { path } => {
            config.save(&path).with_context(|| format!("writing {}", path))?;
            println!("✅ Wrote configuration to {}", path);
            Ok(())
        }

        Commands::Build => {
            let report = store.build_cache()?;
            println!(
                "🔍 {} schemas, {} records loaded from {}",
                report.schemas,
                report.loaded,
                root.display()
            );
            if report.is_clean() {
                println!("✅ All records loaded");
            } else {
                print_failures(&report);
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Schemas => {
            store.build_cache()?;
            let schemas = store.get_schemas();
            for name in schemas.names() {
                if let Some(schema) = schemas.get(name) {
                    println!("{} ({})", name, schema.fields.join(", "));
                }
            }
            Ok(())
        }

        Commands::Get { id } => {
            store.build_cache()?;
            let Some(record) = store.get_record(&id) else {
                bail!("no record with objectId {}", id);
            };

            let mut doc = Map::new();
            doc.insert("type".to_string(), json!(record.type_name()));
            doc.insert("objectId".to_string(), json!(record.id().to_string()));
            doc.insert("path".to_string(), json!(record.path()));
            for (key, prop) in record.props().iter() {
                doc.insert(key.to_string(), render(prop));
            }
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }

        Commands::Watch => {
            // Subscribe first; events queue while the cache builds
            let watcher = VaultWatcher::start(&root, config.watch.clone())?;
            let report = store.build_cache()?;
            if !report.is_clean() {
                print_failures(&report);
            }
            println!(
                "👀 Watching {} ({} records)",
                watcher.root().display(),
                store.len()
            );

            while let Some(changes) = watcher.recv() {
                for change in &changes {
                    println!("   {} {}", change.action, change.path.display());
                }
                for failure in watch::apply(&mut store, changes) {
                    println!("   ❌ {}: {}", failure.path.display(), failure.error);
                }
            }
            Ok(())
        }

        Commands::New { type_name, path } => {
            store.build_cache()?;
            let id = store.create_record(&type_name, path.clone(), Map::new())?;
            println!("✅ Created {} {} at {}", type_name, id, path.display());
            Ok(())
        }
    }
}

fn print_failures(report: &BuildReport) {
    println!("❌ {} file(s) failed:", report.failures.len());
    for failure in &report.failures {
        println!("   └─ {}: {}", failure.path.display(), failure.error);
    }
}

/// Render a resolved property; referenced records become short stubs
fn render(prop: Option<Prop<'_>>) -> Value {
    match prop {
        None => Value::Null,
        Some(Prop::Record(record)) => json!({
            "objectId": record.id().to_string(),
            "type": record.type_name(),
        }),
        Some(Prop::Scalar(value)) => value.clone(),
        Some(Prop::List(list)) => Value::Array(list.iter().map(render).collect()),
        Some(Prop::Map(map)) => Value::Object(
            map.iter()
                .map(|(key, prop)| (key.to_string(), render(prop)))
                .collect(),
        ),
    }
}
