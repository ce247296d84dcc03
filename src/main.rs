use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use swatchbook::backend::{FileStore, MemoryNavigator, Navigator, StoreError};
use swatchbook::design::DesignSystem;
use swatchbook::services::storage::{STORAGE_QUOTA_BYTES, StorageError, StorageManager, export_file_name};
use swatchbook::services::url_state::{UrlDecodeError, UrlEncodeError, UrlStateCodec, decode_design_from_href};
use swatchbook::{DesignStore, InitOutcome, PersistenceConfig, PersistenceCoordinator};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("could not open store: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("design not found: {0}")]
    NotFound(String),
    #[error("could not delete design {0}; see log for the storage error")]
    DeleteFailed(String),
    #[error("{0}")]
    Encode(#[from] UrlEncodeError),
    #[error("{}: {}", .0.tag(), .0)]
    Decode(#[from] UrlDecodeError),
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("unknown token group `{0}`")]
    UnknownGroup(String),
    #[error("no current design; save or import one first")]
    NoCurrentDesign,
}

#[derive(Parser, Debug)]
#[command(name = "swatchbook", about = "Save, share, and manage design systems")]
struct Cli {
    /// JSON file backing the design store.
    #[arg(long, env = "SWATCHBOOK_STORE", default_value = "swatchbook.json")]
    store: PathBuf,

    /// Page URL share links are built against.
    #[arg(long, env = "SWATCHBOOK_ORIGIN", default_value = "http://localhost:5173/")]
    origin: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List saved designs.
    List,
    /// Print a saved design as JSON.
    Show { id: String },
    /// Save a design system JSON file, optionally over an existing id.
    Save {
        file: PathBuf,
        #[arg(long)]
        id: Option<String>,
    },
    /// Import an export envelope.
    Import { file: PathBuf },
    /// Write an export envelope to disk.
    Export {
        id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Rename { id: String, name: String },
    Duplicate { id: String },
    Delete { id: String },
    /// Print a shareable URL for a saved design.
    Share { id: String },
    /// Decode a shared URL and save the design it carries.
    Open { url: String },
    /// Edit one token of the current design through the auto-save path.
    Set { group: String, token: String, value: String },
    /// Show approximate storage usage.
    Info,
    /// Remove every stored design and setting.
    Clear,
    /// Turn auto-save on or off.
    AutoSave { state: Toggle },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Toggle {
    On,
    Off,
}

struct Context {
    storage: Arc<StorageManager>,
    origin: String,
    config: PersistenceConfig,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    if let Err(e) = dotenvy::dotenv() {
        debug!(error = %e, "no .env loaded");
    }

    let cli = Cli::parse();
    let config = PersistenceConfig::from_env();
    let kv = FileStore::open(&cli.store, Some(STORAGE_QUOTA_BYTES))?;
    let ctx = Context {
        storage: Arc::new(StorageManager::new(Arc::new(kv), config.storage_prefix.clone())),
        origin: cli.origin,
        config,
    };

    match cli.command {
        Command::List => {
            run_list(&ctx);
            Ok(())
        }
        Command::Show { id } => {
            let saved = ctx.storage.get_design_by_id(&id).ok_or(CliError::NotFound(id))?;
            println!("{}", serde_json::to_string_pretty(&saved)?);
            Ok(())
        }
        Command::Save { file, id } => {
            let design: DesignSystem = serde_json::from_str(&fs::read_to_string(file)?)?;
            println!("{}", ctx.storage.save_to_storage(&design, id.as_deref())?);
            Ok(())
        }
        Command::Import { file } => {
            println!("{}", ctx.storage.import_design_from_json(&fs::read_to_string(file)?)?);
            Ok(())
        }
        Command::Export { id, out } => run_export(&ctx, id, out),
        Command::Rename { id, name } => {
            if !ctx.storage.rename_design(&id, &name) {
                return Err(CliError::NotFound(id));
            }
            Ok(())
        }
        Command::Duplicate { id } => {
            let copy = ctx.storage.duplicate_design(&id).ok_or(CliError::NotFound(id))?;
            println!("{copy}");
            Ok(())
        }
        Command::Delete { id } => run_delete(&ctx, id),
        Command::Share { id } => run_share(&ctx, id),
        Command::Open { url } => {
            let design = decode_design_from_href(&url)?;
            println!("{}", ctx.storage.save_to_storage(&design, None)?);
            Ok(())
        }
        Command::Set { group, token, value } => run_set(&ctx, &group, token, value).await,
        Command::Info => {
            println!("{}", serde_json::to_string_pretty(&ctx.storage.get_storage_info())?);
            Ok(())
        }
        Command::Clear => {
            ctx.storage.clear_all_data();
            Ok(())
        }
        Command::AutoSave { state } => {
            ctx.storage.set_auto_save_enabled(matches!(state, Toggle::On))?;
            Ok(())
        }
    }
}

fn run_list(ctx: &Context) {
    let current = ctx.storage.current_design_id();
    for meta in ctx.storage.get_designs_list() {
        let marker = if current.as_deref() == Some(meta.id.as_str()) { "*" } else { " " };
        println!("{marker} {}\t{}\t{}", meta.id, meta.name, meta.updated_at);
    }
}

fn run_delete(ctx: &Context, id: String) -> Result<(), CliError> {
    if !ctx.storage.delete_design(&id) {
        return Err(CliError::DeleteFailed(id));
    }
    println!("deleted {id}");
    Ok(())
}

fn run_export(ctx: &Context, id: String, out: Option<PathBuf>) -> Result<(), CliError> {
    let json = ctx
        .storage
        .export_design_as_json(&id)
        .ok_or_else(|| CliError::NotFound(id.clone()))?;
    let path = out.unwrap_or_else(|| PathBuf::from(export_file_name(&id)));
    fs::write(&path, json)?;
    println!("{}", path.display());
    Ok(())
}

fn run_share(ctx: &Context, id: String) -> Result<(), CliError> {
    let design = ctx
        .storage
        .load_from_storage(Some(&id))
        .ok_or(CliError::NotFound(id))?;
    let codec = UrlStateCodec::new(Arc::new(MemoryNavigator::new(&ctx.origin)));
    match codec.encode_design_to_url(&design) {
        Ok(encoded) => {
            println!("{}", encoded.url);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: export the design as JSON instead", e.tag());
            Err(e.into())
        }
    }
}

/// Apply one token edit to the current design and let the coordinator save it.
async fn run_set(ctx: &Context, group: &str, token: String, value: String) -> Result<(), CliError> {
    if ctx.storage.current_design_id().is_none() {
        return Err(CliError::NoCurrentDesign);
    }
    let apply = token_setter(group)?;
    if !ctx.storage.is_auto_save_enabled() {
        warn!("auto-save is off; edit not persisted (run `swatchbook auto-save on`)");
    }

    let navigator = Arc::new(MemoryNavigator::new(&ctx.origin));
    let coordinator = PersistenceCoordinator::new(
        Arc::new(DesignStore::default()),
        Arc::clone(&ctx.storage),
        Arc::new(UrlStateCodec::new(navigator.clone())),
        &ctx.config,
        Handle::current(),
    );
    if coordinator.initialize() != InitOutcome::Storage {
        return Err(CliError::NoCurrentDesign);
    }

    coordinator.store().update(|design| apply(design, token, value));
    while coordinator.has_pending_writes() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    coordinator.shutdown();

    if coordinator.url_state().has_design_in_url() {
        println!("{}", navigator.href());
    }
    Ok(())
}

type TokenSetter = Box<dyn FnOnce(&mut DesignSystem, String, String) + Send>;

fn token_setter(group: &str) -> Result<TokenSetter, CliError> {
    if let Some(scale) = group.strip_prefix("color.") {
        let scale = scale.to_owned();
        return Ok(Box::new(move |d: &mut DesignSystem, k: String, v: String| {
            d.set_color_shade(scale, k, v);
        }));
    }
    let setter: TokenSetter = match group {
        "spacing" => Box::new(|d: &mut DesignSystem, k: String, v: String| {
            d.spacing.insert(k, v.into());
        }),
        "radius" => Box::new(|d: &mut DesignSystem, k: String, v: String| {
            d.border_radius.insert(k, v.into());
        }),
        "shadow" => Box::new(|d: &mut DesignSystem, k: String, v: String| {
            d.shadows.insert(k, v.into());
        }),
        "font-family" => Box::new(|d: &mut DesignSystem, k: String, v: String| {
            d.typography.font_family.insert(k, v.into());
        }),
        "font-size" => Box::new(|d: &mut DesignSystem, k: String, v: String| {
            d.typography.font_size.insert(k, v.into());
        }),
        "line-height" => Box::new(|d: &mut DesignSystem, k: String, v: String| {
            d.typography.line_height.insert(k, v.into());
        }),
        "letter-spacing" => Box::new(|d: &mut DesignSystem, k: String, v: String| {
            d.typography.letter_spacing.insert(k, v.into());
        }),
        "duration" => Box::new(|d: &mut DesignSystem, k: String, v: String| {
            d.animation.duration.insert(k, v.into());
        }),
        "easing" => Box::new(|d: &mut DesignSystem, k: String, v: String| {
            d.animation.easing.insert(k, v.into());
        }),
        other => return Err(CliError::UnknownGroup(other.to_owned())),
    };
    Ok(setter)
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
