use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shot_ledger::config::LedgerConfig;
use shot_ledger::db::Database;
use shot_ledger::host::{check_compatibility, Compatibility, HostScene, HostVersion, SceneFile};
use shot_ledger::menu::{Invocation, MenuRegistry};
use shot_ledger::models::*;
use shot_ledger::tracking::{Tracker, TrackingSystem};
use shot_ledger::{api, LedgerError, VersionLedger};

type Ledger = VersionLedger<Tracker, SceneFile>;

#[derive(Parser)]
#[command(name = "shotl")]
#[command(about = "Work/publish version ledger for compositing scenes")]
struct Cli {
    /// Scene document to operate on (defaults to the work item's work file)
    #[arg(long, global = true)]
    scene: Option<PathBuf>,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the tracking HTTP service
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "17020")]
        port: u16,
    },
    /// Save the scene as the current work file of a work item
    Save { name: String },
    /// Save the scene and keep a timestamped snapshot
    SnapshotAs { name: String },
    /// Snapshot the work item the scene belongs to
    Snapshot,
    /// Publish the current version and move to the next one
    Publish {
        /// Work item to publish (defaults to the one open in the scene)
        name: Option<String>,

        #[arg(short = 'm', long, default_value = "")]
        description: String,

        /// Task to link the publish to (overrides the configured context)
        #[arg(long)]
        task: Option<String>,

        /// Publish only the scene, not its renders
        #[arg(long)]
        no_renders: bool,
    },
    /// Register a render of a work item at its current version
    Render {
        name: String,
        /// Render node in the scene
        node: String,

        #[arg(long)]
        channel: Option<String>,

        #[arg(long)]
        comment: Option<String>,
    },
    /// Set the scene frame range from the shot's cut in the tracker
    SyncFrameRange { shot: String },
    /// List versioned inputs of the scene and whether newer versions exist
    Breakdown,
    /// Update an input node to the latest available version
    Update { node: String },
    /// Show work items, or the history of one
    Status { name: Option<String> },
    /// Manage shots in the tracker
    Shot {
        #[command(subcommand)]
        command: ShotCommands,
    },
    /// Show the resolved menu
    Menu,
    /// Invoke a menu action by id
    Invoke {
        id: String,

        /// Work item, shot or node the action applies to
        #[arg(long)]
        selection: Option<String>,

        /// Publish description
        #[arg(short = 'm', long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum ShotCommands {
    /// Register a shot and its cut
    Add {
        code: String,
        cut_in: i64,
        cut_out: i64,
    },
}

/// Initialize tracing on stderr so command output on stdout stays clean
fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "shot_ledger=debug,shotl=debug,tower_http=debug"
    } else {
        "shot_ledger=info,shotl=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

/// Print a failure. Faults inside the ledger are also logged with their
/// full cause chain.
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<LedgerError>() {
        Some(e) if e.is_user_facing() => eprintln!("Error: {}", e),
        _ => {
            tracing::error!("{:?}", err);
            eprintln!("Error: {:#}", err);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = LedgerConfig::load(cli.config.as_deref())?;
    init_tracing(config.debug_logging);

    if let Some(version) = &config.host_version {
        let version: HostVersion = version.parse().map_err(anyhow::Error::msg)?;
        match check_compatibility(version, config.compatibility_dialog_min_version) {
            Compatibility::Unsupported => {
                anyhow::bail!("Host version {} is not supported", version)
            }
            Compatibility::Untested { show_dialog: true } => {
                eprintln!("Warning: host version {} has not been tested", version)
            }
            _ => {}
        }
    }

    match cli.command {
        Commands::Serve { port } => {
            let db = open_database(&config)?;
            tokio::runtime::Runtime::new()?.block_on(serve(db, port))?;
        }
        Commands::Save { ref name } => {
            let mut ledger = open_ledger(cli.scene.clone(), Some(name.as_str()), config)?;
            let item = ledger.save(name)?;
            println!("Saved {} v{:03} to {}", item.name, item.version, item.location);
        }
        Commands::SnapshotAs { ref name } => {
            let mut ledger = open_ledger(cli.scene.clone(), Some(name.as_str()), config)?;
            let snapshot = ledger.snapshot_as(name)?;
            println!("Snapshot saved to {}", snapshot.path);
        }
        Commands::Snapshot => {
            let mut ledger = open_ledger(cli.scene.clone(), None, config)?;
            let snapshot = ledger.snapshot()?;
            println!("Snapshot saved to {}", snapshot.path);
        }
        Commands::Publish {
            ref name,
            ref description,
            ref task,
            no_renders,
        } => {
            let mut ledger = open_ledger(cli.scene.clone(), name.as_deref(), config)?;
            let name = match name {
                Some(name) => name.clone(),
                None => ledger.current_work_item()?.name,
            };
            let request = PublishRequest {
                description: description.clone(),
                task: task.clone(),
                publish_type: None,
                include_renders: !no_renders,
            };
            let result = ledger.publish(&name, request)?;
            println!(
                "Published {} v{:03} to {}",
                name, result.publish.version, result.publish.path
            );
            for render in &result.renders {
                if let Some(path) = &render.published_path {
                    println!("  {} ({}) -> {}", render.node, render.channel, path);
                }
            }
            println!(
                "Now working on v{:03}: {}",
                result.work_item.version, result.work_item.location
            );
        }
        Commands::Render {
            ref name,
            ref node,
            ref channel,
            ref comment,
        } => {
            let mut ledger = open_ledger(cli.scene.clone(), Some(name.as_str()), config)?;
            let render = ledger.register_render(
                name,
                RegisterRenderInput {
                    node: node.clone(),
                    channel: channel.clone(),
                    comment: comment.clone(),
                },
            )?;
            println!(
                "{} renders {} v{:03} to {}",
                render.node, render.channel, render.version, render.path_pattern
            );
        }
        Commands::SyncFrameRange { ref shot } => {
            require_scene(&cli.scene, "sync-frame-range")?;
            let mut ledger = open_ledger(cli.scene.clone(), None, config)?;
            let sync = ledger.sync_frame_range(shot)?;
            if sync.changed {
                persist_scene(&mut ledger)?;
                println!(
                    "Frame range changed from {}-{} to {}-{}",
                    sync.previous.first, sync.previous.last, sync.current.first, sync.current.last
                );
            } else {
                println!("Frame range already matches {}", shot);
            }
        }
        Commands::Breakdown => {
            require_scene(&cli.scene, "breakdown")?;
            let ledger = open_ledger(cli.scene.clone(), None, config)?;
            let statuses = ledger.list_dependencies()?;
            if statuses.is_empty() {
                println!("No versioned inputs in the scene");
            }
            for status in statuses {
                let marker = if status.is_up_to_date { " " } else { "*" };
                println!(
                    "{} {:<16} v{:03} (latest v{:03})  {}",
                    marker,
                    status.node_path,
                    status.current_version,
                    status.latest_available_version,
                    status.path
                );
            }
        }
        Commands::Update { ref node } => {
            require_scene(&cli.scene, "update")?;
            let mut ledger = open_ledger(cli.scene.clone(), None, config)?;
            let status = ledger.update_dependency(node)?;
            persist_scene(&mut ledger)?;
            println!(
                "{} now reads v{:03}: {}",
                status.node_path, status.current_version, status.path
            );
        }
        Commands::Status { ref name } => {
            let db = open_database(&config)?;
            print_status(&db, name.as_deref())?;
        }
        Commands::Shot {
            command: ShotCommands::Add {
                ref code,
                cut_in,
                cut_out,
            },
        } => {
            let db = open_database(&config)?;
            let tracker = Tracker::from_config(&config.tracking, &db);
            let record = tracker.create_record(
                NewRecord::new(SHOT_ENTITY, code.as_str())
                    .field("cut_in", cut_in)
                    .field("cut_out", cut_out),
            )?;
            println!("Registered shot {} ({}-{}) as {}", record.code, cut_in, cut_out, record.id);
        }
        Commands::Menu => {
            print!("{}", MenuRegistry::resolve(&config).render());
        }
        Commands::Invoke {
            ref id,
            ref selection,
            ref description,
        } => {
            let registry = MenuRegistry::resolve(&config);
            let mut ledger = open_ledger(cli.scene.clone(), selection.as_deref(), config)?;
            let invocation = Invocation {
                selection: selection.clone(),
                description: description.clone(),
            };
            let message = registry.invoke(&mut ledger, id, &invocation)?;
            persist_scene(&mut ledger)?;
            println!("{}", message);
        }
    }

    Ok(())
}

async fn serve(db: Database, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting shot ledger service on port {}", port);
    let app = api::create_router(db);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Shot ledger service listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn open_database(config: &LedgerConfig) -> anyhow::Result<Database> {
    let db = match &config.tracking.database {
        Some(path) => Database::open(path.clone())?,
        None => Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

/// Open the ledger on the scene given with `--scene`, or else on the work
/// file of `work_item` when it already exists.
fn open_ledger(
    scene: Option<PathBuf>,
    work_item: Option<&str>,
    config: LedgerConfig,
) -> anyhow::Result<Ledger> {
    let db = open_database(&config)?;
    let location = match work_item {
        Some(name) => db.get_work_item(name)?.map(|item| PathBuf::from(item.location)),
        None => None,
    };
    let tracker = Tracker::from_config(&config.tracking, &db);
    let scene = SceneFile::resolve(scene, location.as_deref())?;
    Ok(VersionLedger::new(db, tracker, scene, config)?)
}

fn require_scene(scene: &Option<PathBuf>, command: &str) -> anyhow::Result<()> {
    if scene.is_none() {
        anyhow::bail!("{} works on a scene, pass it with --scene", command);
    }
    Ok(())
}

/// Write in-memory scene edits back to the scene file.
fn persist_scene(ledger: &mut Ledger) -> anyhow::Result<()> {
    if !ledger.host().is_modified() {
        return Ok(());
    }
    let Some(path) = ledger.host().scene_path().map(|p| p.to_path_buf()) else {
        anyhow::bail!("The scene was changed but is untitled, pass it with --scene");
    };
    ledger
        .host_mut()
        .save_as(&path)
        .with_context(|| format!("Failed to write scene {}", path.display()))
}

fn print_status(db: &Database, name: Option<&str>) -> anyhow::Result<()> {
    match name {
        Some(name) => {
            let history = db
                .get_work_item_history(name)?
                .ok_or_else(|| anyhow::anyhow!("Unknown work item: {}", name))?;
            let item = &history.work_item;
            println!("{} v{:03}  {}", item.name, item.version, item.location);
            for publish in &history.publishes {
                println!(
                    "  publish  v{:03}  {}  {}",
                    publish.version, publish.path, publish.description
                );
            }
            for snapshot in &history.snapshots {
                println!(
                    "  snapshot v{:03}  {}",
                    snapshot.source_version, snapshot.path
                );
            }
        }
        None => {
            let items = db.get_all_work_items()?;
            if items.is_empty() {
                println!("No work items yet");
            }
            for item in items {
                println!("{:<24} v{:03}  {}", item.name, item.version, item.location);
            }
        }
    }
    Ok(())
}
