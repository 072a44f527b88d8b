//! Binary entry point for the Graphion route server and its admin commands.
#![forbid(unsafe_code)]

use std::error::Error;
use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use graphion::{
    config::{ConfigOverrides, ServerConfig},
    import::import_edges_csv,
    logging::init_logging,
    server::{self, open_service},
    CostModel, EdgeUpdate, NodeId, SqliteEdgeStore,
};

#[derive(Parser, Debug)]
#[command(
    name = "graphion",
    version,
    about = "Shortest-path route server over a SQLite road network",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Server config file (defaults to $GRAPHION_CONFIG or the platform config dir)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "GRAPHION_DB",
        value_name = "DB",
        help = "SQLite database holding the edges table"
    )]
    database: Option<PathBuf>,

    #[arg(long, global = true, help = "tracing filter directive (RUST_LOG wins)")]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP route server.
    Serve(ServeCmd),
    /// Load edges from a CSV file into the database.
    Import(ImportCmd),
    /// Compute one route and print it as JSON.
    Route(RouteCmd),
    /// Apply one edge update and print the acknowledgement.
    Update(UpdateCmd),
}

#[derive(Args, Debug)]
struct ServeCmd {
    #[arg(long, value_name = "HOST", help = "Bind address host")]
    host: Option<IpAddr>,

    #[arg(long, value_name = "PORT", help = "Bind port")]
    port: Option<u16>,

    #[arg(long, value_name = "ENTRIES", help = "Adjacency cache capacity")]
    adjacency_capacity: Option<usize>,

    #[arg(long, value_enum, help = "Edge cost policy")]
    cost_model: Option<CostModel>,
}

#[derive(Args, Debug)]
struct ImportCmd {
    #[arg(
        long,
        value_name = "FILE",
        help = "CSV with src_node,dst_node,distance_m,speed_kmph[,closed]"
    )]
    edges: PathBuf,
}

#[derive(Args, Debug)]
struct RouteCmd {
    #[arg(value_name = "SRC")]
    src: NodeId,

    #[arg(value_name = "DST")]
    dst: NodeId,

    #[arg(long, value_enum, help = "Edge cost policy")]
    cost_model: Option<CostModel>,
}

#[derive(Args, Debug)]
struct UpdateCmd {
    #[arg(value_name = "EDGE")]
    edge_id: i64,

    #[arg(long, value_name = "KMPH", help = "New speed")]
    speed: Option<u32>,

    #[arg(long, value_name = "BOOL", help = "New closure flag")]
    closed: Option<bool>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let mut config = ServerConfig::load(cli.config.as_deref())?;
    let mut overrides = ConfigOverrides {
        database: cli.database,
        log_filter: cli.log,
        ..ConfigOverrides::default()
    };

    match cli.command {
        Command::Serve(cmd) => {
            overrides.host = cmd.host;
            overrides.port = cmd.port;
            overrides.adjacency_capacity = cmd.adjacency_capacity;
            overrides.cost_model = cmd.cost_model;
            config.apply(overrides);
            init_logging(&config.log_filter);
            if let Err(err) = server::serve(config).await {
                tracing::error!(%err, "route server terminated");
                return Err(Box::new(err));
            }
        }
        Command::Import(cmd) => {
            config.apply(overrides);
            init_logging(&config.log_filter);
            let store = SqliteEdgeStore::open(&config.database, config.store_options())?;
            let summary = import_edges_csv(&cmd.edges, &store)?;
            println!(
                "Imported {} edges ({} closed) into {}",
                summary.edges_imported,
                summary.closed_edges,
                config.database.display()
            );
        }
        Command::Route(cmd) => {
            overrides.cost_model = cmd.cost_model;
            config.apply(overrides);
            init_logging(&config.log_filter);
            let service = open_service(&config)?;
            let response = service.route(cmd.src, cmd.dst)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Update(cmd) => {
            config.apply(overrides);
            init_logging(&config.log_filter);
            let service = open_service(&config)?;
            let mut update = EdgeUpdate::new(cmd.edge_id);
            update.speed_kmph = cmd.speed;
            update.closed = cmd.closed;
            let ack = service.update_edge(&update)?;
            println!("{}", serde_json::to_string_pretty(&ack)?);
        }
    }

    Ok(())
}
