use std::process::ExitCode;
use std::time::Duration;

use argh::FromArgs;
use env_logger::Env;
use kcluster::{Error, Result};
use kcluster::client::submit;
use kcluster::dataset::{read_table, write_results};
use kcluster::kmeans::EmptyClusterPolicy;
use kcluster::protocol::Request;
use kcluster::server::{Server, ServerConfig};
use log::{error, info};
use tokio_util::sync::CancellationToken;

#[derive(FromArgs)]
/// K-means clustering over a TCP socket.
struct Args {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Serve(ServeArgs),
    Submit(SubmitArgs),
}

#[derive(FromArgs)]
/// Run the clustering server until interrupted.
#[argh(subcommand, name = "serve")]
struct ServeArgs {
    /// address to listen on
    #[argh(option, default = "String::from(\"0.0.0.0:12345\")")]
    addr: String,

    /// connections handled at the same time
    #[argh(option, default = "64")]
    max_connections: usize,

    /// read and write deadline of one connection, in seconds
    #[argh(option, default = "30")]
    timeout_secs: u64,

    /// largest accepted request, in MiB
    #[argh(option, default = "64")]
    max_message_mib: usize,

    /// seed of the random source, random if absent
    #[argh(option)]
    seed: Option<u64>,

    /// stop early once the centroid shift falls below this value
    #[argh(option)]
    tolerance: Option<f64>,

    /// keep the previous centroid of an empty cluster instead of moving it
    /// to the farthest point
    #[argh(switch)]
    retain_empty: bool,
}

#[derive(FromArgs)]
/// Cluster a CSV file on a running server.
#[argh(subcommand, name = "submit")]
struct SubmitArgs {
    /// address of the server
    #[argh(option, default = "String::from(\"localhost:12345\")")]
    addr: String,

    /// input CSV, header row first and record identifiers in the first column
    #[argh(option, default = "String::from(\"dataset.csv\")")]
    input: String,

    /// output CSV with the cluster column appended
    #[argh(option, default = "String::from(\"resultados.csv\")")]
    output: String,

    /// number of clusters
    #[argh(option, short = 'k', default = "3")]
    k: u32,

    /// number of assign/update rounds
    #[argh(option, default = "100")]
    max_iter: u32,

    /// deadline of the whole exchange, in seconds
    #[argh(option, default = "300")]
    timeout_secs: u64,
}

fn message_limit(mib: usize) -> Result<usize> {
    mib.checked_mul(1 << 20).ok_or_else(|| {
        Error::InvalidParameter(format!("message limit of {} MiB does not fit in memory", mib))
    })
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = ServerConfig {
        addr: args.addr,
        max_connections: args.max_connections,
        read_timeout: Duration::from_secs(args.timeout_secs),
        write_timeout: Duration::from_secs(args.timeout_secs),
        max_message_bytes: message_limit(args.max_message_mib)?,
        seed: args.seed,
        tolerance: args.tolerance,
        empty_cluster: match args.retain_empty {
            true => EmptyClusterPolicy::Retain,
            false => EmptyClusterPolicy::FarthestPoint,
        },
    };
    let server = Server::bind(config).await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt, shutting down");
            signal.cancel();
        }
    });
    server.run(shutdown).await
}

async fn cluster_file(args: SubmitArgs) -> Result<()> {
    let table = read_table(&args.input)?;
    let request = Request {
        data: table.rows.clone(),
        k: args.k,
        max_iterations: args.max_iter,
    };
    let response = submit(
        args.addr.as_str(),
        &request,
        Duration::from_secs(args.timeout_secs),
    )
    .await?;
    write_results(&args.output, &table, &response.assignments)?;

    println!("results written to {}", args.output);
    println!("centroids:");
    for centroid in &response.centroids {
        println!("{:?}", centroid);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    let args: Args = argh::from_env();
    let res = match args.command {
        Command::Serve(args) => serve(args).await,
        Command::Submit(args) => cluster_file(args).await,
    };
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
