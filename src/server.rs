//! Accept connections and answer one clustering request on each of them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::Rng;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::kmeans::{EmptyClusterPolicy, KMeans};
use crate::protocol::{DEFAULT_MAX_MESSAGE_BYTES, Request, Response, read_message, write_message};
use crate::sampling::SeedSource;
use crate::utils::{as_continuous_vec, as_matrix};

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub addr: String,
    /// Connections handled at the same time, the others wait to be accepted.
    pub max_connections: usize,
    /// Deadline for receiving the whole request.
    pub read_timeout: Duration,
    /// Deadline for sending the whole response.
    pub write_timeout: Duration,
    /// Largest request accepted, in bytes.
    pub max_message_bytes: usize,
    /// Seed of the process-wide random source, taken from the OS if `None`.
    pub seed: Option<u64>,
    /// Opt-in early stop, `None` always runs the requested iterations.
    pub tolerance: Option<f64>,
    /// Handling of clusters that lose all their points.
    pub empty_cluster: EmptyClusterPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:12345".to_string(),
            max_connections: 64,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            seed: None,
            tolerance: None,
            empty_cluster: EmptyClusterPolicy::default(),
        }
    }
}

impl ServerConfig {
    fn kmeans(&self, request: &Request) -> KMeans {
        let kmeans = KMeans::new(request.k, request.max_iterations)
            .with_empty_cluster_policy(self.empty_cluster);
        match self.tolerance {
            Some(tolerance) => kmeans.with_tolerance(tolerance),
            None => kmeans,
        }
    }
}

/// Run the clustering described by one request.
pub fn process<R: Rng>(request: &Request, kmeans: &KMeans, rng: &mut R) -> Result<Response> {
    let dim = match request.data.first() {
        Some(row) => row.len(),
        None => return Err(Error::InvalidParameter("empty dataset".into())),
    };
    if let Some(i) = request.data.iter().position(|row| row.len() != dim) {
        return Err(Error::InvalidParameter(format!(
            "row {} has {} values, expect {}",
            i,
            request.data[i].len(),
            dim
        )));
    }
    let vecs = as_continuous_vec(&request.data);
    let clustering = kmeans.fit(&vecs, dim, rng)?;
    check_finite(&clustering.centroids, clustering.dim)?;
    Ok(Response {
        centroids: as_matrix(&clustering.centroids, clustering.dim),
        assignments: clustering.labels,
    })
}

/// JSON has no encoding for NaN or infinity, such a response is never sent.
fn check_finite(centroids: &[f64], dim: usize) -> Result<()> {
    match centroids
        .chunks(dim)
        .position(|c| c.iter().any(|v| !v.is_finite()))
    {
        Some(cluster) => Err(Error::NonFinite { cluster }),
        None => Ok(()),
    }
}

struct Shared {
    config: ServerConfig,
    seeds: SeedSource,
}

/// K-means server bound to a listening socket.
pub struct Server {
    listener: TcpListener,
    shared: Arc<Shared>,
    permits: Arc<Semaphore>,
}

impl Server {
    /// Bind the listening socket and seed the random source.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        if config.max_connections == 0 {
            return Err(Error::InvalidParameter(
                "max_connections must be greater than 0".into(),
            ));
        }
        let listener = TcpListener::bind(&config.addr).await?;
        info!("server listening on {}", listener.local_addr()?);
        let seeds = match config.seed {
            Some(seed) => SeedSource::from_seed(seed),
            None => SeedSource::from_os_rng(),
        };
        let permits = Arc::new(Semaphore::new(config.max_connections));
        Ok(Self {
            listener,
            shared: Arc::new(Shared { config, seeds }),
            permits,
        })
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is cancelled.
    ///
    /// A failed accept is logged and skipped. Each connection runs in its own
    /// task once a connection permit is available, and its errors never reach
    /// this loop.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let mut handlers = JoinSet::new();
        loop {
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!("failed to accept connection: {}", err);
                        continue;
                    }
                },
            };
            debug!("accepted connection from {}", peer);
            while handlers.try_join_next().is_some() {}

            let shared = self.shared.clone();
            let shutdown = shutdown.clone();
            handlers.spawn(async move {
                let _permit = permit;
                tokio::select! {
                    res = handle_connection(stream, &shared) => {
                        if let Err(err) = res {
                            warn!("connection {}: {}", peer, err);
                        }
                    }
                    _ = shutdown.cancelled() => {
                        warn!("connection {}: {}", peer, Error::Cancelled);
                    }
                }
            });
        }

        info!("shutting down, {} connections still open", handlers.len());
        while handlers.join_next().await.is_some() {}
        Ok(())
    }
}

/// Decode one request, cluster, encode one response.
///
/// The stream is owned here and closed when this returns, whatever the outcome.
/// Nothing is written back unless the clustering succeeded.
async fn handle_connection(mut stream: TcpStream, shared: &Shared) -> Result<()> {
    let config = &shared.config;
    let start = Instant::now();

    let request: Request = timeout(
        config.read_timeout,
        read_message(&mut stream, config.max_message_bytes),
    )
    .await
    .map_err(|_| Error::Timeout {
        operation: "reading request",
        timeout: config.read_timeout,
    })??;
    debug!(
        "request with {} points, k = {}, max iterations = {}",
        request.data.len(),
        request.k,
        request.max_iterations
    );

    let kmeans = config.kmeans(&request);
    let mut rng = shared.seeds.fork();
    let (response, request) = tokio::task::spawn_blocking(move || {
        let response = process(&request, &kmeans, &mut rng);
        (response, request)
    })
    .await?;
    let response = response?;

    timeout(config.write_timeout, async {
        write_message(&mut stream, &response).await?;
        stream.shutdown().await?;
        Ok::<_, Error>(())
    })
    .await
    .map_err(|_| Error::Timeout {
        operation: "writing response",
        timeout: config.write_timeout,
    })??;

    info!(
        "clustered {} points into {} clusters in {} s",
        request.data.len(),
        request.k,
        start.elapsed().as_secs_f32()
    );
    Ok(())
}
