// Remote price feed - live adapter and server over TCP
//
// Wire format: a 4-byte big-endian length followed by a postcard-encoded
// FeedRequest or FeedResponse. Every read opens a fresh connection so no
// answer is ever reused across admission checks.

use crate::identity::Address;
use crate::oracle::{OracleError, PriceOracle, RoundData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Upper bound on a single frame
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Seconds a server connection may wait for its next request
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// WIRE MESSAGES
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedRequest {
    LatestRound,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedResponse {
    Round { feed: Address, round: RoundData },
    Error(String),
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> std::io::Result<()> {
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds limit", len),
        ));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

// ============================================================================
// REMOTE FEED CONFIG
// ============================================================================

/// Configuration for a live feed adapter
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteFeedConfig {
    /// `host:port` of the feed server
    pub endpoint: String,
    /// Expected address of the feed behind the endpoint
    pub address: Address,
    /// Timeout for one full request/response in seconds
    pub timeout_secs: u64,
    /// Reject answers older than this many seconds
    pub max_staleness_secs: Option<u64>,
}

impl Default for RemoteFeedConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:8546".to_string(),
            address: Address::ZERO,
            timeout_secs: 10,
            max_staleness_secs: Some(3600),
        }
    }
}

impl RemoteFeedConfig {
    pub fn new(endpoint: &str, address: Address) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            address,
            ..Self::default()
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_staleness_secs(mut self, secs: Option<u64>) -> Self {
        self.max_staleness_secs = secs;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), OracleError> {
        if self.endpoint.trim().is_empty() {
            return Err(OracleError::InvalidConfig("endpoint cannot be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(OracleError::InvalidConfig("timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// REMOTE PRICE FEED
// ============================================================================

/// Live adapter that queries a feed server on every read
pub struct RemotePriceFeed {
    config: RemoteFeedConfig,
}

impl RemotePriceFeed {
    pub fn new(config: RemoteFeedConfig) -> Result<Self, OracleError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RemoteFeedConfig {
        &self.config
    }

    async fn request(&self) -> Result<FeedResponse, OracleError> {
        let mut stream = TcpStream::connect(&self.config.endpoint)
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;
        stream.set_nodelay(true).ok();

        let request = postcard::to_allocvec(&FeedRequest::LatestRound)
            .map_err(|e| OracleError::Protocol(e.to_string()))?;
        write_frame(&mut stream, &request)
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        let payload = read_frame(&mut stream)
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;
        postcard::from_bytes(&payload).map_err(|e| OracleError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl PriceOracle for RemotePriceFeed {
    fn address(&self) -> Address {
        self.config.address
    }

    async fn latest_round(&self) -> Result<RoundData, OracleError> {
        let limit = Duration::from_secs(self.config.timeout_secs);
        let response = timeout(limit, self.request())
            .await
            .map_err(|_| OracleError::Timeout)??;

        let round = match response {
            FeedResponse::Round { feed, round } => {
                if feed != self.config.address {
                    return Err(OracleError::Protocol(format!(
                        "endpoint serves feed {}, expected {}",
                        feed, self.config.address
                    )));
                }
                round
            }
            FeedResponse::Error(message) => return Err(OracleError::Unavailable(message)),
        };

        if let Some(max_age_secs) = self.config.max_staleness_secs {
            let age_secs = round.age_secs(chrono::Utc::now().timestamp());
            if age_secs > max_age_secs {
                warn!(feed = %self.config.address, age_secs, "Rejecting stale oracle answer");
                return Err(OracleError::StaleAnswer { age_secs, max_age_secs });
            }
        }

        debug!(feed = %self.config.address, round = round.round_id, answer = round.answer, "Fetched remote round");
        Ok(round)
    }
}

// ============================================================================
// PRICE FEED SERVER
// ============================================================================

/// Serves any PriceOracle to RemotePriceFeed clients
///
/// Connection tasks are owned by the accept loop, so stopping the server
/// closes every open connection too.
pub struct PriceFeedServer {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl PriceFeedServer {
    /// Bind to `bind_address` and start accepting connections
    pub async fn bind(bind_address: &str, source: Arc<dyn PriceOracle>) -> Result<Self, OracleError> {
        Self::bind_with_idle_timeout(
            bind_address,
            source,
            Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        )
        .await
    }

    /// Bind with a custom limit on how long a connection may sit without a request
    pub async fn bind_with_idle_timeout(
        bind_address: &str,
        source: Arc<dyn PriceOracle>,
        idle_timeout: Duration,
    ) -> Result<Self, OracleError> {
        if idle_timeout.is_zero() {
            return Err(OracleError::InvalidConfig(
                "idle_timeout must be > 0".to_string(),
            ));
        }

        let listener = TcpListener::bind(bind_address)
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        info!(%local_addr, feed = %source.address(), "Price feed server listening");

        let handle = tokio::spawn(async move {
            let mut connections = JoinSet::new();
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        // Reap finished connections
                        while connections.try_join_next().is_some() {}

                        let source = Arc::clone(&source);
                        connections.spawn(async move {
                            if let Err(e) = serve_connection(stream, source, idle_timeout).await {
                                debug!(%peer, error = %e, "Feed connection closed");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "Feed listener stopped");
                        break;
                    }
                }
            }
        });

        Ok(Self { local_addr, handle })
    }

    /// Socket address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `host:port` string suitable for RemoteFeedConfig
    pub fn endpoint(&self) -> String {
        self.local_addr.to_string()
    }

    /// Stop accepting connections and close the open ones
    pub fn shutdown(self) {
        info!(local_addr = %self.local_addr, "Price feed server shutting down");
        self.handle.abort();
    }
}

impl Drop for PriceFeedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    source: Arc<dyn PriceOracle>,
    idle_timeout: Duration,
) -> std::io::Result<()> {
    loop {
        let payload = match timeout(idle_timeout, read_frame(&mut stream)).await {
            Err(_) => {
                debug!("Closing idle feed connection");
                return Ok(());
            }
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Ok(Err(e)) => return Err(e),
        };

        let response = match postcard::from_bytes::<FeedRequest>(&payload) {
            Ok(FeedRequest::LatestRound) => match source.latest_round().await {
                Ok(round) => FeedResponse::Round {
                    feed: source.address(),
                    round,
                },
                Err(e) => FeedResponse::Error(e.to_string()),
            },
            Err(e) => FeedResponse::Error(format!("bad request: {}", e)),
        };

        let bytes = postcard::to_allocvec(&response)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        write_frame(&mut stream, &bytes).await?;
    }
}
