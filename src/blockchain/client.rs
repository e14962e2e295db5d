use crate::blockchain::models::{
    BlockResult, BlockResultsResult, RawBlock, RawTx, RpcResponse, RpcTx, StatusResult,
    TxResult, TxSearchResult,
};
use crate::config::RpcSettings;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const TX_SEARCH_PAGE_SIZE: usize = 100;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl ClientError {
    /// Transport problems and node-side errors are worth retrying; a
    /// definite "not found" or a rejected request is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(e) => !e
                .status()
                .map(|s| s.is_client_error() && s != StatusCode::TOO_MANY_REQUESTS)
                .unwrap_or(false),
            ClientError::Rpc { .. } | ClientError::Malformed(_) => true,
            ClientError::NotFound(_) => false,
        }
    }
}

/// Read access to a node's RPC surface.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn current_height(&self) -> Result<u64, ClientError>;

    async fn block(&self, height: u64) -> Result<RawBlock, ClientError>;

    /// Execution results of every transaction in the block, in block order.
    async fn block_results(&self, height: u64) -> Result<Vec<TxResult>, ClientError>;

    /// All indexed transactions at a height.
    async fn tx_search(&self, height: u64) -> Result<Vec<RawTx>, ClientError>;

    async fn raw_transaction(&self, hash: &str) -> Result<RawTx, ClientError>;
}

fn build_limiter(settings: &RpcSettings) -> Option<Arc<DefaultDirectRateLimiter>> {
    settings
        .rate_limit
        .and_then(NonZeroU32::new)
        .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))))
}

pub fn build_backoff(settings: &RpcSettings) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(settings.max_delay)
        .with_max_times(settings.max_retries)
}

/// Shared HTTP plumbing: timeout, optional rate limit and retry.
#[derive(Clone)]
struct Transport {
    http: reqwest::Client,
    base_url: String,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    backoff: ExponentialBuilder,
}

impl Transport {
    fn new(base_url: &str, settings: &RpcSettings) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: build_limiter(settings),
            backoff: build_backoff(settings),
        })
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self.http.get(&url).query(query).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(url));
        }
        Ok(response.error_for_status()?.json::<T>().await?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        (|| self.get_once::<T>(path, query))
            .retry(self.backoff)
            .when(ClientError::is_retryable)
            .notify(|err: &ClientError, dur: Duration| {
                warn!("Request to {} failed: {}. Retrying in {:?}", path, err, dur);
            })
            .await
    }
}

/// CometBFT JSON-RPC client over HTTP.
pub struct CometClient {
    transport: Transport,
}

impl CometClient {
    pub fn new(rpc_url: &str, settings: &RpcSettings) -> Result<Self, ClientError> {
        info!("Initializing CometBFT client with RPC endpoint: {}", rpc_url);
        Ok(Self {
            transport: Transport::new(rpc_url, settings)?,
        })
    }

    async fn rpc<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let response: RpcResponse<T> = self.transport.get(method, query).await?;
        match (response.result, response.error) {
            (_, Some(err)) if err.data.as_deref().is_some_and(|d| d.contains("not found")) => {
                Err(ClientError::NotFound(err.data.unwrap_or_default()))
            }
            (_, Some(err)) => Err(ClientError::Rpc {
                code: err.code,
                message: match err.data {
                    Some(data) => format!("{}: {}", err.message, data),
                    None => err.message,
                },
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ClientError::Malformed(format!("{} returned no result", method))),
        }
    }

    async fn tx_search_page(&self, height: u64, page: usize) -> Result<TxSearchResult, ClientError> {
        self.rpc(
            "tx_search",
            &[
                ("query", format!("\"tx.height={}\"", height)),
                ("page", page.to_string()),
                ("per_page", TX_SEARCH_PAGE_SIZE.to_string()),
                ("order_by", "\"asc\"".to_string()),
            ],
        )
        .await
    }
}

#[async_trait]
impl ChainClient for CometClient {
    async fn current_height(&self) -> Result<u64, ClientError> {
        let status: StatusResult = self.rpc("status", &[]).await?;
        Ok(status.sync_info.latest_block_height.max(0) as u64)
    }

    async fn block(&self, height: u64) -> Result<RawBlock, ClientError> {
        let result: BlockResult = self.rpc("block", &[("height", height.to_string())]).await?;
        RawBlock::from_rpc(result.block, Some(result.block_id.hash))
    }

    async fn block_results(&self, height: u64) -> Result<Vec<TxResult>, ClientError> {
        let result: BlockResultsResult = self
            .rpc("block_results", &[("height", height.to_string())])
            .await?;
        Ok(result.txs_results.unwrap_or_default())
    }

    async fn tx_search(&self, height: u64) -> Result<Vec<RawTx>, ClientError> {
        let mut txs: Vec<RawTx> = Vec::new();
        let mut page = 1;
        loop {
            let result = self.tx_search_page(height, page).await?;
            let fetched = result.txs.len();
            txs.extend(result.txs.into_iter().map(RawTx::from));
            if fetched == 0 || txs.len() as i64 >= result.total_count {
                break;
            }
            page += 1;
        }
        debug!("tx_search at height {} returned {} transactions", height, txs.len());
        Ok(txs)
    }

    async fn raw_transaction(&self, hash: &str) -> Result<RawTx, ClientError> {
        let hash = hash.trim_start_matches("0x");
        let tx: RpcTx = self.rpc("tx", &[("hash", format!("0x{}", hash))]).await?;
        Ok(tx.into())
    }
}

/// Cosmos REST (LCD) client used by the resolvers.
pub struct RestClient {
    transport: Transport,
}

impl RestClient {
    pub fn new(rest_url: &str, settings: &RpcSettings) -> Result<Self, ClientError> {
        info!("Initializing REST client with endpoint: {}", rest_url);
        Ok(Self {
            transport: Transport::new(rest_url, settings)?,
        })
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        self.transport.get(path, query).await
    }
}
