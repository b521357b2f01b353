//! Real Bitcoin headers from the blockchain.info public API.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{HeaderFile, HeaderRecord, RecordError};

pub const DEFAULT_BASE_URL: &str = "https://blockchain.info";
pub const DEFAULT_SAMPLE_COUNT: usize = 20;
/// Heights written when the latest height cannot be looked up.
pub const FALLBACK_HEIGHTS: [u64; 3] = [0, 1, 2];
const USER_AGENT: &str = concat!("chainlab/", env!("CARGO_PKG_VERSION"));
const MAX_JITTER_SECS: f64 = 0.25;

#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub base_url: String,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
    /// Pause after each header pulled from the network.
    pub pause: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            timeout: Duration::from_secs(20),
            pause: Duration::from_millis(500),
        }
    }
}

/// Exponential backoff capped at `max_delay`, plus `jitter_secs`.
pub fn backoff_delay(config: &FetchConfig, attempt: u32, jitter_secs: f64) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    let delay = config.base_delay.saturating_mul(factor).min(config.max_delay);
    delay + Duration::from_secs_f64(jitter_secs.max(0.0))
}

#[derive(Debug, Default, Deserialize)]
pub struct BlockHeightResponse {
    #[serde(default)]
    pub blocks: Vec<HeightEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HeightEntry {
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashPick {
    pub hash: String,
    /// False when no entry carried the requested height.
    pub exact: bool,
}

/// Prefer the entry at `height`; otherwise take the first entry with a hash.
pub fn pick_block_hash(response: &BlockHeightResponse, height: u64) -> Option<HashPick> {
    let with_hash = || {
        response
            .blocks
            .iter()
            .filter_map(|b| b.hash.as_ref().filter(|h| !h.is_empty()).map(|h| (b, h)))
    };
    with_hash()
        .find(|(b, _)| b.height.and_then(|h| u64::try_from(h).ok()) == Some(height))
        .map(|(_, hash)| HashPick {
            hash: hash.clone(),
            exact: true,
        })
        .or_else(|| {
            with_hash().next().map(|(_, hash)| HashPick {
                hash: hash.clone(),
                exact: false,
            })
        })
}

/// The subset of a `rawblock` response that makes up a header.
#[derive(Debug, Default, Deserialize)]
pub struct RawBlock {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub ver: Option<i64>,
    #[serde(default)]
    pub prev_block: Option<String>,
    #[serde(default)]
    pub mrkl_root: Option<String>,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub bits: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
}

pub fn record_from_raw(raw: RawBlock) -> Result<HeaderRecord, RecordError> {
    let hash = raw.hash.unwrap_or_default();
    let record = HeaderRecord {
        name: None,
        label: Some(match raw.height {
            Some(h) => format!("Block #{h}"),
            None => "Block #?".to_string(),
        }),
        height: raw.height,
        source: Some(format!("https://www.blockchain.com/btc/block/{hash}")),
        hash: Some(hash),
        version: raw.ver,
        prev_block: raw.prev_block,
        merkle_root: raw.mrkl_root,
        timestamp: raw.time,
        bits_hex: raw.bits.map(|b| format!("{b:08x}")),
        bits: raw.bits,
    };
    // same checks the loader applies, so a bad record never reaches the file
    record.to_header()?;
    Ok(record)
}

pub fn parse_height(text: &str) -> Result<u64> {
    let text = text.trim();
    text.parse::<u64>()
        .with_context(|| format!("cannot parse latest height from {text:?}"))
}

/// Up to `n` distinct heights in `0..=latest`, ascending. Never fewer than one.
pub fn sample_from_range<R: Rng + ?Sized>(latest: u64, n: usize, rng: &mut R) -> Vec<u64> {
    let population = usize::try_from(latest).unwrap_or(usize::MAX).saturating_add(1);
    let amount = n.clamp(1, population);
    let mut heights: Vec<u64> = rand::seq::index::sample(rng, population, amount)
        .into_iter()
        .map(|i| i as u64)
        .collect();
    heights.sort_unstable();
    heights
}

/// Drop repeated heights, keeping first occurrences in order.
pub fn dedup_heights(heights: &[u64]) -> Vec<u64> {
    let mut seen = std::collections::HashSet::new();
    heights.iter().copied().filter(|h| seen.insert(*h)).collect()
}

#[derive(Clone, Debug)]
pub struct Fetcher {
    http: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .context("building http client")?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// GET with retries on 429, 5xx, timeouts and connection failures.
    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut attempt = 0;
        loop {
            let reason = match self.http.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let retryable =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if !retryable || attempt >= self.config.max_retries {
                        return resp
                            .error_for_status()
                            .with_context(|| format!("GET {url}"));
                    }
                    status.to_string()
                }
                Err(err)
                    if (err.is_timeout() || err.is_connect())
                        && attempt < self.config.max_retries =>
                {
                    err.to_string()
                }
                Err(err) => return Err(err).with_context(|| format!("GET {url}")),
            };
            let jitter = rand::thread_rng().gen_range(0.0..MAX_JITTER_SECS);
            let delay = backoff_delay(&self.config, attempt, jitter);
            warn!(%url, %reason, delay_ms = delay.as_millis() as u64, "retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    pub async fn latest_height(&self) -> Result<u64> {
        let text = self.get(&self.url("/q/getblockcount")).await?.text().await?;
        parse_height(&text)
    }

    pub async fn block_hash_at(&self, height: u64) -> Result<String> {
        let url = self.url(&format!("/block-height/{height}?format=json"));
        let response: BlockHeightResponse = self.get(&url).await?.json().await?;
        if response.blocks.is_empty() {
            bail!("no blocks listed for height {height}");
        }
        let pick = pick_block_hash(&response, height)
            .ok_or_else(|| anyhow!("no block hash listed for height {height}"))?;
        if !pick.exact {
            warn!(height, hash = %pick.hash, "no entry at requested height, using first listed block");
        }
        Ok(pick.hash)
    }

    pub async fn header_at(&self, block_hash: &str) -> Result<HeaderRecord> {
        let raw: RawBlock = self
            .get(&self.url(&format!("/rawblock/{block_hash}")))
            .await?
            .json()
            .await?;
        record_from_raw(raw).with_context(|| format!("block {block_hash}"))
    }

    pub async fn header_at_height(&self, height: u64) -> Result<HeaderRecord> {
        let hash = self.block_hash_at(height).await?;
        self.header_at(&hash).await
    }

    pub async fn sample_heights<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<u64>> {
        let latest = self.latest_height().await?;
        debug!(latest, "latest height");
        Ok(sample_from_range(latest, n, rng))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub cached: usize,
    pub fetched: usize,
    pub failed: usize,
}

impl FetchSummary {
    pub fn saved(&self) -> usize {
        self.cached + self.fetched
    }
}

/// Resolve each height from the cache in `file` or the network, then
/// rewrite `file` with the results in request order. Failed heights are
/// logged and skipped.
pub async fn fetch_into_cache(
    fetcher: &Fetcher,
    heights: &[u64],
    file: &HeaderFile,
) -> Result<FetchSummary> {
    let cache = file.cached_by_height();
    let mut summary = FetchSummary::default();
    let mut out = Vec::with_capacity(heights.len());

    for &height in heights {
        if let Some(record) = cache.get(&height) {
            info!(height, hash = record.hash.as_deref().unwrap_or("?"), "cache hit");
            out.push(record.clone());
            summary.cached += 1;
            continue;
        }
        match fetcher.header_at_height(height).await {
            Ok(record) => {
                info!(height, hash = record.hash.as_deref().unwrap_or("?"), "fetched");
                out.push(record);
                summary.fetched += 1;
                tokio::time::sleep(fetcher.config().pause).await;
            }
            Err(err) => {
                warn!(height, error = %format!("{err:#}"), "skipping height");
                summary.failed += 1;
            }
        }
    }

    file.save_records(&out)?;
    Ok(summary)
}
