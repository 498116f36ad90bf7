//! REST client for a Binance-shaped spot exchange.

use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use eyre::{bail, Result};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use url::Url;

use super::types::{
    AccountInfo, BookTicker, DayStat, OrderAck, OrderFill, PriceTicker, SymbolInfo,
};
use super::ExchangeApi;
use crate::arb::types::Side;
use crate::config::ApiCredentials;

/// Default REST base URL.
const DEFAULT_HTTP_BASE: &str = "https://api.binance.com";

/// Request timeout for every call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Signed-request validity window in milliseconds.
const RECV_WINDOW_MS: u64 = 5_000;

/// HMAC-SHA256, the signature scheme of the signed endpoints.
type HmacSha256 = Hmac<Sha256>;

/// REST implementation of [`ExchangeApi`].
pub struct BinanceClient {
    /// Shared HTTP client
    http: Client,
    /// REST base URL
    base: Url,
    /// API key and signing secret
    credentials: ApiCredentials,
}

impl BinanceClient {
    /// Creates a client against the default or an overridden base URL.
    ///
    /// # Errors
    /// * If the base URL does not parse
    /// * If the HTTP client cannot be built
    pub fn new(credentials: ApiCredentials, http_base: Option<&str>) -> Result<Self> {
        let base = Url::parse(http_base.unwrap_or(DEFAULT_HTTP_BASE))?;
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base,
            credentials,
        })
    }

    /// Signs a urlencoded query string with the account secret.
    fn sign(&self, query: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.secret.as_bytes())
            .map_err(|e| eyre::eyre!("invalid API secret: {e}"))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Current timestamp for signed requests, in milliseconds.
    fn timestamp_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Performs an unauthenticated GET and decodes the JSON response.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base.join(path)?;
        let response = self.http.get(url).send().await?;
        Self::decode(response).await
    }

    /// Performs a signed GET with the given query string.
    async fn get_signed<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<T> {
        let url = self.base.join(&self.signed_path(path, query)?)?;
        let response = self
            .http
            .get(url)
            .header("X-MBX-APIKEY", &self.credentials.key)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Performs a signed POST with the given query string.
    async fn post_signed<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<T> {
        let url = self.base.join(&self.signed_path(path, query)?)?;
        let response = self
            .http
            .post(url)
            .header("X-MBX-APIKEY", &self.credentials.key)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Appends timestamp, receive window and signature to a query string.
    fn signed_path(&self, path: &str, query: &str) -> Result<String> {
        let mut query = if query.is_empty() {
            String::new()
        } else {
            format!("{query}&")
        };
        query.push_str(&format!(
            "timestamp={}&recvWindow={RECV_WINDOW_MS}",
            Self::timestamp_ms()
        ));
        let signature = self.sign(&query)?;
        Ok(format!("{path}?{query}&signature={signature}"))
    }

    /// Decodes a response, surfacing the exchange's error body on failure.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("exchange returned {status}: {body}");
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ExchangeApi for BinanceClient {
    async fn ping(&self) -> Result<()> {
        let _: serde_json::Value = self.get("/api/v3/ping").await?;
        Ok(())
    }

    async fn account(&self) -> Result<AccountInfo> {
        self.get_signed("/api/v3/account", "").await
    }

    async fn exchange_info(&self) -> Result<Vec<SymbolInfo>> {
        /// Envelope of the exchange-info payload.
        #[derive(serde::Deserialize)]
        struct ExchangeInfo {
            /// Per-symbol metadata
            symbols: Vec<SymbolInfo>,
        }
        let info: ExchangeInfo = self.get("/api/v3/exchangeInfo").await?;
        Ok(info.symbols)
    }

    async fn day_stats(&self) -> Result<Vec<DayStat>> {
        self.get("/api/v3/ticker/24hr").await
    }

    async fn last_prices(&self) -> Result<Vec<PriceTicker>> {
        self.get("/api/v3/ticker/price").await
    }

    async fn book_ticker(&self, symbol: &str) -> Result<BookTicker> {
        self.get(&format!("/api/v3/ticker/bookTicker?symbol={symbol}"))
            .await
    }

    async fn market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: &BigDecimal,
    ) -> Result<OrderFill> {
        // A BUY spends the quote asset, so it is sized by quoteOrderQty;
        // a SELL spends the base asset and is sized by quantity.
        let qty_param = match side {
            Side::Buy => "quoteOrderQty",
            Side::Sell => "quantity",
        };
        let query = format!(
            "symbol={symbol}&side={side}&type=MARKET&{qty_param}={}&newOrderRespType=RESULT",
            quantity.normalized()
        );
        let ack: OrderAck = self.post_signed("/api/v3/order", &query).await?;
        fill_from_ack(ack, side)
    }
}

/// Normalizes an order acknowledgement into spend/receive quantities for the
/// given side.
///
/// # Errors
/// * If the quantity fields are not valid decimals
fn fill_from_ack(ack: OrderAck, side: Side) -> Result<OrderFill> {
    let base = super::types::parse_decimal(&ack.executed_qty)?;
    let quote = super::types::parse_decimal(&ack.cummulative_quote_qty)?;
    let (spent, received) = match side {
        Side::Buy => (quote, base),
        Side::Sell => (base, quote),
    };
    Ok(OrderFill {
        symbol: ack.symbol,
        status: ack.status,
        spent,
        received,
    })
}
