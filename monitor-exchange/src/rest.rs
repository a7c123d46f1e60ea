//! Binance USD-M futures REST client: signed account/position-risk, unsigned premium-index/open-
//! interest, the Apex token-info lookup, and listen-key lifecycle calls.
//!
//! One concrete client covers every endpoint this system needs, signed and
//! unsigned alike, since it only ever talks to a single exchange.

use crate::error::ExchangeError;
use crate::model::{
    AccountResponse, ApexTokenInfoResponse, ListenKeyResponse, OpenInterestResponse,
    PositionRiskEntry, PremiumIndexEntry,
};
use crate::signing::BinanceSigner;
use async_trait::async_trait;
use chrono::Utc;
use monitor_core::account::{AccountContext, Direction, MarginType, PositionSnapshot};
use monitor_core::order::PositionSide;
use monitor_core::ports::{AccountDataSource, MarketDataSource, PortError, TokenInfo};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

fn parse_decimal(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct BinanceRestClient {
    http: Client,
    signer: BinanceSigner,
    futures_base_url: String,
    apex_base_url: String,
}

impl BinanceRestClient {
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        futures_base_url: impl Into<String>,
        apex_base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            signer: BinanceSigner::new(api_key, secret_key),
            futures_base_url: futures_base_url.into(),
            apex_base_url: apex_base_url.into(),
        }
    }

    async fn get_signed<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let signed_query = self.signer.sign_query(params, Utc::now().timestamp_millis());
        let url = format!("{}{}?{}", self.futures_base_url, path, signed_query);
        let response = self
            .http
            .get(url)
            .header("X-MBX-APIKEY", self.signer.api_key())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn get_unsigned<T: serde::de::DeserializeOwned>(
        &self,
        base_url: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}", base_url, path);
        let response = self.http.get(url).query(params).send().await?;
        Self::handle_response(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ExchangeError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ExchangeError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// `POST /fapi/v1/listenKey` — create a new listen key.
    pub async fn create_listen_key(&self) -> Result<String, ExchangeError> {
        let url = format!("{}/fapi/v1/listenKey", self.futures_base_url);
        let response = self
            .http
            .post(url)
            .header("X-MBX-APIKEY", self.signer.api_key())
            .send()
            .await?;
        let parsed: ListenKeyResponse = Self::handle_response(response).await?;
        Ok(parsed.listen_key)
    }

    /// `PUT /fapi/v1/listenKey` — keep-alive, extends expiry by 60 minutes.
    pub async fn keepalive_listen_key(&self, listen_key: &str) -> Result<(), ExchangeError> {
        let url = format!("{}/fapi/v1/listenKey", self.futures_base_url);
        let response = self
            .http
            .put(url)
            .header("X-MBX-APIKEY", self.signer.api_key())
            .query(&[("listenKey", listen_key)])
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ExchangeError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(ExchangeError::ListenKeyExpired);
        }
        Ok(())
    }

    /// `DELETE /fapi/v1/listenKey` — best-effort on shutdown.
    pub async fn delete_listen_key(&self, listen_key: &str) -> Result<(), ExchangeError> {
        let url = format!("{}/fapi/v1/listenKey", self.futures_base_url);
        let response = self
            .http
            .delete(url)
            .header("X-MBX-APIKEY", self.signer.api_key())
            .query(&[("listenKey", listen_key)])
            .send()
            .await?;
        let _: serde_json::Value = Self::handle_response(response).await.unwrap_or_default();
        Ok(())
    }

    async fn fetch_all_premium_index(&self) -> Result<Vec<PremiumIndexEntry>, ExchangeError> {
        self.get_unsigned(&self.futures_base_url.clone(), "/fapi/v1/premiumIndex", &[])
            .await
    }
}

fn margin_type_from_wire(raw: &str) -> MarginType {
    match raw.to_ascii_lowercase().as_str() {
        "isolated" => MarginType::Isolated,
        _ => MarginType::Cross,
    }
}

fn position_side_from_wire(raw: &str) -> PositionSide {
    match raw {
        "LONG" => PositionSide::Long,
        "SHORT" => PositionSide::Short,
        _ => PositionSide::Both,
    }
}

fn build_snapshot(
    entry: &PositionRiskEntry,
    funding_by_symbol: &HashMap<String, Decimal>,
    fetched_at: chrono::DateTime<Utc>,
) -> PositionSnapshot {
    let position_amt = parse_decimal(&entry.position_amt);
    let position_side = position_side_from_wire(&entry.position_side);
    let direction = Direction::resolve(position_side, position_amt);

    PositionSnapshot {
        base_asset: monitor_core::account::strip_quote_asset(&entry.symbol),
        symbol: entry.symbol.clone(),
        position_amt,
        notional: parse_decimal(&entry.notional).abs(),
        leverage: parse_decimal(&entry.leverage),
        initial_margin: parse_decimal(&entry.initial_margin),
        isolated_margin: parse_decimal(&entry.isolated_margin),
        margin_type: margin_type_from_wire(&entry.margin_type),
        direction,
        mark_price: parse_decimal(&entry.mark_price),
        predicted_funding_rate: funding_by_symbol.get(&entry.symbol).copied(),
        updated_at: fetched_at,
    }
}

#[async_trait]
impl AccountDataSource for BinanceRestClient {
    async fn fetch_account(&self) -> Result<AccountContext, PortError> {
        let fetched_at = Utc::now();

        let account: AccountResponse = self
            .get_signed("/fapi/v2/account", &[])
            .await
            .map_err(|e| PortError::from(e.to_string()))?;
        let positions: Vec<PositionRiskEntry> = self
            .get_signed("/fapi/v2/positionRisk", &[])
            .await
            .map_err(|e| PortError::from(e.to_string()))?;

        let funding_by_symbol: HashMap<String, Decimal> = match self.fetch_all_premium_index().await
        {
            Ok(entries) => entries
                .into_iter()
                .map(|e| (e.symbol, parse_decimal(&e.last_funding_rate)))
                .collect(),
            Err(err) => {
                warn!(error = %err, "failed to fetch premium index, funding rates will be missing");
                HashMap::new()
            }
        };

        let snapshots: Vec<PositionSnapshot> = positions
            .iter()
            .map(|entry| build_snapshot(entry, &funding_by_symbol, fetched_at))
            .filter(|snapshot| !snapshot.is_empty())
            .collect();

        Ok(AccountContext {
            total_initial_margin: parse_decimal(&account.total_initial_margin),
            total_margin_balance: parse_decimal(&account.total_margin_balance),
            available_balance: parse_decimal(&account.available_balance),
            snapshots,
            fetched_at,
        })
    }
}

#[async_trait]
impl MarketDataSource for BinanceRestClient {
    async fn fetch_open_interest(&self, symbol: &str) -> Result<Decimal, PortError> {
        let response: OpenInterestResponse = self
            .get_unsigned(
                &self.futures_base_url.clone(),
                "/fapi/v1/openInterest",
                &[("symbol", symbol.to_string())],
            )
            .await
            .map_err(|e| PortError::from(e.to_string()))?;
        Ok(parse_decimal(&response.open_interest))
    }

    async fn fetch_reference_price(&self, symbol: &str) -> Result<Decimal, PortError> {
        let entries: Vec<PremiumIndexEntry> = self
            .get_unsigned(
                &self.futures_base_url.clone(),
                "/fapi/v1/premiumIndex",
                &[("symbol", symbol.to_string())],
            )
            .await
            .map_err(|e| PortError::from(e.to_string()))?;
        entries
            .first()
            .map(|e| parse_decimal(&e.mark_price))
            .ok_or_else(|| PortError::from("premiumIndex returned no entry"))
    }

    async fn fetch_token_info(&self, base_asset: &str) -> Result<TokenInfo, PortError> {
        let response: ApexTokenInfoResponse = self
            .get_unsigned(
                &self.apex_base_url.clone(),
                "/bapi/apex/v1/friendly/apex/marketing/web/token-info",
                &[("symbol", base_asset.to_string())],
            )
            .await
            .map_err(|e| PortError::from(e.to_string()))?;

        if response.code != "000000" {
            return Err(PortError::from(format!(
                "apex token-info returned code {}",
                response.code
            )));
        }

        let data = response.data.unwrap_or_default();
        Ok(TokenInfo {
            market_cap: data.market_cap.as_deref().map(parse_thousands_decimal),
            volume_24h: data.volume_24h.as_deref().map(parse_thousands_decimal),
        })
    }
}

/// Parses a number that may carry thousands separators.
fn parse_thousands_decimal(raw: &str) -> Decimal {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&cleaned).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_thousands_separators() {
        assert_eq!(parse_thousands_decimal("1,234,567.89"), Decimal::from_str("1234567.89").unwrap());
    }

    #[test]
    fn margin_type_defaults_to_cross() {
        assert_eq!(margin_type_from_wire("CROSSED"), MarginType::Cross);
        assert_eq!(margin_type_from_wire("isolated"), MarginType::Isolated);
    }
}
