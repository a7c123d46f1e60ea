//! Wire DTOs for the Binance USD-M futures REST endpoints this system
//! consumes.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    #[serde(rename = "totalInitialMargin")]
    pub total_initial_margin: String,
    #[serde(rename = "totalMarginBalance")]
    pub total_margin_balance: String,
    #[serde(rename = "availableBalance")]
    pub available_balance: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionRiskEntry {
    pub symbol: String,
    #[serde(rename = "positionAmt")]
    pub position_amt: String,
    pub notional: String,
    pub leverage: String,
    #[serde(rename = "initialMargin")]
    pub initial_margin: String,
    #[serde(rename = "isolatedMargin")]
    pub isolated_margin: String,
    #[serde(rename = "marginType")]
    pub margin_type: String,
    #[serde(rename = "positionSide")]
    pub position_side: String,
    #[serde(rename = "markPrice")]
    pub mark_price: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PremiumIndexEntry {
    pub symbol: String,
    #[serde(rename = "markPrice")]
    pub mark_price: String,
    #[serde(rename = "lastFundingRate")]
    pub last_funding_rate: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenInterestResponse {
    pub symbol: String,
    #[serde(rename = "openInterest")]
    pub open_interest: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApexTokenInfoResponse {
    pub code: String,
    pub data: Option<ApexTokenInfoData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApexTokenInfoData {
    #[serde(rename = "marketCap", default)]
    pub market_cap: Option<String>,
    #[serde(rename = "volume24h", default)]
    pub volume_24h: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenKeyResponse {
    #[serde(rename = "listenKey")]
    pub listen_key: String,
}
