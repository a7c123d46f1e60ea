//! Position-rules JSON config: `defaults` + per-asset `overrides`
//!.
//!
//! Each override key is resolved by explicit presence, not truthiness
//!: a key absent from an asset's override object inherits
//! `defaults`; a key present with `null` (or, for list fields, an empty
//! array) overrides to "no restriction"; a key present with a value
//! overrides to that value.

use crate::error::RiskError;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Built-in `maxMarginShare` floor (Section 8 scenario 5: "margin_share_limit
/// … when initialMargin/totalMarginBalance>0.05") applied whenever
/// `defaults` doesn't specify its own value.
fn default_max_margin_share() -> Decimal {
    Decimal::new(5, 2)
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawDefaults {
    #[serde(rename = "whitelistLong", default)]
    whitelist_long: Option<Vec<String>>,
    #[serde(rename = "whitelistShort", default)]
    whitelist_short: Option<Vec<String>>,
    #[serde(rename = "blacklistLong", default)]
    blacklist_long: Option<Vec<String>>,
    #[serde(rename = "blacklistShort", default)]
    blacklist_short: Option<Vec<String>>,
    #[serde(rename = "maxLeverage", default)]
    max_leverage: Option<Decimal>,
    #[serde(rename = "maxMarginShare", default)]
    max_margin_share: Option<Decimal>,
    #[serde(rename = "fundingThresholdLong", default)]
    funding_threshold_long: Option<Decimal>,
    #[serde(rename = "fundingThresholdShort", default)]
    funding_threshold_short: Option<Decimal>,
    #[serde(rename = "cooldownMinutes", default)]
    cooldown_minutes: Option<u32>,
    #[serde(rename = "notifyRecovery", default)]
    notify_recovery: Option<bool>,
    #[serde(rename = "minFundingRateDelta", default)]
    min_funding_rate_delta: Option<Decimal>,
    #[serde(rename = "totalMarginUsageLimit", default)]
    total_margin_usage_limit: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    defaults: RawDefaults,
    #[serde(default)]
    overrides: HashMap<String, Value>,
}

/// Fully-resolved rule set for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRule {
    pub whitelist_long: Option<Vec<String>>,
    pub whitelist_short: Option<Vec<String>>,
    pub blacklist_long: Option<Vec<String>>,
    pub blacklist_short: Option<Vec<String>>,
    pub max_leverage: Option<Decimal>,
    pub max_margin_share: Option<Decimal>,
    pub funding_threshold_long: Option<Decimal>,
    pub funding_threshold_short: Option<Decimal>,
    pub cooldown_minutes: u32,
    pub notify_recovery: bool,
    #[allow(dead_code)]
    pub min_funding_rate_delta: Option<Decimal>,
}

fn field_present<T: DeserializeOwned>(raw: &serde_json::Map<String, Value>, key: &str) -> Option<Option<T>> {
    match raw.get(key) {
        None => None,
        Some(Value::Null) => Some(None),
        Some(v) => Some(serde_json::from_value(v.clone()).ok()),
    }
}

fn resolve_scalar<T: DeserializeOwned + Clone>(
    raw: &serde_json::Map<String, Value>,
    key: &str,
    default: &Option<T>,
) -> Option<T> {
    match field_present::<T>(raw, key) {
        None => default.clone(),
        Some(value) => value,
    }
}

/// List fields treat an explicit empty array the same as explicit `null`
///. Asset ids are
/// uppercased on load.
fn resolve_list(raw: &serde_json::Map<String, Value>, key: &str, default: &Option<Vec<String>>) -> Option<Vec<String>> {
    match field_present::<Vec<String>>(raw, key) {
        None => default.clone(),
        Some(None) => None,
        Some(Some(list)) if list.is_empty() => None,
        Some(Some(list)) => Some(list.into_iter().map(|s| s.to_uppercase()).collect()),
    }
}

/// Loaded and resolved `position-rules.json`.
#[derive(Debug, Clone)]
pub struct PositionRulesConfig {
    defaults: RawDefaults,
    resolved: HashMap<String, AssetRule>,
}

impl PositionRulesConfig {
    pub fn parse(raw_json: &str) -> Result<Self, RiskError> {
        let raw: RawConfig =
            serde_json::from_str(raw_json).map_err(|e| RiskError::ConfigInvalid(e.to_string()))?;

        let mut resolved = HashMap::new();
        for (asset, value) in &raw.overrides {
            let obj = value
                .as_object()
                .ok_or_else(|| RiskError::ConfigInvalid(format!("override for {asset} is not an object")))?;
            resolved.insert(asset.to_uppercase(), Self::resolve_asset(obj, &raw.defaults));
        }

        Ok(Self {
            defaults: raw.defaults,
            resolved,
        })
    }

    fn resolve_asset(raw: &serde_json::Map<String, Value>, defaults: &RawDefaults) -> AssetRule {
        let margin_share_default = Some(defaults.max_margin_share.unwrap_or_else(default_max_margin_share));
        AssetRule {
            whitelist_long: resolve_list(raw, "whitelistLong", &defaults.whitelist_long),
            whitelist_short: resolve_list(raw, "whitelistShort", &defaults.whitelist_short),
            blacklist_long: resolve_list(raw, "blacklistLong", &defaults.blacklist_long),
            blacklist_short: resolve_list(raw, "blacklistShort", &defaults.blacklist_short),
            max_leverage: resolve_scalar(raw, "maxLeverage", &defaults.max_leverage),
            max_margin_share: resolve_scalar(raw, "maxMarginShare", &margin_share_default),
            funding_threshold_long: resolve_scalar(raw, "fundingThresholdLong", &defaults.funding_threshold_long),
            funding_threshold_short: resolve_scalar(raw, "fundingThresholdShort", &defaults.funding_threshold_short),
            cooldown_minutes: resolve_scalar(raw, "cooldownMinutes", &defaults.cooldown_minutes).unwrap_or(0),
            notify_recovery: resolve_scalar(raw, "notifyRecovery", &defaults.notify_recovery).unwrap_or(true),
            min_funding_rate_delta: resolve_scalar(raw, "minFundingRateDelta", &defaults.min_funding_rate_delta),
        }
    }

    fn default_only_rule(&self) -> AssetRule {
        AssetRule {
            whitelist_long: self.defaults.whitelist_long.clone(),
            whitelist_short: self.defaults.whitelist_short.clone(),
            blacklist_long: self.defaults.blacklist_long.clone(),
            blacklist_short: self.defaults.blacklist_short.clone(),
            max_leverage: self.defaults.max_leverage,
            max_margin_share: Some(self.defaults.max_margin_share.unwrap_or_else(default_max_margin_share)),
            funding_threshold_long: self.defaults.funding_threshold_long,
            funding_threshold_short: self.defaults.funding_threshold_short,
            cooldown_minutes: self.defaults.cooldown_minutes.unwrap_or(0),
            notify_recovery: self.defaults.notify_recovery.unwrap_or(true),
            min_funding_rate_delta: self.defaults.min_funding_rate_delta,
        }
    }

    /// Resolved rule for `asset` (uppercased), falling back to
    /// defaults-only when the asset has no explicit override.
    pub fn rule_for(&self, asset: &str) -> AssetRule {
        self.resolved
            .get(&asset.to_uppercase())
            .cloned()
            .unwrap_or_else(|| self.default_only_rule())
    }

    /// Assets with an explicit override entry.
    pub fn configured_assets(&self) -> Vec<String> {
        self.resolved.keys().cloned().collect()
    }

    /// `totalMarginUsageLimit` is defaults-only.
    pub fn total_margin_usage_limit(&self) -> Option<Decimal> {
        self.defaults.total_margin_usage_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_inherits_absent_keys_from_defaults() {
        let json = r#"{
            "defaults": {"whitelistLong": ["BTC"], "maxLeverage": 3},
            "overrides": {"eth": {"maxLeverage": 5}}
        }"#;
        let config = PositionRulesConfig::parse(json).unwrap();
        let rule = config.rule_for("ETH");
        assert_eq!(rule.max_leverage, Some(Decimal::from(5)));
        assert_eq!(rule.whitelist_long, Some(vec!["BTC".to_string()]));
    }

    #[test]
    fn explicit_null_overrides_default_to_none() {
        let json = r#"{
            "defaults": {"maxLeverage": 3},
            "overrides": {"eth": {"maxLeverage": null}}
        }"#;
        let config = PositionRulesConfig::parse(json).unwrap();
        assert_eq!(config.rule_for("ETH").max_leverage, None);
    }

    #[test]
    fn empty_array_override_means_no_list() {
        let json = r#"{
            "defaults": {"whitelistLong": ["BTC"]},
            "overrides": {"eth": {"whitelistLong": []}}
        }"#;
        let config = PositionRulesConfig::parse(json).unwrap();
        assert_eq!(config.rule_for("ETH").whitelist_long, None);
    }

    #[test]
    fn unconfigured_asset_falls_back_to_defaults_only() {
        let json = r#"{"defaults": {"maxLeverage": 3}, "overrides": {}}"#;
        let config = PositionRulesConfig::parse(json).unwrap();
        assert_eq!(config.rule_for("SOL").max_leverage, Some(Decimal::from(3)));
    }
}
