//! C7 — position rule engine.
//!
//! Deterministic, idempotent evaluation of an [`AccountContext`] (plus
//! optional per-symbol [`SymbolMetrics`]) against a [`PositionRulesConfig`],
//! producing [`ValidationIssue`]s in the declared order.

use crate::config::{AssetRule, PositionRulesConfig};
use monitor_core::account::{AccountContext, Direction, PositionSnapshot};
use monitor_core::metrics::SymbolMetrics;
use monitor_core::validation::{IssueDirection, Rule, Severity, ValidationIssue, ACCOUNT_SCOPE};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

/// Fixed thresholds for this release.
const SHARE_THRESHOLD: &str = "0.02";
const MIN_OPEN_INTEREST: &str = "2000000";
const MIN_MARKET_CAP: &str = "50000000";
const MIN_VOLUME_24H: &str = "1000000";
const MAX_HHI: &str = "0.2";

fn threshold(raw: &str) -> Decimal {
    raw.parse().expect("fixed threshold literal is a valid decimal")
}

fn issue(
    rule: Rule,
    base_asset: &str,
    direction: IssueDirection,
    severity: Severity,
    message: String,
    cooldown_minutes: u32,
    notify_on_recovery: bool,
    value: Option<Decimal>,
    threshold: Option<Decimal>,
) -> ValidationIssue {
    ValidationIssue {
        rule,
        base_asset: base_asset.to_string(),
        direction,
        severity,
        message,
        cooldown_minutes,
        notify_on_recovery,
        value,
        threshold,
        details: None,
    }
}

/// Evaluates the full rule battery for one account snapshot.
pub fn evaluate(
    context: &AccountContext,
    metrics_by_symbol: &HashMap<String, SymbolMetrics>,
    config: &PositionRulesConfig,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let mut assets: Vec<String> = config.configured_assets();
    for asset in context.assets_with_positions() {
        if !assets.contains(&asset) {
            assets.push(asset);
        }
    }
    assets.sort();

    for asset in &assets {
        let rule = config.rule_for(asset);
        let positions = context.positions_for_asset(asset);
        evaluate_asset(asset, &rule, &positions, context.total_margin_balance, &mut issues);
    }

    evaluate_account_wide(context, &mut issues, config);
    evaluate_per_symbol(context, metrics_by_symbol, &mut issues);

    issues
}

fn positions_with_direction<'a>(positions: &[&'a PositionSnapshot], direction: Direction) -> Vec<&'a PositionSnapshot> {
    positions
        .iter()
        .copied()
        .filter(|p| p.direction == direction)
        .collect()
}

fn evaluate_asset(
    asset: &str,
    rule: &AssetRule,
    positions: &[&PositionSnapshot],
    total_margin_balance: Decimal,
    issues: &mut Vec<ValidationIssue>,
) {
    // 1. config_error: asset present in both of its own direction's lists.
    if contains(&rule.whitelist_long, asset) && contains(&rule.blacklist_long, asset) {
        issues.push(issue(
            Rule::ConfigError,
            asset,
            IssueDirection::Long,
            Severity::Critical,
            format!("{asset} 同时出现在多头白名单与黑名单中"),
            rule.cooldown_minutes,
            rule.notify_recovery,
            None,
            None,
        ));
    }
    if contains(&rule.whitelist_short, asset) && contains(&rule.blacklist_short, asset) {
        issues.push(issue(
            Rule::ConfigError,
            asset,
            IssueDirection::Short,
            Severity::Critical,
            format!("{asset} 同时出现在空头白名单与黑名单中"),
            rule.cooldown_minutes,
            rule.notify_recovery,
            None,
            None,
        ));
    }

    let longs = positions_with_direction(positions, Direction::Long);
    let shorts = positions_with_direction(positions, Direction::Short);

    // 2. whitelist_violation
    if let Some(whitelist) = &rule.whitelist_long {
        if !whitelist.iter().any(|a| a == asset) && !longs.is_empty() {
            issues.push(issue(
                Rule::WhitelistViolation,
                asset,
                IssueDirection::Long,
                Severity::Critical,
                format!("{asset} 多头持仓不在白名单内"),
                rule.cooldown_minutes,
                rule.notify_recovery,
                None,
                None,
            ));
        }
    }
    if let Some(whitelist) = &rule.whitelist_short {
        if !whitelist.iter().any(|a| a == asset) && !shorts.is_empty() {
            issues.push(issue(
                Rule::WhitelistViolation,
                asset,
                IssueDirection::Short,
                Severity::Critical,
                format!("{asset} 空头持仓不在白名单内"),
                rule.cooldown_minutes,
                rule.notify_recovery,
                None,
                None,
            ));
        }
    }

    // 3. blacklist_violation
    if contains(&rule.blacklist_long, asset) && !longs.is_empty() {
        issues.push(issue(
            Rule::BlacklistViolation,
            asset,
            IssueDirection::Long,
            Severity::Critical,
            format!("{asset} 多头持仓命中黑名单"),
            rule.cooldown_minutes,
            rule.notify_recovery,
            None,
            None,
        ));
    }
    if contains(&rule.blacklist_short, asset) && !shorts.is_empty() {
        issues.push(issue(
            Rule::BlacklistViolation,
            asset,
            IssueDirection::Short,
            Severity::Critical,
            format!("{asset} 空头持仓命中黑名单"),
            rule.cooldown_minutes,
            rule.notify_recovery,
            None,
            None,
        ));
    }

    // 4. leverage_limit
    if let Some(max_leverage) = rule.max_leverage {
        for position in positions {
            if position.leverage > max_leverage {
                issues.push(issue(
                    Rule::LeverageLimit,
                    asset,
                    position.direction.into(),
                    Severity::Warning,
                    format!("{} 杠杆 {} 超过上限 {}", position.symbol, position.leverage, max_leverage),
                    rule.cooldown_minutes,
                    rule.notify_recovery,
                    Some(position.leverage),
                    Some(max_leverage),
                ));
            }
        }
    }

    // 5. margin_share_limit
    if let Some(max_share) = rule.max_margin_share {
        if total_margin_balance > Decimal::ZERO {
            for (direction, group) in [(Direction::Long, &longs), (Direction::Short, &shorts)] {
                if group.is_empty() {
                    continue;
                }
                let margin_sum: Decimal = group.iter().map(|p| p.initial_margin.abs()).sum();
                let share = margin_sum / total_margin_balance;
                if share > max_share {
                    issues.push(issue(
                        Rule::MarginShareLimit,
                        asset,
                        direction.into(),
                        Severity::Warning,
                        format!("{asset} {:?} 保证金占比 {} 超过上限 {}", direction, share, max_share),
                        rule.cooldown_minutes,
                        rule.notify_recovery,
                        Some(share),
                        Some(max_share),
                    ));
                }
            }
        }
    }

    // 6. funding_rate_limit
    for position in &shorts {
        match position.predicted_funding_rate {
            None => issues.push(issue(
                Rule::DataMissing,
                asset,
                IssueDirection::Short,
                Severity::Warning,
                format!("{} 缺少资金费率数据", position.symbol),
                rule.cooldown_minutes,
                rule.notify_recovery,
                None,
                None,
            )),
            Some(rate) => {
                if let Some(limit) = rule.funding_threshold_short {
                    if rate < limit {
                        issues.push(issue(
                            Rule::FundingRateLimit,
                            asset,
                            IssueDirection::Short,
                            Severity::Warning,
                            format!("{} 资金费率 {} 低于空头阈值 {}", position.symbol, rate, limit),
                            rule.cooldown_minutes,
                            rule.notify_recovery,
                            Some(rate),
                            Some(limit),
                        ));
                    }
                }
            }
        }
    }
    for position in &longs {
        match position.predicted_funding_rate {
            None => issues.push(issue(
                Rule::DataMissing,
                asset,
                IssueDirection::Long,
                Severity::Warning,
                format!("{} 缺少资金费率数据", position.symbol),
                rule.cooldown_minutes,
                rule.notify_recovery,
                None,
                None,
            )),
            Some(rate) => {
                if let Some(limit) = rule.funding_threshold_long {
                    if rate > limit {
                        issues.push(issue(
                            Rule::FundingRateLimit,
                            asset,
                            IssueDirection::Long,
                            Severity::Warning,
                            format!("{} 资金费率 {} 高于多头阈值 {}", position.symbol, rate, limit),
                            rule.cooldown_minutes,
                            rule.notify_recovery,
                            Some(rate),
                            Some(limit),
                        ));
                    }
                }
            }
        }
    }
}

fn contains(list: &Option<Vec<String>>, asset: &str) -> bool {
    list.as_ref().is_some_and(|l| l.iter().any(|a| a == asset))
}

fn evaluate_account_wide(context: &AccountContext, issues: &mut Vec<ValidationIssue>, config: &PositionRulesConfig) {
    // 7/8. Account-wide margin checks.
    if context.total_margin_balance <= Decimal::ZERO {
        issues.push(issue(
            Rule::DataMissing,
            ACCOUNT_SCOPE,
            IssueDirection::Global,
            Severity::Critical,
            "账户总保证金余额不可用".to_string(),
            0,
            true,
            None,
            None,
        ));
        return;
    }

    if let Some(limit) = config.total_margin_usage_limit() {
        let margin_sum: Decimal = context.snapshots.iter().map(|p| p.initial_margin.abs()).sum();
        let usage = margin_sum / context.total_margin_balance;
        if usage > limit {
            issues.push(issue(
                Rule::TotalMarginUsage,
                ACCOUNT_SCOPE,
                IssueDirection::Global,
                Severity::Critical,
                format!("账户总保证金占用率 {} 超过上限 {}", usage, limit),
                0,
                true,
                Some(usage),
                Some(limit),
            ));
        }
    }
}

fn evaluate_per_symbol(
    context: &AccountContext,
    metrics_by_symbol: &HashMap<String, SymbolMetrics>,
    issues: &mut Vec<ValidationIssue>,
) {
    let share_threshold = threshold(SHARE_THRESHOLD);
    let min_open_interest = threshold(MIN_OPEN_INTEREST);
    let min_market_cap = threshold(MIN_MARKET_CAP);
    let min_volume = threshold(MIN_VOLUME_24H);
    let max_hhi = threshold(MAX_HHI);

    for symbol in context.symbols_with_positions() {
        let positions = context.positions_for_symbol(&symbol);
        let base_asset = positions
            .first()
            .map(|p| p.base_asset.clone())
            .unwrap_or_else(|| monitor_core::account::strip_quote_asset(&symbol));
        let sum_notional: Decimal = positions.iter().map(|p| p.notional).sum();

        let metrics = metrics_by_symbol.get(&symbol);
        let mut missing_fields: HashSet<&'static str> = HashSet::new();

        match metrics.and_then(|m| m.open_interest_notional) {
            Some(oi_notional) if oi_notional > Decimal::ZERO => {
                let share = sum_notional / oi_notional;
                if share > share_threshold {
                    issues.push(issue(
                        Rule::OiShareLimit,
                        &base_asset,
                        IssueDirection::Global,
                        Severity::Critical,
                        format!("{symbol} 持仓占未平仓合约比例 {share} 超过上限 {share_threshold}"),
                        0,
                        true,
                        Some(share),
                        Some(share_threshold),
                    ));
                }
                if oi_notional < min_open_interest {
                    issues.push(issue(
                        Rule::OiMinimum,
                        &base_asset,
                        IssueDirection::Global,
                        Severity::Warning,
                        format!("{symbol} 未平仓合约名义价值 {oi_notional} 低于下限 {min_open_interest}"),
                        0,
                        true,
                        Some(oi_notional),
                        Some(min_open_interest),
                    ));
                }
            }
            _ => {
                missing_fields.insert("未平仓合约");
            }
        }

        match metrics.and_then(|m| m.market_cap) {
            Some(cap) => {
                if cap < min_market_cap {
                    issues.push(issue(
                        Rule::MarketCapMinimum,
                        &base_asset,
                        IssueDirection::Global,
                        Severity::Warning,
                        format!("{symbol} 市值 {cap} 低于下限 {min_market_cap}"),
                        0,
                        true,
                        Some(cap),
                        Some(min_market_cap),
                    ));
                }
            }
            None => {
                missing_fields.insert("市值");
            }
        }

        match metrics.and_then(|m| m.volume_24h) {
            Some(volume) => {
                if volume < min_volume {
                    issues.push(issue(
                        Rule::Volume24hMinimum,
                        &base_asset,
                        IssueDirection::Global,
                        Severity::Warning,
                        format!("{symbol} 24小时成交量 {volume} 低于下限 {min_volume}"),
                        0,
                        true,
                        Some(volume),
                        Some(min_volume),
                    ));
                }
            }
            None => {
                missing_fields.insert("24小时成交量");
            }
        }

        match metrics.and_then(|m| m.hhi) {
            Some(hhi) => {
                if hhi > max_hhi {
                    issues.push(issue(
                        Rule::ConcentrationHhiLimit,
                        &base_asset,
                        IssueDirection::Global,
                        Severity::Warning,
                        format!("{symbol} 集中度指数 {hhi} 超过上限 {max_hhi}"),
                        0,
                        true,
                        Some(hhi),
                        Some(max_hhi),
                    ));
                }
            }
            None => {
                missing_fields.insert("集中度指数");
            }
        }

        if !missing_fields.is_empty() {
            let mut fields: Vec<&'static str> = missing_fields.into_iter().collect();
            fields.sort_unstable();
            issues.push(issue(
                Rule::DataMissing,
                &base_asset,
                IssueDirection::Global,
                Severity::Warning,
                format!("{symbol} 缺少市场数据: {}", fields.join("、")),
                0,
                true,
                None,
                None,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use monitor_core::account::MarginType;
    use rust_decimal_macros::dec;

    fn snapshot(symbol: &str, base: &str, direction: Direction, leverage: Decimal, initial_margin: Decimal) -> PositionSnapshot {
        PositionSnapshot {
            base_asset: base.to_string(),
            symbol: symbol.to_string(),
            position_amt: dec!(1),
            notional: dec!(1000),
            leverage,
            initial_margin,
            isolated_margin: Decimal::ZERO,
            margin_type: MarginType::Cross,
            direction,
            mark_price: dec!(1000),
            predicted_funding_rate: Some(Decimal::ZERO),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn whitelist_and_leverage_and_margin_share_issues() {
        let json = r#"{"defaults": {"whitelistLong": ["BTC"], "maxLeverage": 3}, "overrides": {}}"#;
        let config = PositionRulesConfig::parse(json).unwrap();

        let context = AccountContext {
            total_initial_margin: dec!(100),
            total_margin_balance: dec!(1000),
            available_balance: dec!(900),
            snapshots: vec![snapshot("ETHUSDT", "ETH", Direction::Long, dec!(5), dec!(100))],
            fetched_at: Utc::now(),
        };

        let issues = evaluate(&context, &HashMap::new(), &config);
        assert!(issues.iter().any(|i| i.rule == Rule::WhitelistViolation));
        assert!(issues.iter().any(|i| i.rule == Rule::LeverageLimit));
        assert!(issues.iter().any(|i| i.rule == Rule::MarginShareLimit));
    }

    #[test]
    fn zero_margin_balance_emits_data_missing_and_skips_usage_check() {
        let json = r#"{"defaults": {"totalMarginUsageLimit": 0.5}, "overrides": {}}"#;
        let config = PositionRulesConfig::parse(json).unwrap();
        let context = AccountContext {
            total_initial_margin: Decimal::ZERO,
            total_margin_balance: Decimal::ZERO,
            available_balance: Decimal::ZERO,
            snapshots: vec![],
            fetched_at: Utc::now(),
        };
        let issues = evaluate(&context, &HashMap::new(), &config);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule, Rule::DataMissing);
        assert_eq!(issues[0].base_asset, ACCOUNT_SCOPE);
    }
}
