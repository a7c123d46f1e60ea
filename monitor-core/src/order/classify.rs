//! C1 — order classifier.
//!
//! Pure function mapping a client-order-id's prefix convention to an
//! [`OrderCategory`]. Runs before any stateful processing so
//! it can be unit tested in isolation from the aggregator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Kind {
    Tp,
    Sl,
    Ft,
    Tw,
    Other,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Source {
    StopProfit,
    StopLoss,
    TrailingStop,
    Other,
}

impl Source {
    /// Chinese label shown in notification cards.
    pub fn label(self) -> &'static str {
        match self {
            Source::StopProfit => "止盈",
            Source::StopLoss => "止损",
            Source::TrailingStop => "追踪止损",
            Source::Other => "其他",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct OrderCategory {
    pub kind: Kind,
    pub level: Option<u32>,
    pub time_frame: Option<String>,
    pub source: Source,
    pub title_suffix: String,
}

impl OrderCategory {
    /// Is this a stop-like order (TP/SL/FT/TW), per the glossary.
    pub fn is_stop_like(&self) -> bool {
        !matches!(self.kind, Kind::Other)
    }

    fn other() -> Self {
        Self {
            kind: Kind::Other,
            level: None,
            time_frame: None,
            source: Source::Other,
            title_suffix: "其他".to_string(),
        }
    }
}

/// Parses a digit suffix off the front of `rest`, returning the level (if
/// any) and the remaining tail.
fn split_level(rest: &str) -> (Option<u32>, &str) {
    let digit_count = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digit_count == 0 {
        (None, rest)
    } else {
        let (digits, tail) = rest.split_at(digit_count);
        (digits.parse::<u32>().ok(), tail)
    }
}

/// Classifies a client-order-id into an [`OrderCategory`].
///
/// Tests prefixes in priority order — `TW_`, `TP`, `SL`, `FT` — returning on
/// first match; anything else classifies as [`Kind::Other`].
pub fn classify(client_order_id: &str) -> OrderCategory {
    let upper = client_order_id.trim().to_uppercase();

    if let Some(rest) = upper.strip_prefix("TW_") {
        let time_frame = rest
            .split(['-', '_'])
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let title_suffix = match &time_frame {
            Some(frame) => format!("{} 时间周期止损单", frame),
            None => "时间周期止损单".to_string(),
        };
        return OrderCategory {
            kind: Kind::Tw,
            level: None,
            time_frame,
            source: Source::TrailingStop,
            title_suffix,
        };
    }

    if let Some(rest) = upper.strip_prefix("TP") {
        let (level, _) = split_level(rest);
        let title_suffix = match level {
            Some(n) => format!("移动止损第{}档", n),
            None => "止盈".to_string(),
        };
        return OrderCategory {
            kind: Kind::Tp,
            level,
            time_frame: None,
            source: Source::StopProfit,
            title_suffix,
        };
    }

    if let Some(rest) = upper.strip_prefix("SL") {
        let (level, _) = split_level(rest);
        let title_suffix = match level {
            Some(n) => format!("硬止损第{}档", n),
            None => "硬止损单".to_string(),
        };
        return OrderCategory {
            kind: Kind::Sl,
            level,
            time_frame: None,
            source: Source::StopLoss,
            title_suffix,
        };
    }

    if upper.starts_with("FT") {
        return OrderCategory {
            kind: Kind::Ft,
            level: None,
            time_frame: None,
            source: Source::TrailingStop,
            title_suffix: "跟踪交易止损".to_string(),
        };
    }

    OrderCategory::other()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tw_with_time_frame() {
        let cat = classify("tw_1h-extra");
        assert_eq!(cat.kind, Kind::Tw);
        assert_eq!(cat.time_frame.as_deref(), Some("1H"));
        assert_eq!(cat.title_suffix, "1H 时间周期止损单");
    }

    #[test]
    fn tp_with_level() {
        let cat = classify("TP2-abc");
        assert_eq!(cat.kind, Kind::Tp);
        assert_eq!(cat.level, Some(2));
        assert_eq!(cat.title_suffix, "移动止损第2档");
    }

    #[test]
    fn tp_without_level_is_moving_stop_umbrella() {
        let cat = classify("TP");
        assert_eq!(cat.kind, Kind::Tp);
        assert_eq!(cat.level, None);
        assert_eq!(cat.title_suffix, "止盈");
    }

    #[test]
    fn sl_with_level() {
        let cat = classify("SL1");
        assert_eq!(cat.kind, Kind::Sl);
        assert_eq!(cat.level, Some(1));
        assert_eq!(cat.title_suffix, "硬止损第1档");
    }

    #[test]
    fn sl_without_level() {
        let cat = classify("SL");
        assert_eq!(cat.title_suffix, "硬止损单");
    }

    #[test]
    fn ft_prefix() {
        let cat = classify("FT-TRAIL-7");
        assert_eq!(cat.kind, Kind::Ft);
        assert_eq!(cat.title_suffix, "跟踪交易止损");
    }

    #[test]
    fn unrecognized_prefix_is_other() {
        let cat = classify("ORD-1");
        assert_eq!(cat.kind, Kind::Other);
        assert_eq!(cat.source, Source::Other);
        assert!(!cat.is_stop_like());
    }

    #[test]
    fn priority_order_favours_tw_over_tp() {
        // Starts with "TP" textually only after the TW_ check fails; ensure
        // TW_ prefixed ids never fall through to the TP branch.
        let cat = classify("TW_4H");
        assert_eq!(cat.kind, Kind::Tw);
    }
}
