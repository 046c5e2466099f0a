//! Pricing heuristics shown to the player and used by the buyer AI.

use dealer_core::{as_f64, dollars};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::EconError;

/// How good a market car's asking price looks against its estimated resale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealRating {
    Great,
    Good,
    Neutral,
    Bad,
    Overpriced,
    Unknown,
}

impl DealRating {
    pub fn label(self) -> &'static str {
        match self {
            DealRating::Great => "Great deal",
            DealRating::Good => "Good deal",
            DealRating::Neutral => "Neutral",
            DealRating::Bad => "Bad deal",
            DealRating::Overpriced => "Overpriced",
            DealRating::Unknown => "Unknown",
        }
    }
}

/// Rate an asking price against estimated resale.
///
/// Example:
/// assert_eq!(rate_deal(Decimal::new(80,0), Decimal::new(100,0)), DealRating::Great);
pub fn rate_deal(asking: Decimal, estimated_resale: Decimal) -> DealRating {
    if estimated_resale <= Decimal::ZERO {
        return DealRating::Unknown;
    }
    let ratio = as_f64(asking) / as_f64(estimated_resale);
    if ratio < 0.85 {
        DealRating::Great
    } else if ratio < 0.95 {
        DealRating::Good
    } else if ratio <= 1.05 {
        DealRating::Neutral
    } else if ratio <= 1.15 {
        DealRating::Bad
    } else {
        DealRating::Overpriced
    }
}

/// Listing heat in 0..=3 from its price ratio, following the wave brackets.
pub fn listing_heat(price_ratio: f64) -> u8 {
    if price_ratio <= 0.95 {
        3
    } else if price_ratio <= 1.05 {
        2
    } else if price_ratio <= 1.15 {
        1
    } else {
        0
    }
}

/// Expected buyer interest in [0,1]: how far the list price sits under resale.
pub fn buyer_interest(list_price: Decimal, estimated_resale: Decimal) -> f64 {
    if estimated_resale <= Decimal::ZERO {
        return 0.0;
    }
    let resale = as_f64(estimated_resale);
    ((resale - as_f64(list_price)) / resale.max(1.0)).clamp(0.0, 1.0)
}

/// Profit of selling at `price` after spending `total_spent`.
pub fn profit(price: Decimal, total_spent: Decimal) -> Decimal {
    (price - total_spent).round()
}

/// Profit as a whole percentage of spend; `None` when nothing was spent.
pub fn profit_pct(profit: Decimal, total_spent: Decimal) -> Option<i64> {
    if total_spent <= Decimal::ZERO {
        return None;
    }
    Some((as_f64(profit) / as_f64(total_spent) * 100.0).round() as i64)
}

/// Suggested list price: anchor marked up by `margin_pct` percent.
///
/// Example:
/// let p = suggested_list_price(Decimal::new(10_000,0), 10.0).unwrap();
/// assert_eq!(p, Decimal::new(11_000,0));
pub fn suggested_list_price(anchor: Decimal, margin_pct: f64) -> Result<Decimal, EconError> {
    if !margin_pct.is_finite() {
        return Err(EconError::NonFinite);
    }
    if anchor < Decimal::ZERO {
        return Err(EconError::InvalidPrice);
    }
    Ok(dollars(as_f64(anchor) * (1.0 + margin_pct / 100.0)).max(Decimal::ZERO))
}

/// Price of a pre-purchase inspection report.
pub fn inspection_cost(estimated_repair_cost: Decimal) -> Decimal {
    dollars((as_f64(estimated_repair_cost) * 0.12).max(100.0))
}

/// Workshop quote for a car: its estimated repair cost, never below `min_cost`.
pub fn repair_quote(estimated_repair_cost: Decimal, min_cost: Decimal) -> Decimal {
    estimated_repair_cost.max(min_cost).round()
}
