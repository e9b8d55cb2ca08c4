use crate::domain::rating::{AnalystAction, RatingScale};
use crate::domain::stock::StockEvent;

pub const FALLBACK_REASON: &str = "Good fundamentals";

const MAX_SCORE: f64 = 100.0;
const TARGET_CAP: f64 = 40.0;
const TARGET_MULTIPLIER: f64 = 4.0;

const RATING_UPGRADE: u32 = 30;
const RATING_INITIATED_STRONG: u32 = 20;
const RATING_MAINTAINED_STRONG: u32 = 10;

const ACTION_UPGRADE: u32 = 20;
const ACTION_INITIATION: u32 = 15;
const ACTION_REITERATION: u32 = 10;
const ACTION_OTHER: u32 = 5;
const ACTION_REASON_THRESHOLD: u32 = 10;

const MOMENTUM_STRONG_CHANGE_PCT: f64 = 50.0;
const MOMENTUM_CHANGE_PCT: f64 = 25.0;
const MOMENTUM_STRONG_BONUS: f64 = 10.0;
const MOMENTUM_BONUS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    /// Always within `0.0..=100.0`.
    pub value: f64,
    pub reason: String,
}

/// Heuristic buy score for a single rating event.
///
/// Pure: the result depends only on the event and the rating table the scorer was built with.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    scale: RatingScale,
}

impl Scorer {
    pub fn new(scale: RatingScale) -> Self {
        Self { scale }
    }

    pub fn score(&self, event: &StockEvent) -> Score {
        let mut total = 0.0;
        let mut reasons: Vec<&'static str> = Vec::new();

        let change_pct = target_change_pct(&event.target_from, &event.target_to);
        if change_pct > 0.0 {
            total += (change_pct * TARGET_MULTIPLIER).min(TARGET_CAP);
            reasons.push("target price increased");
        }

        let rating_points = self.rating_points(&event.rating_from, &event.rating_to);
        total += f64::from(rating_points);
        if rating_points >= RATING_UPGRADE {
            reasons.push("rating upgraded");
        } else if rating_points >= RATING_INITIATED_STRONG {
            reasons.push("strong rating initiated");
        } else if rating_points >= RATING_MAINTAINED_STRONG {
            reasons.push("positive rating maintained");
        }

        let action = AnalystAction::classify(&event.action);
        let action_points = action_points(action);
        total += f64::from(action_points);
        if action_points > ACTION_REASON_THRESHOLD {
            reasons.push("positive analyst action");
        }

        if let Some((bonus, reason)) = momentum_bonus(change_pct, rating_points, action) {
            total += bonus;
            reasons.push(reason);
        }

        let reason = if reasons.is_empty() {
            FALLBACK_REASON.to_string()
        } else {
            reasons.join(", ")
        };

        Score {
            value: total.clamp(0.0, MAX_SCORE),
            reason,
        }
    }

    fn rating_points(&self, rating_from: &str, rating_to: &str) -> u32 {
        let from = self.scale.classify(rating_from);
        let to = self.scale.classify(rating_to);

        if to.ordinal() > from.ordinal() {
            RATING_UPGRADE
        } else if to.is_strong() && from.ordinal() == 0 {
            RATING_INITIATED_STRONG
        } else if to.ordinal() == from.ordinal() && to.is_strong() {
            RATING_MAINTAINED_STRONG
        } else {
            0
        }
    }
}

fn action_points(action: AnalystAction) -> u32 {
    match action {
        AnalystAction::Upgrade => ACTION_UPGRADE,
        AnalystAction::Initiation => ACTION_INITIATION,
        AnalystAction::Reiteration => ACTION_REITERATION,
        AnalystAction::Other => ACTION_OTHER,
    }
}

fn momentum_bonus(
    change_pct: f64,
    rating_points: u32,
    action: AnalystAction,
) -> Option<(f64, &'static str)> {
    let upgraded = rating_points >= RATING_UPGRADE;
    let upgrade_action = action == AnalystAction::Upgrade;

    if change_pct >= MOMENTUM_STRONG_CHANGE_PCT && upgraded && upgrade_action {
        Some((MOMENTUM_STRONG_BONUS, "strong multi-signal momentum"))
    } else if change_pct >= MOMENTUM_CHANGE_PCT && (upgraded || upgrade_action) {
        Some((MOMENTUM_BONUS, "strong momentum"))
    } else {
        None
    }
}

/// Percent change from `target_from` to `target_to`; 0 when the starting target is not a
/// positive number.
pub fn target_change_pct(target_from: &str, target_to: &str) -> f64 {
    let from = parse_price(target_from);
    let to = parse_price(target_to);
    if from > 0.0 {
        (to - from) / from * 100.0
    } else {
        0.0
    }
}

/// Parses a feed price string such as `"$12.50"`. Garbage parses as 0.
pub fn parse_price(raw: &str) -> f64 {
    raw.replace('$', "")
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rating::Rating;
    use chrono::{TimeZone, Utc};

    fn event(target_from: &str, target_to: &str, rating_from: &str, rating_to: &str, action: &str) -> StockEvent {
        let t = Utc.with_ymd_and_hms(2025, 3, 14, 0, 30, 0).unwrap();
        StockEvent {
            id: "x".to_string(),
            ticker: "AAPL".to_string(),
            company: "Apple Inc.".to_string(),
            target_from: target_from.to_string(),
            target_to: target_to.to_string(),
            action: action.to_string(),
            brokerage: "Wedbush".to_string(),
            rating_from: rating_from.to_string(),
            rating_to: rating_to.to_string(),
            event_time: t,
            last_updated: t,
            created_at: None,
        }
    }

    #[test]
    fn all_signals_aligned_hits_the_cap() {
        let s = Scorer::default().score(&event("$10", "$20", "Hold", "Strong Buy", "Upgraded by X"));
        assert_eq!(s.value, 100.0);
        assert_eq!(
            s.reason,
            "target price increased, rating upgraded, positive analyst action, strong multi-signal momentum"
        );
    }

    #[test]
    fn garbage_input_falls_back_to_default_reason() {
        let s = Scorer::default().score(&event("abc", "$5", "", "", ""));
        assert_eq!(s.value, 5.0);
        assert_eq!(s.reason, FALLBACK_REASON);
    }

    #[test]
    fn target_factor_is_capped_at_forty() {
        // +6.25% => 25 points, below the cap.
        let s = Scorer::default().score(&event("$8", "$8.50", "", "", ""));
        assert_eq!(s.value, 25.0 + 5.0);
        assert_eq!(s.reason, "target price increased");

        // +20% => 80 uncapped, capped to 40.
        let s = Scorer::default().score(&event("$100", "$120", "", "", ""));
        assert_eq!(s.value, 40.0 + 5.0);
    }

    #[test]
    fn lowered_target_adds_nothing() {
        let s = Scorer::default().score(&event("$100", "$80", "Buy", "Buy", "target lowered by BofA"));
        // maintained strong rating (10) + default action (5)
        assert_eq!(s.value, 15.0);
        assert_eq!(s.reason, "positive rating maintained");
    }

    #[test]
    fn new_coverage_at_strong_rating_counts_as_upgrade() {
        // An unranked "from" always sits below a strong "to", so the upgrade rule wins.
        let s = Scorer::default().score(&event("", "", "", "Buy", "initiated by Citi"));
        assert_eq!(s.value, 30.0 + 15.0);
        assert_eq!(s.reason, "rating upgraded, positive analyst action");
    }

    #[test]
    fn relabel_on_same_rung_counts_as_maintained() {
        let s = Scorer::default().score(&event("", "", "Buy", "Outperform", ""));
        assert_eq!(s.value, 10.0 + 5.0);
        assert_eq!(s.reason, "positive rating maintained");

        // Same rung below strong earns nothing.
        let s = Scorer::default().score(&event("", "", "Hold", "Neutral", ""));
        assert_eq!(s.value, 5.0);
        assert_eq!(s.reason, FALLBACK_REASON);
    }

    #[test]
    fn downgrade_gets_no_rating_points() {
        let s = Scorer::default().score(&event("", "", "Buy", "Hold", "downgraded by MS"));
        assert_eq!(s.value, 5.0);
        assert_eq!(s.reason, FALLBACK_REASON);
    }

    #[test]
    fn reiteration_reason_requires_more_than_ten_points() {
        let s = Scorer::default().score(&event("", "", "Neutral", "Neutral", "reiterated by Jefferies"));
        assert_eq!(s.value, 10.0);
        assert_eq!(s.reason, FALLBACK_REASON);
    }

    #[test]
    fn single_momentum_tier_from_action_alone() {
        // +30% target, unchanged neutral rating, "raised" action.
        let s = Scorer::default().score(&event("$10", "$13", "Neutral", "Neutral", "target raised by UBS"));
        assert_eq!(s.value, 40.0 + 20.0 + 5.0);
        assert_eq!(
            s.reason,
            "target price increased, positive analyst action, strong momentum"
        );
    }

    #[test]
    fn big_change_without_upgrade_action_gets_lower_tier() {
        // +60% target, rating upgrade, but the action text is neutral.
        let s = Scorer::default().score(&event("$10", "$16", "Sell", "Buy", "target set by Barclays"));
        assert_eq!(s.value, 40.0 + 30.0 + 5.0 + 5.0);
        assert!(s.reason.ends_with(", strong momentum"));
    }

    #[test]
    fn scoring_is_deterministic_and_bounded() {
        let scorer = Scorer::default();
        let e = event("$1", "$900", "Sell", "Strong Buy", "Raised by everyone");
        let a = scorer.score(&e);
        let b = scorer.score(&e);
        assert_eq!(a, b);
        assert!((0.0..=100.0).contains(&a.value));
    }

    #[test]
    fn alternate_scale_changes_rating_factor() {
        static LOWERCASE: &[(&str, Rating)] = &[("hold", Rating::Hold), ("buy", Rating::Buy)];
        let e = event("", "", "hold", "buy", "");
        assert_eq!(Scorer::default().score(&e).value, 5.0);
        assert_eq!(Scorer::new(RatingScale::new(LOWERCASE)).score(&e).value, 35.0);
    }

    #[test]
    fn parse_price_handles_currency_and_garbage() {
        assert_eq!(parse_price("$12.50"), 12.5);
        assert_eq!(parse_price("  $ 7 "), 7.0);
        assert_eq!(parse_price("4.25"), 4.25);
        assert_eq!(parse_price("abc"), 0.0);
        assert_eq!(parse_price(""), 0.0);
        assert_eq!(parse_price("$1,200.00"), 0.0);
        assert_eq!(parse_price("inf"), 0.0);
    }

    #[test]
    fn change_is_zero_without_positive_starting_target() {
        assert_eq!(target_change_pct("$0", "$10"), 0.0);
        assert_eq!(target_change_pct("-5", "$10"), 0.0);
        assert_eq!(target_change_pct("$8", "$10"), 25.0);
    }
}
