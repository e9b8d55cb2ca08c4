/// Analyst rating labels the scorer knows how to rank.
///
/// Feed labels are free text; anything not in the active [`RatingScale`] becomes
/// [`Rating::Unknown`], which ranks as 0 (no rating).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rating {
    StrongBuy,
    Buy,
    Outperform,
    Hold,
    MarketPerform,
    Neutral,
    EqualWeight,
    Underperform,
    Underweight,
    Sell,
    Unknown,
}

impl Rating {
    /// Position on the 1..=5 ordinal scale; 0 for unranked labels.
    pub fn ordinal(self) -> u8 {
        match self {
            Rating::StrongBuy => 5,
            Rating::Buy | Rating::Outperform => 4,
            Rating::Hold | Rating::MarketPerform | Rating::Neutral | Rating::EqualWeight => 3,
            Rating::Underperform | Rating::Underweight => 2,
            Rating::Sell => 1,
            Rating::Unknown => 0,
        }
    }

    pub fn is_strong(self) -> bool {
        self.ordinal() >= 4
    }
}

/// Immutable label-to-rating table. Matching is exact and case-sensitive.
#[derive(Debug, Clone, Copy)]
pub struct RatingScale {
    entries: &'static [(&'static str, Rating)],
}

impl RatingScale {
    pub const STANDARD: RatingScale = RatingScale {
        entries: &[
            ("Strong Buy", Rating::StrongBuy),
            ("Buy", Rating::Buy),
            ("Outperform", Rating::Outperform),
            ("Hold", Rating::Hold),
            ("Market Perform", Rating::MarketPerform),
            ("Neutral", Rating::Neutral),
            ("Equal Weight", Rating::EqualWeight),
            ("Underperform", Rating::Underperform),
            ("Underweight", Rating::Underweight),
            ("Sell", Rating::Sell),
        ],
    };

    pub const fn new(entries: &'static [(&'static str, Rating)]) -> Self {
        Self { entries }
    }

    pub fn classify(&self, label: &str) -> Rating {
        self.entries
            .iter()
            .find(|(known, _)| *known == label)
            .map(|(_, rating)| *rating)
            .unwrap_or(Rating::Unknown)
    }
}

impl Default for RatingScale {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Coarse classification of the free-text `action` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalystAction {
    /// "raised" or "upgraded" anywhere in the text.
    Upgrade,
    /// "initiated", unless the text also says "lowered".
    Initiation,
    Reiteration,
    Other,
}

impl AnalystAction {
    /// Case-insensitive substring classification; first matching rule wins.
    pub fn classify(action: &str) -> Self {
        let lower = action.to_lowercase();
        if lower.contains("raised") || lower.contains("upgraded") {
            AnalystAction::Upgrade
        } else if lower.contains("initiated") && !lower.contains("lowered") {
            AnalystAction::Initiation
        } else if lower.contains("reiterated") {
            AnalystAction::Reiteration
        } else {
            AnalystAction::Other
        }
    }
}
