use crate::domain::stock::StockEvent;
use serde::Serialize;

/// Derived on every request from the latest event per ticker; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub stock: StockEvent,
    pub score: f64,
    pub reason: String,
}
