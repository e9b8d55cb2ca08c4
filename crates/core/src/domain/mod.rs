pub mod rating;
pub mod recommendation;
pub mod stock;
