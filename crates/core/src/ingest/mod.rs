pub mod identity;
pub mod normalize;
pub mod provider;
pub mod sync;
pub mod types;
