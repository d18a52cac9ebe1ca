pub mod contract;
pub mod prediction;
pub mod stock;
