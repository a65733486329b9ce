pub mod ingredient;
pub mod ratios;
pub mod unit;
