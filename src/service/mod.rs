pub mod analysis;
pub mod chart;
pub mod command;
pub mod finance;
