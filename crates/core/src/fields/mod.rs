pub mod resolve;
pub mod update;
