pub mod catalog;
pub mod output;
pub mod resolve;
