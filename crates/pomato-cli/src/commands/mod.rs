pub mod config;
pub mod harvest;
pub mod run;
