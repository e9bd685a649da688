pub mod config;
pub mod evaluations;
pub mod health;
