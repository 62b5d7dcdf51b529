// src/lib.rs

pub mod campaign;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod probe;
pub mod report;
pub mod runner;
