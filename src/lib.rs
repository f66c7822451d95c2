// Library exports for eduprobe
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod context;
pub mod fixture;
pub mod http;
pub mod logging;
pub mod readiness;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod scenarios;
pub mod session;
