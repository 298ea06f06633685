//! CLI module for the Mantis security gateway
//!
//! - `audit`: inspect the audit journal
//! - `policies`: show the effective operation policy table

pub mod audit;
pub mod policies;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Mantis security gateway - authentication, authorization, rate limiting,
/// quotas and audit for tool invocations
#[derive(Parser)]
#[command(name = "mantis-gate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Query the audit journal
    Audit(audit::AuditArgs),

    /// Print the effective operation policy table
    Policies,
}

/// Load `.env`, configuration and logging the same way for every subcommand
pub(crate) fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    Ok(config)
}
