//! Audit command - reads the journal from the configured log directory

use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use clap::{Args, Subcommand};
use tracing::info;

use crate::domain::{AuditEventType, AuditQuery};
use crate::infrastructure::audit::{AuditJournal, FileAuditStore, JournalSettings};

#[derive(Args, Clone)]
pub struct AuditArgs {
    #[command(subcommand)]
    pub command: AuditCommand,

    /// Partition date to read (defaults to today, UTC)
    #[arg(long, global = true)]
    pub date: Option<NaiveDate>,
}

#[derive(Subcommand, Clone)]
pub enum AuditCommand {
    /// Print matching records as JSON lines, newest first
    Query(QueryArgs),

    /// Print record counts per event type
    Stats(StatsArgs),
}

#[derive(Args, Clone)]
pub struct QueryArgs {
    /// Only records of this type, e.g. `permission_denied`
    #[arg(long)]
    pub event_type: Option<AuditEventType>,

    /// RFC 3339 lower bound, inclusive
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// RFC 3339 upper bound, inclusive
    #[arg(long)]
    pub until: Option<DateTime<Utc>>,

    #[arg(long, default_value_t = 100)]
    pub limit: usize,
}

#[derive(Args, Clone)]
pub struct StatsArgs {
    /// Look-back window
    #[arg(long, default_value_t = 24)]
    pub hours: i64,
}

impl QueryArgs {
    fn to_query(&self) -> AuditQuery {
        let mut query = AuditQuery::new().limit(self.limit);
        if let Some(event_type) = self.event_type {
            query = query.event_type(event_type);
        }
        if let Some(since) = self.since {
            query = query.since(since);
        }
        if let Some(until) = self.until {
            query = query.until(until);
        }
        query
    }
}

/// Run the audit command
pub async fn run(args: AuditArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    let store = FileAuditStore::open(config.security.audit.log_dir.clone()).await?;
    let journal = Arc::new(AuditJournal::new(
        Arc::new(store),
        JournalSettings::from(&config.security.audit),
    ));

    if let Some(date) = args.date {
        journal.rotate_to(date).await?;
    }
    info!(partition = %journal.active_partition().await, "Reading audit partition");

    for line in execute(&journal, &args.command).await? {
        println!("{}", line);
    }

    Ok(())
}

async fn execute(journal: &AuditJournal, command: &AuditCommand) -> anyhow::Result<Vec<String>> {
    match command {
        AuditCommand::Query(args) => {
            let records = journal.query(&args.to_query()).await?;
            records
                .iter()
                .map(|record| serde_json::to_string(record).map_err(anyhow::Error::from))
                .collect()
        }
        AuditCommand::Stats(args) => {
            let since = lookback_start(Utc::now(), args.hours)?;
            let counts = journal.stats(since).await?;
            Ok(counts
                .into_iter()
                .map(|(event_type, count)| format!("{}\t{}", event_type, count))
                .collect())
        }
    }
}

/// Start of a look-back window; negative hours mean "from now"
fn lookback_start(now: DateTime<Utc>, hours: i64) -> anyhow::Result<DateTime<Utc>> {
    TimeDelta::try_hours(hours.max(0))
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| anyhow!("--hours {} is out of range", hours))
}
