//! Policies command - prints what each operation requires

use serde_json::{Value, json};

use crate::config::SecurityConfig;

/// Run the policies command
pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    for row in policy_rows(&config.security) {
        println!("{}", serde_json::to_string(&row)?);
    }

    Ok(())
}

/// One row per configured operation, sorted by name, with the rate limit
/// that will actually apply
fn policy_rows(config: &SecurityConfig) -> Vec<Value> {
    let limits = config.effective_rate_limits();
    let mut operations: Vec<_> = config.operations.iter().collect();
    operations.sort_by(|a, b| a.0.cmp(b.0));

    operations
        .into_iter()
        .map(|(operation, policy)| {
            let limit = limits
                .get(operation)
                .copied()
                .unwrap_or(config.rate_limit.default);

            json!({
                "operation": operation,
                "required_scopes": policy.required_scopes,
                "rate_limit": limit,
                "resource_class": policy.resource_class,
            })
        })
        .collect()
}
