//! One-shot message submission.

use std::sync::Arc;

use anyhow::{Result, bail};
use reasonfeed_core::api::{ApiClient, StaticToken};
use reasonfeed_core::config::Config;

pub async fn run(config: &Config, message: &str) -> Result<()> {
    let message = message.trim();
    if message.is_empty() {
        bail!("Message is empty");
    }

    let auth = Arc::new(StaticToken::new(config.resolved_token()));
    let client = ApiClient::from_config(config, auth)?;
    let submission = client
        .submit_message(message, config.submit_timeout())
        .await?;

    println!(
        "accepted message_id={} task_id={}",
        submission.message_id,
        submission.task_id.as_deref().unwrap_or("-")
    );
    Ok(())
}
