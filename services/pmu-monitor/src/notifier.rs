//! Audible cues for incoming alerts

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::config::NotifierConfig;
use crate::model::Alert;
use crate::PmuMonitorError;

/// Trait for signalling a fresh batch of alerts
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Get the notifier type name (e.g. "bell")
    fn type_name(&self) -> &str;

    /// Signal a non-empty batch of alerts
    async fn notify(&self, alerts: &[Alert]) -> crate::Result<()>;
}

/// Rings the terminal bell
#[derive(Debug, Default)]
pub struct BellNotifier;

#[async_trait]
impl Notifier for BellNotifier {
    fn type_name(&self) -> &str {
        "bell"
    }

    async fn notify(&self, _alerts: &[Alert]) -> crate::Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(b"\x07").await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// Runs an external program, typically a sound player
#[derive(Debug)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        tracing::debug!("Created CommandNotifier running '{}'", program);
        Self { program, args }
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    fn type_name(&self) -> &str {
        "command"
    }

    async fn notify(&self, alerts: &[Alert]) -> crate::Result<()> {
        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .env("PMU_ALERT_COUNT", alerts.len().to_string())
            .status()
            .await
            .map_err(|e| {
                PmuMonitorError::Notifier(format!("Failed to run '{}': {}", self.program, e))
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(PmuMonitorError::Notifier(format!(
                "'{}' exited with {}",
                self.program, status
            )))
        }
    }
}

pub fn build_notifiers(configs: &[NotifierConfig]) -> Vec<Arc<dyn Notifier>> {
    configs
        .iter()
        .map(|config| -> Arc<dyn Notifier> {
            match config {
                NotifierConfig::Bell => Arc::new(BellNotifier),
                NotifierConfig::Command { program, args } => {
                    Arc::new(CommandNotifier::new(program.clone(), args.clone()))
                }
            }
        })
        .collect()
}

/// Run every notifier for the batch; failures are logged and swallowed
pub async fn dispatch(notifiers: &[Arc<dyn Notifier>], alerts: &[Alert]) {
    if alerts.is_empty() {
        return;
    }
    for notifier in notifiers {
        tracing::debug!(
            "Dispatching {} alert(s) to '{}'",
            alerts.len(),
            notifier.type_name()
        );
        if let Err(e) = notifier.notify(alerts).await {
            tracing::warn!("Notifier '{}' failed: {}", notifier.type_name(), e);
        }
    }
}
