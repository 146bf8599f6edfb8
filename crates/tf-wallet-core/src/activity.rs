use std::sync::{Mutex, PoisonError};
use tf_api_types::{LogLevel, LogLine};
use tf_storage::epoch_ms;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

const MAX_LINES: usize = 1_000;

/// Per-feature progress log. Lines are kept in memory, mirrored to tracing
/// and fanned out to live subscribers.
pub struct ActivityFeed {
    lines: Mutex<Vec<LogLine>>,
    events: broadcast::Sender<LogLine>,
}

impl Default for ActivityFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityFeed {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            lines: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn log(&self, feature: &str, level: LogLevel, message: impl Into<String>) {
        let line = LogLine {
            feature: feature.to_owned(),
            level,
            message: message.into(),
            timestamp_epoch_ms: epoch_ms(),
        };

        match level {
            LogLevel::Info | LogLevel::Success => info!(feature, "{}", line.message),
            LogLevel::Warning => warn!(feature, "{}", line.message),
            LogLevel::Error => error!(feature, "{}", line.message),
        }

        {
            let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
            lines.push(line.clone());
            if lines.len() > MAX_LINES {
                let excess = lines.len() - MAX_LINES;
                lines.drain(..excess);
            }
        }

        let _ = self.events.send(line);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogLine> {
        self.events.subscribe()
    }

    pub fn lines_for(&self, feature: &str) -> Vec<LogLine> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|line| line.feature == feature)
            .cloned()
            .collect()
    }

    pub fn messages_for(&self, feature: &str) -> Vec<String> {
        self.lines_for(feature)
            .into_iter()
            .map(|line| line.message)
            .collect()
    }
}
