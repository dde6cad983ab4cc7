//! Ordered chain event sources.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use crate::domain::ChainEvent;

/// Supplies chain events in processing order.
#[async_trait]
pub trait EventSource: Send + Sync + fmt::Debug {
    async fn events(&self) -> Result<Vec<ChainEvent>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read event file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid event on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// One JSON event per line. Blank lines are skipped.
#[derive(Debug, Clone)]
pub struct JsonlEventSource {
    path: PathBuf,
}

impl JsonlEventSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Parse JSON-lines text. Line numbers in errors are 1-based.
pub fn parse_jsonl(content: &str) -> Result<Vec<ChainEvent>, SourceError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| SourceError::Parse {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

#[async_trait]
impl EventSource for JsonlEventSource {
    async fn events(&self) -> Result<Vec<ChainEvent>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let events = parse_jsonl(&content)?;
        info!(path = %self.path.display(), events = events.len(), "Loaded event file");
        Ok(events)
    }
}

/// Fixed in-memory event list.
#[derive(Debug, Clone, Default)]
pub struct VecEventSource {
    events: Vec<ChainEvent>,
}

impl VecEventSource {
    pub fn new(events: Vec<ChainEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl EventSource for VecEventSource {
    async fn events(&self) -> Result<Vec<ChainEvent>, SourceError> {
        Ok(self.events.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Amount, EventKind};
    use std::io::Write;

    const DEPOSIT: &str = r#"{"block_number":5,"block_hash":"0xB5","timestamp":60,"tx_hash":"0xt","log_index":2,"event":"Deposited","params":{"delegator":"0xAbC","token":"0x0000000000000000000000000000000000000000","amount":"1000000000000000000"}}"#;

    #[test]
    fn test_parse_deposit_line() {
        let events = parse_jsonl(&format!("{}\n\n", DEPOSIT)).unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.meta.block_number, 5);
        assert_eq!(event.meta.event_id(), "0xB5-2");
        match &event.kind {
            EventKind::Deposited {
                delegator,
                amount,
                lock,
                ..
            } => {
                assert_eq!(delegator, &Address::new("0xabc"));
                assert_eq!(*amount, Amount::pow10(18));
                assert_eq!(*lock, 0);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_reports_line() {
        let content = format!("{}\n{{\"event\":\"Nope\"}}\n", DEPOSIT);
        match parse_jsonl(&content) {
            Err(SourceError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_jsonl_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", DEPOSIT).unwrap();
        let source = JsonlEventSource::new(file.path());
        assert_eq!(source.events().await.unwrap().len(), 1);

        let missing = JsonlEventSource::new("/nonexistent/events.jsonl");
        assert!(matches!(missing.events().await, Err(SourceError::Io(_))));
    }
}
