//! `EventLogger` implementations.
//!
//! `TracingEventLogger` is the production sink: it turns every security
//! event into a structured `tracing` event under the `bastion::security`
//! target. `MemoryEventLogger` keeps events in a `Vec` so hosts and tests
//! can inspect exactly what an engine reported.

use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use tracing::{info, warn};

use crate::traits::EventLogger;

/// Emits security events through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingEventLogger;

impl TracingEventLogger {
    pub fn new() -> Self {
        Self
    }
}

impl EventLogger for TracingEventLogger {
    fn log_crypto_operation(
        &self,
        operation: &str,
        algorithm: &str,
        success: bool,
        duration: Option<Duration>,
    ) {
        let duration_ms = duration.map(|d| d.as_secs_f64() * 1000.0);
        if success {
            info!(
                target: "bastion::security",
                operation = %operation,
                algorithm = %algorithm,
                success,
                duration_ms,
                "crypto operation"
            );
        } else {
            warn!(
                target: "bastion::security",
                operation = %operation,
                algorithm = %algorithm,
                success,
                duration_ms,
                "crypto operation failed"
            );
        }
    }

    fn log_anchor_event(&self, event_type: &str, batch_id: &str, success: bool, detail: Option<&str>) {
        if success {
            info!(
                target: "bastion::security",
                event_type = %event_type,
                batch_id = %batch_id,
                detail = detail.unwrap_or(""),
                "anchor event"
            );
        } else {
            warn!(
                target: "bastion::security",
                event_type = %event_type,
                batch_id = %batch_id,
                detail = detail.unwrap_or(""),
                "anchor event failed"
            );
        }
    }
}

/// One event captured by `MemoryEventLogger`.
#[derive(Debug, Clone, PartialEq)]
pub enum LoggedEvent {
    Crypto {
        operation: String,
        algorithm: String,
        success: bool,
        duration: Option<Duration>,
    },
    Anchor {
        event_type: String,
        batch_id: String,
        success: bool,
        detail: Option<String>,
    },
}

/// Collects events in memory, in the order they were reported.
#[derive(Debug, Default)]
pub struct MemoryEventLogger {
    events: Mutex<Vec<LoggedEvent>>,
}

impl MemoryEventLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far.
    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, event: LoggedEvent) {
        // A poisoned lock must not turn a log call into a panic.
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl EventLogger for MemoryEventLogger {
    fn log_crypto_operation(
        &self,
        operation: &str,
        algorithm: &str,
        success: bool,
        duration: Option<Duration>,
    ) {
        self.push(LoggedEvent::Crypto {
            operation: operation.to_string(),
            algorithm: algorithm.to_string(),
            success,
            duration,
        });
    }

    fn log_anchor_event(&self, event_type: &str, batch_id: &str, success: bool, detail: Option<&str>) {
        self.push(LoggedEvent::Anchor {
            event_type: event_type.to_string(),
            batch_id: batch_id.to_string(),
            success,
            detail: detail.map(str::to_string),
        });
    }
}
