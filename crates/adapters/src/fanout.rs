// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Forwarding one event to several sinks.

use benchwatch_core::{AlertSink, VerdictEvent};
use std::sync::Arc;

/// Sink that forwards every event to each of its children, in order.
#[derive(Default, Clone)]
pub struct Fanout {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl Fanout {
    /// Create a fanout with no children.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child sink.
    pub fn with(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Add a child sink in place.
    pub fn push(&mut self, sink: Arc<dyn AlertSink>) {
        self.sinks.push(sink);
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no children.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl std::fmt::Debug for Fanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fanout").field("sinks", &self.sinks.len()).finish()
    }
}

impl AlertSink for Fanout {
    fn dispatch(&self, event: &VerdictEvent) {
        for sink in &self.sinks {
            sink.dispatch(event);
        }
    }
}
