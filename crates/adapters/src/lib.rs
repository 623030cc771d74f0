// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Alert sinks for Benchwatch.
//!
//! The history store hands every newly classified record to an
//! [`AlertSink`](benchwatch_core::AlertSink). This crate provides the
//! implementations used outside of tests:
//!
//! - [`LogSink`] - structured log lines through `tracing`
//! - [`WebhookSink`] - JSON POST to an HTTP endpoint, delivered off the
//!   ingestion path with retries
//! - [`Fanout`] - forwards each event to several sinks
//!
//! # Example
//!
//! ```no_run
//! use benchwatch_adapters::{Fanout, LogSink, WebhookConfig, WebhookSink};
//! use std::sync::Arc;
//!
//! # fn build() -> benchwatch_core::Result<()> {
//! let webhook = Arc::new(WebhookSink::new(WebhookConfig::new("https://hooks.example.org/bench"))?);
//! let sink = Fanout::new()
//!     .with(Arc::new(LogSink))
//!     .with(webhook.clone());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod fanout;
pub mod log;
pub mod webhook;

pub use fanout::Fanout;
pub use log::LogSink;
pub use webhook::{DeliveryError, WebhookConfig, WebhookSink};
