//! Flapdeck - split-flap display daemon
//!
//! This library drives a physical split-flap display: an array of
//! electromechanical character modules connected over a serial link. It has
//! two halves:
//!
//! - [`link`] speaks the framed, CRC-protected wire protocol to the display
//!   firmware: COBS framing, nonce-sequenced request/ack, bounded retries,
//!   and module-count discovery.
//! - [`display`] composes what the display shows from user-configured
//!   [`routine`]s (clock, timer, text, weather, ...) grouped into
//!   [`dashboard`]s, with optional timed rotation between dashboards.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module assembles the whole daemon:
//!
//! ```ignore
//! use flapdeck::geometry::Size;
//! use flapdeck::service::{self, ServiceConfig, Transport};
//!
//! let config = ServiceConfig {
//!     config_path: "display.json".into(),
//!     transport: Transport::Mock,
//!     default_size: Size::new(12, 1),
//! };
//! service::run(config, shutdown).await?;
//! ```

pub mod alphabet;
pub mod dashboard;
pub mod display;
pub mod geometry;
pub mod link;
pub mod logging;
pub mod provider;
pub mod routine;
pub mod service;

/// Version of the flapdeck library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
