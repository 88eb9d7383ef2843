//! wfprules - hard permit/block filters for IPv4 networks
//!
//! Opens a dynamic session on the host filtering engine, registers a provider
//! and a top-weight sublayer, and installs one override-resistant filter per
//! CIDR at the IPv4 outbound connect layer. Everything is removed by the
//! engine when the session closes or the process exits.
//!
//! # Architecture
//!
//! - [`core`] - Engine boundary, session lifecycle, condition compiler,
//!   registrar, filter installer and batch orchestrator
//! - [`config`] - Display names and weight base, loaded from JSON
//! - [`validators`] - Checks for text that ends up in engine records
//! - [`utils`] - Platform config directory lookup
//!
//! # Example
//!
//! ```
//! use wfprules::config::AppConfig;
//! use wfprules::core::filter::Action;
//! use wfprules::core::memory::MemoryEngine;
//! use wfprules::core::orchestrator::Firewall;
//!
//! let engine = MemoryEngine::new();
//! let mut firewall = Firewall::start(engine.clone(), &AppConfig::default())?;
//! firewall.apply(Action::Block, &["192.168.1.5/32", "172.16.0.0/16"])?;
//! assert_eq!(engine.filters().len(), 2);
//! firewall.shutdown()?;
//! assert!(engine.filters().is_empty());
//! # Ok::<(), wfprules::Error>(())
//! ```

#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod core;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use core::error::{Error, Result};
pub use core::filter::Action;
pub use core::orchestrator::{Firewall, apply_batch};
