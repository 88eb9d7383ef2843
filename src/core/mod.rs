//! Core filtering functionality
//!
//! Components, leaves first:
//!
//! - [`engine`]: the five engine operations as a trait over typed records
//! - [`session`]: open/close of a dynamic engine session
//! - [`condition`]: CIDR text to remote-address match condition
//! - [`registrar`]: provider and sublayer registration
//! - [`filter`]: filter record assembly and installation
//! - [`orchestrator`]: batches of CIDRs with distinct, increasing weights
//! - [`error`]: error types and engine status translation
//!
//! Engines: [`memory`] everywhere, [`wfp`] on Windows.

pub mod condition;
pub mod engine;
pub mod error;
pub mod filter;
pub mod memory;
pub mod orchestrator;
pub mod registrar;
pub mod session;

#[cfg(windows)]
pub mod wfp;

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;
