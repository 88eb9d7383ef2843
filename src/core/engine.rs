//! Boundary to the host packet-filtering engine
//!
//! The engine is consumed through five blocking calls. Everything above this
//! trait works on typed records; implementations own the native layout.
//!
//! - [`crate::core::wfp::WfpEngine`]: Windows Filtering Platform (Windows only)
//! - [`crate::core::memory::MemoryEngine`]: in-process engine for tests and `--dry-run`

use crate::core::error::EngineStatus;
use crate::core::filter::FilterSpec;
use crate::core::registrar::{Provider, Sublayer};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name and description shown by engine management tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayData {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl DisplayData {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Parameters for opening a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub display: DisplayData,
    /// Objects added under a dynamic session are deleted when it ends
    pub dynamic: bool,
    /// How long engine calls wait for the transaction lock. `None` waits forever.
    pub txn_wait_timeout: Option<Duration>,
}

impl SessionOptions {
    /// Dynamic session with an infinite wait timeout
    pub fn dynamic(display: DisplayData) -> Self {
        Self {
            display,
            dynamic: true,
            txn_wait_timeout: None,
        }
    }
}

/// Opaque engine session handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineHandle(pub usize);

/// Engine-assigned filter identifier
pub type FilterId = u64;

/// The five engine operations.
///
/// Calls take `&mut self`: a handle must not be used from several threads
/// at once.
pub trait Engine {
    fn open_session(&mut self, options: &SessionOptions) -> Result<EngineHandle, EngineStatus>;

    fn close_session(&mut self, handle: EngineHandle) -> Result<(), EngineStatus>;

    fn add_provider(&mut self, handle: EngineHandle, provider: &Provider)
    -> Result<(), EngineStatus>;

    fn add_sublayer(&mut self, handle: EngineHandle, sublayer: &Sublayer)
    -> Result<(), EngineStatus>;

    fn add_filter(
        &mut self,
        handle: EngineHandle,
        filter: &FilterSpec,
    ) -> Result<FilterId, EngineStatus>;
}
