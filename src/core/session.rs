//! Engine session lifecycle
//!
//! A [`Session`] owns an engine and the handle of one open session on it.
//! Sessions are opened dynamic: when the handle is closed, or the process
//! dies, the engine deletes every provider, sublayer and filter created
//! under it. That is the only cleanup this crate relies on; nothing is
//! deleted object by object.

use crate::core::engine::{Engine, EngineHandle, SessionOptions};
use crate::core::error::{Error, Result};
use tracing::{debug, error, info, warn};

/// An open engine session.
///
/// Closing consumes the session. Dropping an open session closes it and
/// logs a warning if that fails.
pub struct Session<E: Engine> {
    engine: E,
    handle: EngineHandle,
    name: String,
    closed: bool,
}

impl<E: Engine> Session<E> {
    /// Opens a session on `engine`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineConnect`] when the caller lacks privilege or
    /// the engine service cannot be reached.
    pub fn open(mut engine: E, options: &SessionOptions) -> Result<Self> {
        info!(
            "Opening {} filtering session '{}'",
            if options.dynamic { "dynamic" } else { "static" },
            options.display.name
        );

        let handle = engine.open_session(options).map_err(|status| {
            error!("Failed to open filtering session: {status}");
            Error::EngineConnect(status)
        })?;

        debug!("Session handle {:#x}", handle.0);
        Ok(Self {
            engine,
            handle,
            name: options.display.name.clone(),
            closed: false,
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs one engine call against this session's handle.
    pub(crate) fn call<T>(&mut self, op: impl FnOnce(&mut E, EngineHandle) -> T) -> T {
        op(&mut self.engine, self.handle)
    }

    /// Closes the session handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Close`] if the engine reports a failure. The error is
    /// not fatal: the dynamic session is reclaimed regardless.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        info!("Closing filtering session '{}'", self.name);
        self.engine
            .close_session(self.handle)
            .map_err(Error::Close)
    }
}

impl<E: Engine> Drop for Session<E> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        debug!("Closing filtering session '{}' on drop", self.name);
        if let Err(status) = self.engine.close_session(self.handle) {
            warn!("Failed to close filtering session '{}': {status}", self.name);
        }
    }
}
