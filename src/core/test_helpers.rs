//! Shared test utilities for core module tests
//!
//! This module is only compiled in test mode.

use crate::core::engine::{DisplayData, SessionOptions};
use crate::core::memory::MemoryEngine;
use crate::core::registrar::{Namespace, NamespaceDisplay, Provider, SUBLAYER_WEIGHT, Sublayer, register};
use crate::core::session::Session;
use uuid::Uuid;

/// Dynamic session options with a recognizable name
pub fn session_options() -> SessionOptions {
    SessionOptions::dynamic(DisplayData::new("wfprules test session", "unit tests"))
}

/// A namespace with fresh keys that is not registered anywhere
pub fn test_namespace() -> Namespace {
    let provider = Provider {
        key: Uuid::new_v4(),
        display: DisplayData::new("test provider", ""),
    };
    let sublayer = Sublayer {
        key: Uuid::new_v4(),
        display: DisplayData::new("test sublayer", ""),
        provider_key: provider.key,
        weight: SUBLAYER_WEIGHT,
    };
    Namespace { provider, sublayer }
}

/// Opens a session on a clone of `engine` and registers a namespace in it.
pub fn open_with_namespace(engine: &MemoryEngine) -> (Session<MemoryEngine>, Namespace) {
    let mut session = Session::open(engine.clone(), &session_options()).unwrap();
    let namespace = register(&mut session, &NamespaceDisplay::default()).unwrap();
    (session, namespace)
}
