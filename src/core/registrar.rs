//! Provider and sublayer registration
//!
//! Every filter this crate installs lives under one provider and one
//! sublayer created for the session. The sublayer gets the highest possible
//! weight so its filters are arbitrated ahead of default-priority sublayers.

use crate::core::engine::{DisplayData, Engine};
use crate::core::error::{BaseObject, Error, Result};
use crate::core::session::Session;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

/// Weight given to our sublayer among its siblings
pub const SUBLAYER_WEIGHT: u16 = u16::MAX;

/// Owner registration for the filtering objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provider {
    pub key: Uuid,
    pub display: DisplayData,
}

/// Ordered container of filters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sublayer {
    pub key: Uuid,
    pub display: DisplayData,
    pub provider_key: Uuid,
    pub weight: u16,
}

/// Provider plus sublayer registered in one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Namespace {
    pub provider: Provider,
    pub sublayer: Sublayer,
}

/// Display metadata used when registering a namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDisplay {
    pub provider: DisplayData,
    pub sublayer: DisplayData,
}

impl Default for NamespaceDisplay {
    fn default() -> Self {
        Self {
            provider: DisplayData::new("wfprules", "wfprules provider"),
            sublayer: DisplayData::new("wfprules filters", "Permissive and blocking filters"),
        }
    }
}

/// Registers a fresh provider and sublayer in `session`.
///
/// Every call creates a new namespace with new keys. If the sublayer fails
/// after the provider was added, the provider is left in place; the dynamic
/// session removes it when it closes.
///
/// # Errors
///
/// Returns [`Error::Registration`] naming the object the engine rejected.
pub fn register<E: Engine>(
    session: &mut Session<E>,
    display: &NamespaceDisplay,
) -> Result<Namespace> {
    let provider = Provider {
        key: Uuid::new_v4(),
        display: display.provider.clone(),
    };
    let sublayer = Sublayer {
        key: Uuid::new_v4(),
        display: display.sublayer.clone(),
        provider_key: provider.key,
        weight: SUBLAYER_WEIGHT,
    };

    session
        .call(|engine, handle| engine.add_provider(handle, &provider))
        .map_err(|status| {
            error!("Provider registration failed: {status}");
            Error::Registration {
                object: BaseObject::Provider,
                status,
            }
        })?;
    info!("Registered provider '{}' ({})", provider.display.name, provider.key);

    session
        .call(|engine, handle| engine.add_sublayer(handle, &sublayer))
        .map_err(|status| {
            error!("Sublayer registration failed: {status}");
            Error::Registration {
                object: BaseObject::Sublayer,
                status,
            }
        })?;
    info!(
        "Registered sublayer '{}' ({}) with weight {}",
        sublayer.display.name, sublayer.key, sublayer.weight
    );

    Ok(Namespace { provider, sublayer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{EngineStatus, status};
    use crate::core::memory::{MemoryEngine, Operation};
    use crate::core::test_helpers::session_options;

    #[test]
    fn test_register_creates_linked_namespace() {
        let engine = MemoryEngine::new();
        let mut session = Session::open(engine.clone(), &session_options()).unwrap();

        let ns = register(&mut session, &NamespaceDisplay::default()).unwrap();

        assert_ne!(ns.provider.key, ns.sublayer.key);
        assert_eq!(ns.sublayer.provider_key, ns.provider.key);
        assert_eq!(ns.sublayer.weight, u16::MAX);
        assert_eq!(engine.providers(), vec![ns.provider.clone()]);
        assert_eq!(engine.sublayers(), vec![ns.sublayer.clone()]);
    }

    #[test]
    fn test_register_twice_creates_independent_namespaces() {
        let engine = MemoryEngine::new();
        let mut session = Session::open(engine.clone(), &session_options()).unwrap();

        let a = register(&mut session, &NamespaceDisplay::default()).unwrap();
        let b = register(&mut session, &NamespaceDisplay::default()).unwrap();

        assert_ne!(a.provider.key, b.provider.key);
        assert_ne!(a.sublayer.key, b.sublayer.key);
        assert_eq!(engine.providers().len(), 2);
        assert_eq!(engine.sublayers().len(), 2);
    }

    #[test]
    fn test_provider_failure() {
        let engine = MemoryEngine::new();
        let mut session = Session::open(engine.clone(), &session_options()).unwrap();
        engine.fail_next(Operation::AddProvider, EngineStatus(status::ACCESS_DENIED));

        let err = register(&mut session, &NamespaceDisplay::default()).unwrap_err();

        assert!(matches!(
            err,
            Error::Registration {
                object: BaseObject::Provider,
                ..
            }
        ));
        assert!(engine.providers().is_empty());
        assert!(engine.sublayers().is_empty());
    }

    #[test]
    fn test_sublayer_failure_leaves_provider_until_close() {
        let engine = MemoryEngine::new();
        let mut session = Session::open(engine.clone(), &session_options()).unwrap();
        engine.fail_next(Operation::AddSublayer, EngineStatus(status::FWP_ALREADY_EXISTS));

        let err = register(&mut session, &NamespaceDisplay::default()).unwrap_err();

        assert!(matches!(
            err,
            Error::Registration {
                object: BaseObject::Sublayer,
                status: s
            } if s.code() == status::FWP_ALREADY_EXISTS
        ));
        assert_eq!(engine.providers().len(), 1);
        assert!(engine.sublayers().is_empty());

        session.close().unwrap();
        assert!(engine.providers().is_empty());
    }
}
