//! In-process filtering engine
//!
//! Keeps the same object model as the native engine so the whole pipeline
//! can run without privileges: handles are checked, keys must be unique,
//! sublayers and filters must reference registered objects, masks must be
//! contiguous, and closing a dynamic session drops everything created under
//! it. Used by the test suite and by `--dry-run`.
//!
//! Clones share state, so a test can keep a clone to inspect what a
//! [`Session`](crate::core::session::Session) did with the engine it owns.

use crate::core::condition::ConditionValue;
use crate::core::engine::{Engine, EngineHandle, FilterId, SessionOptions};
use crate::core::error::{EngineStatus, status};
use crate::core::filter::FilterSpec;
use crate::core::registrar::{Provider, Sublayer};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// Engine call, used to inject failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    OpenSession,
    CloseSession,
    AddProvider,
    AddSublayer,
    AddFilter,
}

/// A filter accepted by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledFilter {
    pub id: FilterId,
    pub spec: FilterSpec,
}

#[derive(Debug, Default)]
struct Objects {
    providers: Vec<Provider>,
    sublayers: Vec<Sublayer>,
    filters: Vec<InstalledFilter>,
}

impl Objects {
    fn append(&mut self, other: Objects) {
        self.providers.extend(other.providers);
        self.sublayers.extend(other.sublayers);
        self.filters.extend(other.filters);
    }
}

#[derive(Debug)]
struct OpenSession {
    options: SessionOptions,
    objects: Objects,
}

#[derive(Debug, Default)]
struct State {
    sessions: BTreeMap<usize, OpenSession>,
    /// Objects left behind by closed non-dynamic sessions
    retained: Objects,
    next_handle: usize,
    next_filter_id: FilterId,
    failures: HashMap<Operation, EngineStatus>,
}

impl State {
    fn all_objects(&self) -> impl Iterator<Item = &Objects> {
        self.sessions
            .values()
            .map(|s| &s.objects)
            .chain(std::iter::once(&self.retained))
    }

    fn has_provider(&self, key: Uuid) -> bool {
        self.all_objects()
            .any(|o| o.providers.iter().any(|p| p.key == key))
    }

    fn has_sublayer(&self, key: Uuid) -> bool {
        self.all_objects()
            .any(|o| o.sublayers.iter().any(|s| s.key == key))
    }

    fn has_filter(&self, key: Uuid) -> bool {
        self.all_objects()
            .any(|o| o.filters.iter().any(|f| f.spec.key == key))
    }

    fn take_failure(&mut self, op: Operation) -> Result<(), EngineStatus> {
        match self.failures.remove(&op) {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn session_mut(&mut self, handle: EngineHandle) -> Result<&mut OpenSession, EngineStatus> {
        self.sessions
            .get_mut(&handle.0)
            .ok_or(EngineStatus(status::INVALID_HANDLE))
    }

    fn check_handle(&self, handle: EngineHandle) -> Result<(), EngineStatus> {
        if self.sessions.contains_key(&handle.0) {
            Ok(())
        } else {
            Err(EngineStatus(status::INVALID_HANDLE))
        }
    }
}

/// Shared-state in-memory engine
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    state: Arc<Mutex<State>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next call of `op` fail with `status`.
    pub fn fail_next(&self, op: Operation, status: EngineStatus) {
        self.state().failures.insert(op, status);
    }

    pub fn open_sessions(&self) -> usize {
        self.state().sessions.len()
    }

    /// Options a live session was opened with
    pub fn session_options(&self, handle: EngineHandle) -> Option<SessionOptions> {
        self.state()
            .sessions
            .get(&handle.0)
            .map(|s| s.options.clone())
    }

    /// Registered providers, oldest first
    pub fn providers(&self) -> Vec<Provider> {
        self.state()
            .all_objects()
            .flat_map(|o| o.providers.iter().cloned())
            .collect()
    }

    /// Registered sublayers, oldest first
    pub fn sublayers(&self) -> Vec<Sublayer> {
        self.state()
            .all_objects()
            .flat_map(|o| o.sublayers.iter().cloned())
            .collect()
    }

    /// Installed filters in installation order
    pub fn filters(&self) -> Vec<InstalledFilter> {
        let mut filters: Vec<InstalledFilter> = self
            .state()
            .all_objects()
            .flat_map(|o| o.filters.iter().cloned())
            .collect();
        filters.sort_by_key(|f| f.id);
        filters
    }
}

fn is_contiguous(mask: u32) -> bool {
    mask.leading_ones() + mask.trailing_zeros() == 32
}

impl Engine for MemoryEngine {
    fn open_session(&mut self, options: &SessionOptions) -> Result<EngineHandle, EngineStatus> {
        let mut state = self.state();
        state.take_failure(Operation::OpenSession)?;

        state.next_handle += 1;
        let handle = EngineHandle(state.next_handle);
        state.sessions.insert(
            handle.0,
            OpenSession {
                options: options.clone(),
                objects: Objects::default(),
            },
        );
        Ok(handle)
    }

    fn close_session(&mut self, handle: EngineHandle) -> Result<(), EngineStatus> {
        let mut state = self.state();
        state.check_handle(handle)?;
        state.take_failure(Operation::CloseSession)?;

        if let Some(session) = state.sessions.remove(&handle.0) {
            if session.options.dynamic {
                debug!(
                    "Dynamic session {:#x} closed, dropping {} filter(s)",
                    handle.0,
                    session.objects.filters.len()
                );
            } else {
                state.retained.append(session.objects);
            }
        }
        Ok(())
    }

    fn add_provider(
        &mut self,
        handle: EngineHandle,
        provider: &Provider,
    ) -> Result<(), EngineStatus> {
        let mut state = self.state();
        state.check_handle(handle)?;
        state.take_failure(Operation::AddProvider)?;

        if provider.display.name.is_empty() {
            return Err(EngineStatus(status::FWP_NULL_DISPLAY_NAME));
        }
        if state.has_provider(provider.key) {
            return Err(EngineStatus(status::FWP_ALREADY_EXISTS));
        }
        state
            .session_mut(handle)?
            .objects
            .providers
            .push(provider.clone());
        Ok(())
    }

    fn add_sublayer(
        &mut self,
        handle: EngineHandle,
        sublayer: &Sublayer,
    ) -> Result<(), EngineStatus> {
        let mut state = self.state();
        state.check_handle(handle)?;
        state.take_failure(Operation::AddSublayer)?;

        if sublayer.display.name.is_empty() {
            return Err(EngineStatus(status::FWP_NULL_DISPLAY_NAME));
        }
        if !state.has_provider(sublayer.provider_key) {
            return Err(EngineStatus(status::FWP_PROVIDER_NOT_FOUND));
        }
        if state.has_sublayer(sublayer.key) {
            return Err(EngineStatus(status::FWP_ALREADY_EXISTS));
        }
        state
            .session_mut(handle)?
            .objects
            .sublayers
            .push(sublayer.clone());
        Ok(())
    }

    fn add_filter(
        &mut self,
        handle: EngineHandle,
        filter: &FilterSpec,
    ) -> Result<FilterId, EngineStatus> {
        let mut state = self.state();
        state.check_handle(handle)?;
        state.take_failure(Operation::AddFilter)?;

        if filter.display.name.is_empty() {
            return Err(EngineStatus(status::FWP_NULL_DISPLAY_NAME));
        }
        if !state.has_provider(filter.provider_key) {
            return Err(EngineStatus(status::FWP_PROVIDER_NOT_FOUND));
        }
        if !state.has_sublayer(filter.sublayer_key) {
            return Err(EngineStatus(status::FWP_SUBLAYER_NOT_FOUND));
        }
        if state.has_filter(filter.key) {
            return Err(EngineStatus(status::FWP_ALREADY_EXISTS));
        }
        let ConditionValue::V4AddrMask(am) = filter.condition.value;
        if !is_contiguous(am.mask) {
            return Err(EngineStatus(status::FWP_INVALID_NET_MASK));
        }

        state.next_filter_id += 1;
        let id = state.next_filter_id;
        state
            .session_mut(handle)?
            .objects
            .filters
            .push(InstalledFilter {
                id,
                spec: filter.clone(),
            });
        Ok(id)
    }
}
