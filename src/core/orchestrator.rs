//! Batch rule application
//!
//! A batch is a list of CIDRs sharing one action. Entry `i` is installed at
//! weight `base + i`, so later entries take precedence over earlier ones and
//! the order inside the batch is total even for duplicate networks.
//!
//! # Failure policy
//!
//! Fail-fast, no rollback. The first translate or install error stops the
//! batch and is returned; filters installed before it stay active until the
//! session closes. The engine calls are not wrapped in a transaction, so the
//! batch is not atomic.

use crate::config::AppConfig;
use crate::core::condition::{compile_all, translate};
use crate::core::engine::{Engine, FilterId};
use crate::core::error::{Error, Result};
use crate::core::filter::{Action, build, install};
use crate::core::registrar::{Namespace, register};
use crate::core::session::Session;
use tracing::{info, warn};

/// Installs one filter per CIDR, in input order.
///
/// # Errors
///
/// Returns the first [`Error::Parse`], [`Error::Install`] or
/// [`Error::WeightOverflow`] hit; earlier filters are left installed.
pub fn apply_batch<E: Engine, S: AsRef<str>>(
    session: &mut Session<E>,
    namespace: &Namespace,
    action: Action,
    weight_base: u64,
    cidrs: &[S],
) -> Result<Vec<FilterId>> {
    let mut ids = Vec::with_capacity(cidrs.len());

    for (index, cidr) in cidrs.iter().enumerate() {
        let result = u64::try_from(index)
            .ok()
            .and_then(|offset| weight_base.checked_add(offset))
            .ok_or(Error::WeightOverflow {
                base: weight_base,
                index,
            })
            .and_then(|weight| {
                let condition = translate(cidr.as_ref())?;
                install(session, &build(namespace, weight, condition, action))
            });

        match result {
            Ok(id) => ids.push(id),
            Err(e) => {
                if !ids.is_empty() {
                    warn!(
                        "Batch stopped at entry {index}; {} filter(s) already installed stay active",
                        ids.len()
                    );
                }
                return Err(e);
            }
        }
    }

    info!("Applied {} {action} filter(s)", ids.len());
    Ok(ids)
}

/// Checks that a batch of `len` entries starting at `base` fits in `u64`.
///
/// # Errors
///
/// Returns [`Error::WeightOverflow`] for the first index past `u64::MAX`.
pub fn check_weight_range(base: u64, len: usize) -> Result<()> {
    let Some(last) = len.checked_sub(1) else {
        return Ok(());
    };
    match usize::try_from(u64::MAX - base) {
        Ok(room) if room < last => Err(Error::WeightOverflow {
            base,
            index: room + 1,
        }),
        _ => Ok(()),
    }
}

/// One session, one namespace, and the batches applied under them.
pub struct Firewall<E: Engine> {
    session: Session<E>,
    namespace: Namespace,
    weight_base: u64,
}

impl<E: Engine> Firewall<E> {
    /// Opens a dynamic session on `engine` and registers the namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineConnect`] or [`Error::Registration`]. On a
    /// registration error the session is dropped, which closes it.
    pub fn start(engine: E, config: &AppConfig) -> Result<Self> {
        let mut session = Session::open(engine, &config.session_options())?;
        let namespace = register(&mut session, &config.namespace_display())?;
        Ok(Self {
            session,
            namespace,
            weight_base: config.weight_base,
        })
    }

    /// Checks every entry and the weight range, then starts and applies.
    ///
    /// Nothing reaches the engine unless the whole batch compiles and fits,
    /// so a bad entry never leaves a partial batch behind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] or [`Error::WeightOverflow`] before any engine
    /// call, otherwise whatever [`Firewall::start`] or [`Firewall::apply`]
    /// return.
    pub fn launch<S: AsRef<str>>(
        engine: E,
        config: &AppConfig,
        action: Action,
        cidrs: &[S],
    ) -> Result<(Self, Vec<FilterId>)> {
        compile_all(cidrs)?;
        check_weight_range(config.weight_base, cidrs.len())?;

        let mut firewall = Self::start(engine, config)?;
        let ids = firewall.apply(action, cidrs)?;
        Ok((firewall, ids))
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn session(&self) -> &Session<E> {
        &self.session
    }

    /// Applies `cidrs` with `action` starting at the configured weight base.
    pub fn apply<S: AsRef<str>>(&mut self, action: Action, cidrs: &[S]) -> Result<Vec<FilterId>> {
        apply_batch(
            &mut self.session,
            &self.namespace,
            action,
            self.weight_base,
            cidrs,
        )
    }

    /// Closes the session; the engine removes every object created under it.
    pub fn shutdown(self) -> Result<()> {
        self.session.close()
    }
}
