//! Filter records and installation
//!
//! One builder serves both actions. Every filter:
//!
//! - sits at the IPv4 outbound connect authorization layer
//! - belongs to the session's provider and sublayer
//! - carries exactly one remote-address condition
//! - has the clear-action-right flag set, making it a "hard" permit/block:
//!   a filter in a lower-weight sublayer cannot silently override the
//!   decision at equal precedence
//!
//! Within the sublayer higher weights are evaluated first. The engine does
//! not order filters of equal weight, so callers pass distinct weights when
//! order matters.

use crate::core::condition::Condition;
use crate::core::engine::{DisplayData, Engine, FilterId};
use crate::core::error::{Error, Result};
use crate::core::registrar::Namespace;
use crate::core::session::Session;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

/// What the engine does with a matching connection
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Allow the connection
    #[strum(serialize = "permit")]
    Permit,
    /// Refuse the connection
    #[strum(serialize = "block")]
    Block,
}

impl Action {
    pub const fn display_name(self) -> &'static str {
        match self {
            Action::Permit => "Permit",
            Action::Block => "Block",
        }
    }
}

/// Evaluation point of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// IPv4 outbound connection authorization (`ALE_AUTH_CONNECT_V4`)
    AleAuthConnectV4,
}

/// Filter flags understood by the installer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FilterFlags {
    /// Clears the action right so lower-priority filters cannot override us
    pub clear_action_right: bool,
}

/// Complete filter record as submitted to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSpec {
    pub key: Uuid,
    pub display: DisplayData,
    pub flags: FilterFlags,
    pub provider_key: Uuid,
    pub layer: Layer,
    pub sublayer_key: Uuid,
    pub weight: u64,
    pub condition: Condition,
    pub action: Action,
}

/// Display name for a rule, e.g. "Block traffic to 10.0.0.0/8"
pub fn filter_label(action: Action, condition: &Condition) -> String {
    format!("{} traffic to {}", action.display_name(), condition.network)
}

/// Assembles a filter under `namespace` with a fresh key.
pub fn build(namespace: &Namespace, weight: u64, condition: Condition, action: Action) -> FilterSpec {
    let display = DisplayData::new(
        filter_label(action, &condition),
        format!("Hard {} (override-resistant)", action),
    );

    FilterSpec {
        key: Uuid::new_v4(),
        display,
        flags: FilterFlags {
            clear_action_right: true,
        },
        provider_key: namespace.provider.key,
        layer: Layer::AleAuthConnectV4,
        sublayer_key: namespace.sublayer.key,
        weight,
        condition,
        action,
    }
}

/// Submits `spec` to the engine and returns the engine-assigned id.
///
/// # Errors
///
/// Returns [`Error::Install`] with the engine status. Nothing is retried.
pub fn install<E: Engine>(session: &mut Session<E>, spec: &FilterSpec) -> Result<FilterId> {
    debug!(
        "Adding filter {} '{}' at weight {}",
        spec.key, spec.display.name, spec.weight
    );

    let id = session
        .call(|engine, handle| engine.add_filter(handle, spec))
        .map_err(|status| {
            error!("Filter '{}' rejected: {status}", spec.display.name);
            Error::Install {
                label: spec.display.name.clone(),
                status,
            }
        })?;

    info!("Installed filter #{id}: {}", spec.display.name);
    Ok(id)
}
