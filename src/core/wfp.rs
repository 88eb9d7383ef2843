//! Windows Filtering Platform engine
//!
//! Each record submitted to the engine is first copied into a `Native*`
//! value that owns every buffer the raw `FWPM_*` struct points at: UTF-16
//! strings, GUIDs, the address/mask pair, the 64-bit weight and the
//! condition array. The raw struct is only built inside `with_raw`, which
//! holds a mutable borrow of the owner for the length of the engine call, so
//! no pointer handed to the engine can outlive its storage.

use crate::core::condition::ConditionValue;
use crate::core::engine::{DisplayData, Engine, EngineHandle, FilterId, SessionOptions};
use crate::core::error::EngineStatus;
use crate::core::filter::{Action, FilterSpec, Layer};
use crate::core::registrar::{Provider, Sublayer};
use std::ptr;
use tracing::debug;
use uuid::Uuid;
use windows_sys::Win32::Foundation::{ERROR_SUCCESS, HANDLE};
use windows_sys::Win32::NetworkManagement::WindowsFilteringPlatform::{
    FWP_ACTION_BLOCK, FWP_ACTION_PERMIT, FWP_MATCH_EQUAL, FWP_UINT64, FWP_V4_ADDR_AND_MASK,
    FWP_V4_ADDR_MASK, FWPM_CONDITION_IP_REMOTE_ADDRESS, FWPM_DISPLAY_DATA0, FWPM_FILTER_CONDITION0,
    FWPM_FILTER_FLAG_CLEAR_ACTION_RIGHT, FWPM_FILTER0, FWPM_LAYER_ALE_AUTH_CONNECT_V4,
    FWPM_PROVIDER0, FWPM_SESSION_FLAG_DYNAMIC, FWPM_SESSION0, FWPM_SUBLAYER0, FwpmEngineClose0,
    FwpmEngineOpen0, FwpmFilterAdd0, FwpmProviderAdd0, FwpmSubLayerAdd0,
};
use windows_sys::Win32::System::Rpc::RPC_C_AUTHN_WINNT;
use windows_sys::Win32::System::Threading::INFINITE;
use windows_sys::core::GUID;

fn guid(key: Uuid) -> GUID {
    GUID::from_u128(key.as_u128())
}

/// NUL-terminated UTF-16 copy of `text`
fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

fn check(status: u32) -> Result<(), EngineStatus> {
    if status == ERROR_SUCCESS {
        Ok(())
    } else {
        Err(EngineStatus(status))
    }
}

fn raw_handle(handle: EngineHandle) -> HANDLE {
    handle.0 as HANDLE
}

struct NativeDisplay {
    name: Vec<u16>,
    description: Vec<u16>,
}

impl NativeDisplay {
    fn new(display: &DisplayData) -> Self {
        Self {
            name: wide(&display.name),
            description: wide(&display.description),
        }
    }

    fn raw(&mut self) -> FWPM_DISPLAY_DATA0 {
        FWPM_DISPLAY_DATA0 {
            name: self.name.as_mut_ptr(),
            description: self.description.as_mut_ptr(),
        }
    }
}

struct NativeSession {
    display: NativeDisplay,
    flags: u32,
    txn_wait_timeout_ms: u32,
}

impl NativeSession {
    fn new(options: &SessionOptions) -> Self {
        let txn_wait_timeout_ms = options.txn_wait_timeout.map_or(INFINITE, |timeout| {
            u32::try_from(timeout.as_millis()).unwrap_or(INFINITE - 1)
        });
        Self {
            display: NativeDisplay::new(&options.display),
            flags: if options.dynamic {
                FWPM_SESSION_FLAG_DYNAMIC
            } else {
                0
            },
            txn_wait_timeout_ms,
        }
    }

    fn with_raw<T>(&mut self, call: impl FnOnce(&FWPM_SESSION0) -> T) -> T {
        // SAFETY: FWPM_SESSION0 is a plain C struct; all-zero is its empty value.
        let mut raw: FWPM_SESSION0 = unsafe { std::mem::zeroed() };
        raw.displayData = self.display.raw();
        raw.flags = self.flags;
        raw.txnWaitTimeoutInMSec = self.txn_wait_timeout_ms;
        call(&raw)
    }
}

struct NativeProvider {
    key: GUID,
    display: NativeDisplay,
}

impl NativeProvider {
    fn new(provider: &Provider) -> Self {
        Self {
            key: guid(provider.key),
            display: NativeDisplay::new(&provider.display),
        }
    }

    fn with_raw<T>(&mut self, call: impl FnOnce(&FWPM_PROVIDER0) -> T) -> T {
        // SAFETY: see NativeSession::with_raw
        let mut raw: FWPM_PROVIDER0 = unsafe { std::mem::zeroed() };
        raw.providerKey = self.key;
        raw.displayData = self.display.raw();
        call(&raw)
    }
}

struct NativeSublayer {
    key: GUID,
    provider_key: GUID,
    display: NativeDisplay,
    weight: u16,
}

impl NativeSublayer {
    fn new(sublayer: &Sublayer) -> Self {
        Self {
            key: guid(sublayer.key),
            provider_key: guid(sublayer.provider_key),
            display: NativeDisplay::new(&sublayer.display),
            weight: sublayer.weight,
        }
    }

    fn with_raw<T>(&mut self, call: impl FnOnce(&FWPM_SUBLAYER0) -> T) -> T {
        // SAFETY: see NativeSession::with_raw
        let mut raw: FWPM_SUBLAYER0 = unsafe { std::mem::zeroed() };
        raw.subLayerKey = self.key;
        raw.displayData = self.display.raw();
        raw.providerKey = &mut self.provider_key;
        raw.weight = self.weight;
        call(&raw)
    }
}

struct NativeFilter {
    key: GUID,
    provider_key: GUID,
    sublayer_key: GUID,
    layer_key: GUID,
    display: NativeDisplay,
    flags: u32,
    weight: u64,
    addr_mask: FWP_V4_ADDR_AND_MASK,
    action: u32,
}

impl NativeFilter {
    fn new(spec: &FilterSpec) -> Self {
        let ConditionValue::V4AddrMask(am) = spec.condition.value;
        let layer_key = match spec.layer {
            Layer::AleAuthConnectV4 => FWPM_LAYER_ALE_AUTH_CONNECT_V4,
        };
        Self {
            key: guid(spec.key),
            provider_key: guid(spec.provider_key),
            sublayer_key: guid(spec.sublayer_key),
            layer_key,
            display: NativeDisplay::new(&spec.display),
            flags: if spec.flags.clear_action_right {
                FWPM_FILTER_FLAG_CLEAR_ACTION_RIGHT
            } else {
                0
            },
            weight: spec.weight,
            addr_mask: FWP_V4_ADDR_AND_MASK {
                addr: am.addr,
                mask: am.mask,
            },
            action: match spec.action {
                Action::Permit => FWP_ACTION_PERMIT,
                Action::Block => FWP_ACTION_BLOCK,
            },
        }
    }

    fn with_raw<T>(&mut self, call: impl FnOnce(&FWPM_FILTER0) -> T) -> T {
        // SAFETY: see NativeSession::with_raw
        let mut condition: FWPM_FILTER_CONDITION0 = unsafe { std::mem::zeroed() };
        condition.fieldKey = FWPM_CONDITION_IP_REMOTE_ADDRESS;
        condition.matchType = FWP_MATCH_EQUAL;
        condition.conditionValue.r#type = FWP_V4_ADDR_MASK;
        condition.conditionValue.Anonymous.v4AddrMask = &mut self.addr_mask;

        // SAFETY: see NativeSession::with_raw
        let mut raw: FWPM_FILTER0 = unsafe { std::mem::zeroed() };
        raw.filterKey = self.key;
        raw.displayData = self.display.raw();
        raw.flags = self.flags;
        raw.providerKey = &mut self.provider_key;
        raw.layerKey = self.layer_key;
        raw.subLayerKey = self.sublayer_key;
        raw.weight.r#type = FWP_UINT64;
        raw.weight.Anonymous.uint64 = &mut self.weight;
        raw.numFilterConditions = 1;
        raw.filterCondition = &mut condition;
        raw.action.r#type = self.action;
        call(&raw)
    }
}

/// The host's filtering engine, reached through `fwpuclnt.dll`.
#[derive(Debug, Default)]
pub struct WfpEngine;

impl WfpEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for WfpEngine {
    fn open_session(&mut self, options: &SessionOptions) -> Result<EngineHandle, EngineStatus> {
        let mut native = NativeSession::new(options);
        let mut handle: HANDLE = ptr::null_mut();
        let status = native.with_raw(|raw| {
            // SAFETY: `raw` and the buffers it points at are alive for the call;
            // `handle` is a valid out-pointer.
            unsafe {
                FwpmEngineOpen0(
                    ptr::null(),
                    RPC_C_AUTHN_WINNT,
                    ptr::null(),
                    raw,
                    &mut handle,
                )
            }
        });
        check(status)?;
        Ok(EngineHandle(handle as usize))
    }

    fn close_session(&mut self, handle: EngineHandle) -> Result<(), EngineStatus> {
        // SAFETY: closing an invalid handle is reported by status, not UB.
        check(unsafe { FwpmEngineClose0(raw_handle(handle)) })
    }

    fn add_provider(
        &mut self,
        handle: EngineHandle,
        provider: &Provider,
    ) -> Result<(), EngineStatus> {
        let mut native = NativeProvider::new(provider);
        let status = native.with_raw(|raw| {
            // SAFETY: `raw` is alive for the call; no security descriptor.
            unsafe { FwpmProviderAdd0(raw_handle(handle), raw, ptr::null_mut()) }
        });
        check(status)
    }

    fn add_sublayer(
        &mut self,
        handle: EngineHandle,
        sublayer: &Sublayer,
    ) -> Result<(), EngineStatus> {
        let mut native = NativeSublayer::new(sublayer);
        let status = native.with_raw(|raw| {
            // SAFETY: `raw` is alive for the call; no security descriptor.
            unsafe { FwpmSubLayerAdd0(raw_handle(handle), raw, ptr::null_mut()) }
        });
        check(status)
    }

    fn add_filter(
        &mut self,
        handle: EngineHandle,
        filter: &FilterSpec,
    ) -> Result<FilterId, EngineStatus> {
        let mut native = NativeFilter::new(filter);
        let mut id: u64 = 0;
        let status = native.with_raw(|raw| {
            // SAFETY: `raw`, its condition and value buffers are alive for the
            // call; `id` is a valid out-pointer.
            unsafe { FwpmFilterAdd0(raw_handle(handle), raw, ptr::null_mut(), &mut id) }
        });
        check(status)?;
        debug!("FwpmFilterAdd0 assigned id {id} to {}", filter.key);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::condition::translate;
    use crate::core::filter::build;
    use crate::core::test_helpers::test_namespace;

    #[test]
    fn test_guid_preserves_uuid_fields() {
        let key = Uuid::parse_str("0c1ba1af-5765-453f-af22-a8f791ac775b").unwrap();
        let g = guid(key);
        assert_eq!(g.data1, 0x0c1b_a1af);
        assert_eq!(g.data2, 0x5765);
        assert_eq!(g.data3, 0x453f);
        assert_eq!(g.data4, [0xaf, 0x22, 0xa8, 0xf7, 0x91, 0xac, 0x77, 0x5b]);
    }

    #[test]
    fn test_wide_is_nul_terminated() {
        assert_eq!(wide("ab"), vec![u16::from(b'a'), u16::from(b'b'), 0]);
        assert_eq!(wide(""), vec![0]);
    }

    #[test]
    fn test_native_filter_layout() {
        let ns = test_namespace();
        let spec = build(&ns, 42, translate("10.0.0.0/24").unwrap(), Action::Permit);
        let mut native = NativeFilter::new(&spec);

        native.with_raw(|raw| {
            assert_eq!(raw.flags, FWPM_FILTER_FLAG_CLEAR_ACTION_RIGHT);
            assert_eq!(raw.numFilterConditions, 1);
            assert_eq!(raw.action.r#type, FWP_ACTION_PERMIT);
            assert_eq!(raw.weight.r#type, FWP_UINT64);
            // SAFETY: pointers were set by with_raw and are alive here.
            unsafe {
                assert_eq!(*raw.weight.Anonymous.uint64, 42);
                let condition = &*raw.filterCondition;
                assert_eq!(condition.matchType, FWP_MATCH_EQUAL);
                assert_eq!(condition.conditionValue.r#type, FWP_V4_ADDR_MASK);
                let am = &*condition.conditionValue.Anonymous.v4AddrMask;
                assert_eq!(am.addr, 0x0A00_0000);
                assert_eq!(am.mask, 0xFFFF_FF00);
                assert_eq!(*raw.providerKey, guid(ns.provider.key));
            }
        });
    }

    #[test]
    fn test_native_session_defaults_to_infinite_wait() {
        let options = SessionOptions::dynamic(DisplayData::new("s", ""));
        let mut native = NativeSession::new(&options);
        native.with_raw(|raw| {
            assert_eq!(raw.flags, FWPM_SESSION_FLAG_DYNAMIC);
            assert_eq!(raw.txnWaitTimeoutInMSec, INFINITE);
        });
    }
}
