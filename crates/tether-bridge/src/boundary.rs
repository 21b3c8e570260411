// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Boundary plumbing shared by every bridge entry point

use crate::error::{BridgeError, HostFault};
use crate::exception;
use crate::value::ScriptValue;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Result of a bridge entry point. Faults cross as script values.
pub type BoundaryResult<T> = std::result::Result<T, ScriptValue>;

/// A borrowed UTF-16 string as passed by native code.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NativeStr<'a> {
    units: &'a [u16],
}

impl<'a> NativeStr<'a> {
    /// Borrow a slice of UTF-16 code units
    pub fn new(units: &'a [u16]) -> Self {
        Self { units }
    }

    /// Borrow a length-prefixed native buffer.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` initialized code units that stay valid and
    /// unmodified for `'a`. A null `ptr` is accepted only with `len == 0`.
    pub unsafe fn from_raw_parts(ptr: *const u16, len: usize) -> Self {
        if len == 0 {
            return Self { units: &[] };
        }
        // SAFETY: upheld by the caller.
        Self {
            units: unsafe { std::slice::from_raw_parts(ptr, len) },
        }
    }

    /// Number of UTF-16 code units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the string is empty
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Convert to a host string, replacing unpaired surrogates
    pub fn to_host_string(&self) -> String {
        String::from_utf16_lossy(self.units)
    }
}

impl<'a> From<&'a [u16]> for NativeStr<'a> {
    fn from(units: &'a [u16]) -> Self {
        Self::new(units)
    }
}

impl fmt::Debug for NativeStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeStr({:?})", self.to_host_string())
    }
}

/// An owned UTF-16 buffer, for hosts and tests that build native strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeString(Vec<u16>);

impl NativeString {
    /// Borrow as a [`NativeStr`]
    pub fn as_native(&self) -> NativeStr<'_> {
        NativeStr::new(&self.0)
    }
}

impl From<&str> for NativeString {
    fn from(s: &str) -> Self {
        Self(s.encode_utf16().collect())
    }
}

/// Run one entry point, converting panics to an internal script error.
pub(crate) fn guard<T>(
    entry: &'static str,
    f: impl FnOnce() -> BoundaryResult<T>,
) -> BoundaryResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(entry, panic = %message, "host code panicked inside a bridge call");
            Err(exception::marshal_exception_to_script(
                None,
                BridgeError::Panic(message).into_fault(),
            ))
        }
    }
}

/// Log a bridge-level failure and convert it to a script error.
pub(crate) fn bridge_failure(entry: &'static str, err: BridgeError) -> ScriptValue {
    if err.is_contract_violation() {
        tracing::error!(entry, error = %err, "bridge contract violation");
    } else {
        tracing::debug!(entry, error = %err, "bridge call failed");
    }
    let fault: HostFault = err.into_fault();
    exception::marshal_exception_to_script(None, fault)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultKind;

    #[test]
    fn test_native_str() {
        let owned = NativeString::from("héllo");
        let native = owned.as_native();
        assert_eq!(native.len(), 5);
        assert_eq!(native.to_host_string(), "héllo");
    }

    #[test]
    fn test_unpaired_surrogate() {
        let units = [0x61, 0xD800, 0x62];
        assert_eq!(NativeStr::from(&units[..]).to_host_string(), "a\u{FFFD}b");
    }

    #[test]
    fn test_from_raw_parts() {
        let units: Vec<u16> = "abc".encode_utf16().collect();
        let native = unsafe { NativeStr::from_raw_parts(units.as_ptr(), units.len()) };
        assert_eq!(native.to_host_string(), "abc");

        let empty = unsafe { NativeStr::from_raw_parts(std::ptr::null(), 0) };
        assert!(empty.is_empty());
    }

    #[test]
    fn test_guard_passes_through() {
        assert_eq!(guard("test", || Ok::<_, ScriptValue>(3)), Ok(3));
    }

    #[test]
    fn test_guard_catches_panic() {
        let err = guard::<()>("test", || panic!("kaboom")).unwrap_err();
        let error = err.as_error().unwrap();
        assert_eq!(error.kind, FaultKind::Internal);
        assert!(error.message.contains("kaboom"));
    }

    #[test]
    fn test_bridge_failure() {
        let value = bridge_failure("test", BridgeError::InvalidHandle(9));
        assert_eq!(value.as_error().unwrap().kind, FaultKind::InvalidOperation);
    }
}
