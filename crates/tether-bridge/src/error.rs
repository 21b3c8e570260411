// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the host-object bridge

use std::fmt;
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Classification of a host-side fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// A named or indexed member does not exist
    MemberNotFound,
    /// The object (or member) cannot be called
    NotInvocable,
    /// Wrong number or shape of arguments
    InvalidArgument,
    /// Wrong type of value
    TypeError,
    /// Value out of range
    RangeError,
    /// The operation is not valid in the current state
    InvalidOperation,
    /// A document could not be found or loaded
    DocumentLoad,
    /// A value thrown by script code that was not an error object
    ScriptException,
    /// Anything else, including panics caught at the boundary
    Internal,
}

impl FaultKind {
    /// Script-visible error constructor name for this kind
    pub fn script_name(self) -> &'static str {
        match self {
            FaultKind::MemberNotFound
            | FaultKind::NotInvocable
            | FaultKind::InvalidArgument
            | FaultKind::TypeError => "TypeError",
            FaultKind::RangeError => "RangeError",
            FaultKind::InvalidOperation
            | FaultKind::DocumentLoad
            | FaultKind::ScriptException
            | FaultKind::Internal => "Error",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::MemberNotFound => "MemberNotFound",
            FaultKind::NotInvocable => "NotInvocable",
            FaultKind::InvalidArgument => "InvalidArgument",
            FaultKind::TypeError => "TypeError",
            FaultKind::RangeError => "RangeError",
            FaultKind::InvalidOperation => "InvalidOperation",
            FaultKind::DocumentLoad => "DocumentLoad",
            FaultKind::ScriptException => "ScriptException",
            FaultKind::Internal => "Internal",
        };
        f.write_str(name)
    }
}

/// A fault raised by host code: capability objects, loaders and callbacks.
///
/// Faults are cheap to clone so they can travel out to script inside an
/// error value and come back unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct HostFault {
    /// Fault classification
    pub kind: FaultKind,
    /// Human-readable message
    pub message: String,
}

impl HostFault {
    /// Create a fault of the given kind
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a member-not-found fault
    pub fn member_not_found(name: impl fmt::Display) -> Self {
        Self::new(
            FaultKind::MemberNotFound,
            format!("Object has no property or method named '{}'", name),
        )
    }

    /// Create a not-invocable fault
    pub fn not_invocable(what: impl fmt::Display) -> Self {
        Self::new(FaultKind::NotInvocable, format!("'{}' is not invocable", what))
    }

    /// Create an invalid-argument fault
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidArgument, msg)
    }

    /// Create a type-error fault
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::new(FaultKind::TypeError, msg)
    }

    /// Create a range-error fault
    pub fn range_error(msg: impl Into<String>) -> Self {
        Self::new(FaultKind::RangeError, msg)
    }

    /// Create an invalid-operation fault
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidOperation, msg)
    }

    /// Create a document-load fault
    pub fn document_load(msg: impl Into<String>) -> Self {
        Self::new(FaultKind::DocumentLoad, msg)
    }

    /// Create an internal fault
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(FaultKind::Internal, msg)
    }
}

/// Errors that can occur at the bridge level
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A handle was used after release or was never issued
    #[error("Invalid host handle {0:#x}")]
    InvalidHandle(u64),

    /// A handle refers to an object of the wrong kind for the operation
    #[error("Host handle {handle:#x} does not refer to a {expected}")]
    WrongHandleKind {
        /// Offending handle
        handle: u64,
        /// What the operation expected
        expected: &'static str,
    },

    /// A re-entrant call arrived with no engine bound to the current frame
    #[error("No active script engine is bound to the current thread")]
    NoActiveEngine,

    /// Module resolution failed
    #[error("Error resolving module '{specifier}': {reason}")]
    ModuleResolution {
        /// Module specifier
        specifier: String,
        /// Reason for failure
        reason: String,
    },

    /// Fault raised by host code
    #[error("{0}")]
    Host(#[from] HostFault),

    /// Host code panicked inside a boundary call
    #[error("Panic in host callback: {0}")]
    Panic(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing error
    #[error("Invalid document URI: {0}")]
    Url(#[from] url::ParseError),

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a module resolution error
    pub fn module_resolution(specifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModuleResolution {
            specifier: specifier.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error indicates a caller bug rather than an expected
    /// runtime condition
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidHandle(_)
                | BridgeError::WrongHandleKind { .. }
                | BridgeError::NoActiveEngine
        )
    }

    /// Convert into the host fault carried across the boundary
    pub fn into_fault(self) -> HostFault {
        match self {
            BridgeError::Host(fault) => fault,
            BridgeError::ModuleResolution { .. } => HostFault::document_load(self.to_string()),
            BridgeError::Panic(_) => HostFault::internal(self.to_string()),
            other => HostFault::invalid_operation(other.to_string()),
        }
    }
}
