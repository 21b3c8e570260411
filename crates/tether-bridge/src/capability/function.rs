// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Callable host objects

use super::{DynamicObject, Invocability};
use crate::error::HostFault;
use crate::object::HostObject;
use crate::value::HostValue;
use std::fmt;
use std::sync::Arc;

type Callback = dyn Fn(&[HostValue]) -> Result<HostValue, HostFault> + Send + Sync;

/// A host function exposed to script.
#[derive(Clone)]
pub struct HostFunction {
    name: String,
    arity: Option<usize>,
    constructible: bool,
    callback: Arc<Callback>,
}

impl HostFunction {
    /// Wrap a closure
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&[HostValue]) -> Result<HostValue, HostFault> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity: None,
            constructible: false,
            callback: Arc::new(callback),
        }
    }

    /// Require exactly `arity` arguments
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }

    /// Allow calls with `new`
    pub fn constructible(mut self) -> Self {
        self.constructible = true;
        self
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("constructible", &self.constructible)
            .finish()
    }
}

impl HostObject for HostFunction {
    fn as_dynamic(&self) -> Option<&dyn DynamicObject> {
        Some(self)
    }
}

impl DynamicObject for HostFunction {
    fn get_property(&self, name: &str) -> Result<HostValue, HostFault> {
        match name {
            "name" => Ok(HostValue::String(self.name.clone())),
            "length" => Ok(HostValue::Number(self.arity.unwrap_or(0) as f64)),
            _ => Err(HostFault::member_not_found(name)),
        }
    }

    fn set_property(&self, name: &str, _value: HostValue) -> Result<(), HostFault> {
        Err(HostFault::invalid_operation(format!(
            "Cannot assign to read only property '{}' of function '{}'",
            name, self.name
        )))
    }

    fn delete_property(&self, _name: &str) -> Result<bool, HostFault> {
        Ok(false)
    }

    fn property_names(&self) -> Result<Vec<String>, HostFault> {
        Ok(vec!["length".to_string(), "name".to_string()])
    }

    fn invoke(&self, as_constructor: bool, args: &[HostValue]) -> Result<HostValue, HostFault> {
        if as_constructor && !self.constructible {
            return Err(HostFault::not_invocable(format!("{} is not a constructor", self.name)));
        }
        if let Some(arity) = self.arity {
            if args.len() != arity {
                return Err(HostFault::invalid_argument(format!(
                    "{} expects {} argument(s), got {}",
                    self.name,
                    arity,
                    args.len()
                )));
            }
        }
        tracing::trace!(function = %self.name, args = args.len(), "invoking host function");
        (self.callback)(args)
    }

    fn invocability(&self) -> Invocability {
        if self.constructible {
            Invocability::Constructor
        } else {
            Invocability::Delegate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultKind;

    fn add() -> HostFunction {
        HostFunction::new("add", |args| {
            let sum = args.iter().filter_map(HostValue::as_number).sum::<f64>();
            Ok(HostValue::Number(sum))
        })
        .with_arity(2)
    }

    #[test]
    fn test_invoke() {
        let result = add()
            .invoke(false, &[HostValue::from(2), HostValue::from(3)])
            .unwrap();
        assert_eq!(result, HostValue::Number(5.0));
    }

    #[test]
    fn test_wrong_arity() {
        let fault = add().invoke(false, &[HostValue::from(1)]).unwrap_err();
        assert_eq!(fault.kind, FaultKind::InvalidArgument);
        assert!(fault.message.contains("expects 2"));
    }

    #[test]
    fn test_constructor() {
        let plain = add();
        assert_eq!(plain.invocability(), Invocability::Delegate);
        assert_eq!(
            plain.invoke(true, &[HostValue::Null, HostValue::Null]).unwrap_err().kind,
            FaultKind::NotInvocable
        );

        let ctor = HostFunction::new("Point", |_| Ok(HostValue::Null)).constructible();
        assert_eq!(ctor.invocability(), Invocability::Constructor);
        assert!(ctor.invoke(true, &[]).is_ok());
    }

    #[test]
    fn test_properties() {
        let f = add();
        assert_eq!(f.get_property("name").unwrap(), HostValue::from("add"));
        assert_eq!(f.get_property("length").unwrap(), HostValue::Number(2.0));
        assert!(f.set_property("name", HostValue::Null).is_err());
        assert!(!f.delete_property("name").unwrap());
    }
}
