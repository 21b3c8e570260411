// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Ambient engine context.
//!
//! Native callbacks carry no engine parameter, so the host binds the engine
//! to the current thread right before crossing into native code and unbinds
//! it when that call returns. Bindings nest: a re-entrant call from a
//! different engine shadows the outer one until its scope ends.
//!
//! The binding lives in thread-local storage, so native threads servicing
//! different engines never observe each other's binding.

use super::{EngineId, HostEngine};
use crate::error::{BridgeError, Result};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

thread_local! {
    static ACTIVE_ENGINES: RefCell<Vec<Arc<dyn HostEngine>>> = const { RefCell::new(Vec::new()) };
}

/// Binding of an engine to the current thread.
///
/// Dropping the scope removes the binding. Scopes are not `Send`: a binding
/// must end on the thread that created it.
#[must_use = "the engine is unbound as soon as the scope is dropped"]
pub struct EngineScope {
    engine: EngineId,
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl EngineScope {
    /// Bind `engine` to the current thread.
    pub fn enter(engine: Arc<dyn HostEngine>) -> Self {
        let id = engine.id();
        let depth = ACTIVE_ENGINES.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(engine);
            stack.len()
        });
        tracing::trace!(engine = %id, depth, "engine scope entered");
        Self {
            engine: id,
            depth,
            _not_send: PhantomData,
        }
    }

    /// The bound engine's id.
    pub fn engine_id(&self) -> EngineId {
        self.engine
    }
}

impl Drop for EngineScope {
    fn drop(&mut self) {
        let retired = ACTIVE_ENGINES.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.len() != self.depth {
                tracing::error!(
                    engine = %self.engine,
                    expected = self.depth,
                    actual = stack.len(),
                    "engine scopes dropped out of order"
                );
            }
            let keep = self.depth.saturating_sub(1).min(stack.len());
            stack.split_off(keep)
        });
        // Engines may own objects whose destructors look up the current
        // engine, so they are dropped after the borrow ends.
        drop(retired);
        tracing::trace!(engine = %self.engine, "engine scope exited");
    }
}

/// The engine bound to the innermost active scope on this thread.
pub fn current_engine() -> Result<Arc<dyn HostEngine>> {
    ACTIVE_ENGINES
        .with(|stack| stack.borrow().last().cloned())
        .ok_or(BridgeError::NoActiveEngine)
}

/// Number of nested engine bindings on this thread.
pub fn active_depth() -> usize {
    ACTIVE_ENGINES.with(|stack| stack.borrow().len())
}

/// Run `f` with `engine` bound to the current thread.
pub fn with_engine<R>(engine: Arc<dyn HostEngine>, f: impl FnOnce() -> R) -> R {
    let _scope = EngineScope::enter(engine);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptEngine;
    use crate::handle::HandleTable;
    use crate::object::HostObject;
    use parking_lot::Mutex;

    fn engine(name: &str) -> Arc<dyn HostEngine> {
        Arc::new(ScriptEngine::new(name, Arc::new(HandleTable::new())))
    }

    #[test]
    fn test_no_engine() {
        assert!(matches!(current_engine(), Err(BridgeError::NoActiveEngine)));
        assert_eq!(active_depth(), 0);
    }

    #[test]
    fn test_scope_binds_and_unbinds() {
        let engine = engine("outer");
        let id = engine.id();
        {
            let scope = EngineScope::enter(engine);
            assert_eq!(scope.engine_id(), id);
            assert_eq!(current_engine().unwrap().id(), id);
        }
        assert!(current_engine().is_err());
    }

    #[test]
    fn test_nested_scopes() {
        let outer = engine("outer");
        let inner = engine("inner");
        let (outer_id, inner_id) = (outer.id(), inner.id());

        with_engine(outer, || {
            assert_eq!(current_engine().unwrap().id(), outer_id);
            with_engine(inner, || {
                assert_eq!(current_engine().unwrap().id(), inner_id);
                assert_eq!(active_depth(), 2);
            });
            assert_eq!(current_engine().unwrap().id(), outer_id);
        });
        assert_eq!(active_depth(), 0);
    }

    #[test]
    fn test_unbound_on_panic() {
        let result = std::panic::catch_unwind(|| {
            with_engine(engine("panicky"), || panic!("callback failed"));
        });
        assert!(result.is_err());
        assert_eq!(active_depth(), 0);
    }

    #[test]
    fn test_threads_are_isolated() {
        let a = engine("a");
        let a_id = a.id();
        let _scope = EngineScope::enter(a);

        crossbeam::thread::scope(|s| {
            s.spawn(|_| {
                assert!(current_engine().is_err());
                let b = engine("b");
                let b_id = b.id();
                with_engine(b, || assert_eq!(current_engine().unwrap().id(), b_id));
            });
        })
        .unwrap();

        assert_eq!(current_engine().unwrap().id(), a_id);
    }

    struct LooksUpEngine {
        saw_engine: Arc<Mutex<Option<bool>>>,
    }

    impl HostObject for LooksUpEngine {}

    impl Drop for LooksUpEngine {
        fn drop(&mut self) {
            *self.saw_engine.lock() = Some(current_engine().is_ok());
        }
    }

    #[test]
    fn test_engine_dropped_outside_borrow() {
        let saw_engine = Arc::new(Mutex::new(None));
        let handles = Arc::new(HandleTable::new());
        handles.acquire(Arc::new(LooksUpEngine {
            saw_engine: Arc::clone(&saw_engine),
        }));

        // The scope holds the last reference to the engine, and through it
        // to the table and the object.
        with_engine(Arc::new(ScriptEngine::new("last", handles)), || {
            assert_eq!(active_depth(), 1);
        });

        assert_eq!(*saw_engine.lock(), Some(false));
        assert_eq!(active_depth(), 0);
    }
}
