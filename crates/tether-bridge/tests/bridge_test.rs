//! Bridge integration tests
//!
//! Drives the public entry points the way a native embedding would: objects
//! cross as handles, names as UTF-16 buffers, and every fault comes back as
//! a script value.

use std::sync::Arc;
use tether_bridge::{
    DocumentCategory, DocumentInfo, DocumentSettings, FaultKind, HandleTable, HostBridge,
    HostEngine, HostFault, HostFunction, HostObject, HostValue, Invocability,
    MemoryDocumentLoader, NativeString, PropertyBag, ScriptEngine, ScriptItem, ScriptValue,
    with_engine,
};
use url::Url;

struct Setup {
    bridge: HostBridge,
    engine: Arc<dyn HostEngine>,
    loader: Arc<MemoryDocumentLoader>,
}

fn setup() -> Setup {
    let handles = Arc::new(HandleTable::new());
    let loader = Arc::new(MemoryDocumentLoader::new());
    let engine: Arc<dyn HostEngine> = Arc::new(
        ScriptEngine::new("integration", Arc::clone(&handles))
            .with_settings(DocumentSettings::new(loader.clone())),
    );
    Setup {
        bridge: HostBridge::new(handles),
        engine,
        loader,
    }
}

struct Plain;
impl HostObject for Plain {}

#[test]
fn test_resolve_is_identity_until_release() {
    let Setup { bridge, .. } = setup();
    let object: tether_bridge::ObjectRef = Arc::new(PropertyBag::new());
    let handle = bridge.acquire_handle(Arc::clone(&object));

    let resolved = bridge.handles().resolve(handle).unwrap();
    assert!(tether_bridge::object::same_object(&resolved, &object));

    bridge.release_handle(handle).unwrap();
    assert!(bridge.handles().resolve(handle).is_err());
    assert!(bridge.get_property_names(handle).is_err());
}

#[test]
fn test_property_bag_through_bridge() {
    let Setup { bridge, .. } = setup();
    let handle = bridge.acquire_handle(Arc::new(PropertyBag::new()));
    let key = NativeString::from("k");

    bridge.set_property(handle, key.as_native(), HostValue::from("v1")).unwrap();
    assert_eq!(bridge.get_property(handle, key.as_native()).unwrap(), HostValue::from("v1"));
    bridge.set_property(handle, key.as_native(), HostValue::from("v2")).unwrap();
    assert_eq!(bridge.get_property(handle, key.as_native()).unwrap(), HostValue::from("v2"));

    let absent = NativeString::from("absent");
    let names_before = bridge.get_property_names(handle).unwrap();
    assert!(!bridge.delete_property(handle, absent.as_native()).unwrap());
    assert_eq!(bridge.get_property_names(handle).unwrap(), names_before);

    assert!(bridge.delete_property(handle, key.as_native()).unwrap());
    assert!(!bridge.get_property_names(handle).unwrap().contains(&"k".to_string()));
}

#[test]
fn test_invocability() {
    let Setup { bridge, .. } = setup();
    let plain = bridge.acquire_handle(Arc::new(Plain));
    assert_eq!(bridge.get_invocability(plain).unwrap(), Invocability::None);

    let bag = PropertyBag::new();
    bag.insert("f", HostValue::object(HostFunction::new("f", |_| Ok(HostValue::Null))));
    let bag = bridge.acquire_handle(Arc::new(bag));
    assert_ne!(bridge.get_invocability(bag).unwrap(), Invocability::None);

    let f = NativeString::from("f");
    assert_eq!(bridge.invoke_method(bag, f.as_native(), &[]).unwrap(), HostValue::Null);
}

#[test]
fn test_exception_round_trip() {
    let Setup { bridge, engine, .. } = setup();
    let source =
        bridge.acquire_handle(Arc::new(PropertyBag::new().with_engine(Arc::clone(&engine))));
    let fault = HostFault::invalid_argument("expected a number");

    let script = bridge.marshal_exception_to_script(Some(source), fault.clone());
    assert!(script.is_error());

    let item = bridge.acquire_handle(Arc::new(ScriptItem::new(engine, script)));
    let back = bridge.marshal_exception_to_host(Some(item)).unwrap();
    assert_eq!(back.kind, fault.kind);
    assert_eq!(back.message, fault.message);

    let plain = bridge.acquire_handle(Arc::new(Plain));
    assert_eq!(bridge.marshal_exception_to_host(Some(plain)), None);
}

#[test]
fn test_load_module() {
    let Setup { bridge, engine, loader } = setup();
    loader.register("file:///project/a.js", "export default 'a';").unwrap();
    let root = bridge.modules().register_document(DocumentInfo::from_uri(
        Url::parse("file:///project/index.js").unwrap(),
        DocumentCategory::StandardModule,
    ));
    let specifier = NativeString::from("./a");

    let loaded = with_engine(engine, || bridge.load_module(root, specifier.as_native())).unwrap();
    assert_ne!(loaded.document, root);
    assert_eq!(loaded.source, "export default 'a';");

    bridge.release_handle(loaded.document).unwrap();
    bridge.release_handle(root).unwrap();
    assert!(bridge.handles().is_empty());
}

#[test]
fn test_load_module_without_engine() {
    let Setup { bridge, .. } = setup();
    let root = bridge.modules().register_document(DocumentInfo::new("root"));
    let specifier = NativeString::from("./a");

    let err = bridge.load_module(root, specifier.as_native()).unwrap_err();
    let error = err.as_error().unwrap();
    assert_eq!(error.kind, FaultKind::InvalidOperation);
    assert!(error.message.contains("No active script engine"));
}

#[test]
fn test_module_context() {
    let handles = Arc::new(HandleTable::new());
    let settings = DocumentSettings::new(Arc::new(MemoryDocumentLoader::new()))
        .with_context_callback(|_| Ok(Some([("x".to_string(), HostValue::from(1))].into())));
    let engine: Arc<dyn HostEngine> =
        Arc::new(ScriptEngine::new("ctx", Arc::clone(&handles)).with_settings(settings));
    let bridge = HostBridge::new(handles);

    let doc = bridge.modules().register_document(DocumentInfo::new("main"));
    let context = with_engine(Arc::clone(&engine), || bridge.create_module_context(doc))
        .unwrap()
        .unwrap();
    assert_eq!(context.get("x"), Some(&ScriptValue::Number(1.0)));

    let Setup { bridge, engine, .. } = setup();
    let doc = bridge.modules().register_document(DocumentInfo::new("main"));
    let context = with_engine(engine, || bridge.create_module_context(doc)).unwrap();
    assert!(context.is_none());
}

#[test]
fn test_script_item_carries_thrown_objects() {
    let Setup { bridge, engine, .. } = setup();
    let thrown = engine
        .marshal_to_script(HostValue::object(PropertyBag::new()))
        .unwrap();
    let item = bridge.acquire_handle(Arc::new(ScriptItem::new(Arc::clone(&engine), thrown)));

    let fault = bridge.marshal_exception_to_host(Some(item)).unwrap();
    assert_eq!(fault.kind, FaultKind::ScriptException);

    // the item owns the thrown object's handle
    assert_eq!(bridge.handles().len(), 2);
    bridge.release_handle(item).unwrap();
    assert!(bridge.handles().is_empty());
}
