//! Property enumeration for merge sources, and the value-merge policy.
use serde_json::{Map, Value};

use crate::JsonObject;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot<'a> {
    Own(&'a Value),
    /// Enumerable through a prototype layer but not owned by the object.
    Inherited,
}

/// Anything the editor can scan property-by-property.
pub trait ObjectSource {
    /// Enumerable properties in enumeration order.
    fn properties(&self) -> Vec<(&str, Slot<'_>)>;
}

impl ObjectSource for Map<String, Value> {
    fn properties(&self) -> Vec<(&str, Slot<'_>)> {
        self.iter().map(|(k, v)| (k.as_str(), Slot::Own(v))).collect()
    }
}

/// An object with an optional chain of prototype layers.
///
/// Keys of a prototype that the object does not shadow are enumerable but
/// inherited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayeredObject {
    pub own: JsonObject,
    pub prototype: Option<Box<LayeredObject>>,
}

impl LayeredObject {
    pub fn new(own: JsonObject) -> Self {
        Self { own, prototype: None }
    }

    pub fn with_prototype(mut self, prototype: LayeredObject) -> Self {
        self.prototype = Some(Box::new(prototype));
        self
    }
}

impl ObjectSource for LayeredObject {
    fn properties(&self) -> Vec<(&str, Slot<'_>)> {
        let mut out = self.own.properties();
        let mut layer = self.prototype.as_deref();
        let mut seen: Vec<&str> = out.iter().map(|(k, _)| *k).collect();
        while let Some(proto) = layer {
            for key in proto.own.keys() {
                if !seen.contains(&key.as_str()) {
                    seen.push(key.as_str());
                    out.push((key, Slot::Inherited));
                }
            }
            layer = proto.prototype.as_deref();
        }
        out
    }
}

// ----------------------------- Value merge ------------------------------- //

/// `target[key] ← value`: objects merge recursively, arrays concatenate,
/// anything else replaces.
pub fn merge_value(target: &mut JsonObject, key: &str, value: Value) {
    let value = match (target.get_mut(key), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            merge_objects(existing, incoming);
            return;
        }
        (Some(Value::Array(existing)), Value::Array(incoming)) => {
            existing.extend(incoming);
            return;
        }
        (_, value) => value,
    };
    target.insert(key.to_string(), value);
}

/// Merge every entry of `src` into `target` under the value-merge policy.
pub fn merge_objects(target: &mut JsonObject, src: JsonObject) {
    for (k, v) in src {
        merge_value(target, &k, v);
    }
}
