#![forbid(unsafe_code)]

//! Views that record what they render.
//!
//! A [`RenderLog`] is shared between a test and any number of views. Each
//! render appends the merged props the view received, so a test can assert
//! both *how often* a view rendered and *what* it saw.
//!
//! The log serializes to JSONL (one object per render) for postmortem
//! output when an assertion fails.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use serde_json::json;
use tether_core::{Props, Result, Value};
use tether_runtime::{Connected, ConnectedComponent, Scope, View};

/// Shared record of rendered props.
#[derive(Clone, Default)]
pub struct RenderLog {
    entries: Rc<RefCell<Vec<Props>>>,
}

impl fmt::Debug for RenderLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.borrow().iter()).finish()
    }
}

impl RenderLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, props: &Props) {
        tracing::trace!(message = "harness.render", index = self.len(), keys = props.len());
        self.entries.borrow_mut().push(props.clone());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Props> {
        self.entries.borrow().get(index).cloned()
    }

    #[must_use]
    pub fn last(&self) -> Option<Props> {
        self.entries.borrow().last().cloned()
    }

    #[must_use]
    pub fn entries(&self) -> Ref<'_, Vec<Props>> {
        self.entries.borrow()
    }

    /// The value `key` had in each render, `Null` where absent.
    #[must_use]
    pub fn values(&self, key: &str) -> Vec<Value> {
        self.entries
            .borrow()
            .iter()
            .map(|props| props.get(key).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// One JSON object per render: `{"render": n, "props": {...}}`.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        self.entries
            .borrow()
            .iter()
            .enumerate()
            .map(|(index, props)| {
                json!({ "render": index, "props": value_to_json(&Value::from(props.clone())) }).to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// JSON rendering of a [`Value`]. Functions and opaque payloads become
/// descriptive strings.
#[must_use]
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Str(s) => json!(&**s),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(props) => serde_json::Value::Object(
            props
                .iter()
                .map(|(key, value)| (key.to_string(), value_to_json(value)))
                .collect(),
        ),
        Value::Func(_) => json!("<function>"),
        Value::Opaque(opaque) => json!(format!("<opaque {}>", opaque.type_name())),
    }
}

/// A leaf view that records every render.
#[derive(Debug, Clone)]
pub struct RecordingView {
    log: RenderLog,
}

impl RecordingView {
    #[must_use]
    pub fn new(log: &RenderLog) -> Self {
        Self { log: log.clone() }
    }

    /// A view factory for [`Connector::wrap`](tether_runtime::Connector::wrap).
    pub fn factory(log: &RenderLog) -> impl Fn() -> Self + 'static {
        let log = log.clone();
        move || Self::new(&log)
    }

    #[must_use]
    pub fn log(&self) -> &RenderLog {
        &self.log
    }
}

impl View for RecordingView {
    fn render(&mut self, props: &Props, _scope: &Scope) -> Result<()> {
        self.log.record(props);
        Ok(())
    }
}

type PropsMap = Rc<dyn Fn(&Props) -> Props>;

/// A view that mounts one connected child on first render and hands it
/// freshly derived own props on every later render.
pub struct Nest<V: View> {
    child: ConnectedComponent<V>,
    map: PropsMap,
    log: Option<RenderLog>,
    mounted: Option<Connected<V>>,
}

impl<V: View> fmt::Debug for Nest<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nest")
            .field("child", &self.child)
            .field("mounted", &self.mounted)
            .finish()
    }
}

impl<V: View> Nest<V> {
    pub fn new(child: ConnectedComponent<V>, map: impl Fn(&Props) -> Props + 'static) -> Self {
        Self {
            child,
            map: Rc::new(map),
            log: None,
            mounted: None,
        }
    }

    /// Record this view's own renders too.
    #[must_use]
    pub fn with_log(mut self, log: &RenderLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    /// A factory producing a fresh `Nest` per mount.
    pub fn factory(
        child: ConnectedComponent<V>,
        map: impl Fn(&Props) -> Props + 'static,
        log: Option<RenderLog>,
    ) -> impl Fn() -> Self + 'static {
        let map: PropsMap = Rc::new(map);
        move || Self {
            child: child.clone(),
            map: Rc::clone(&map),
            log: log.clone(),
            mounted: None,
        }
    }

    #[must_use]
    pub fn child(&self) -> Option<&Connected<V>> {
        self.mounted.as_ref()
    }

    /// Unmount the child, as a parent removing a subtree would.
    pub fn remove_child(&mut self) {
        if let Some(child) = self.mounted.take() {
            child.unmount();
        }
    }
}

impl<V: View> View for Nest<V> {
    fn render(&mut self, props: &Props, scope: &Scope) -> Result<()> {
        if let Some(log) = &self.log {
            log.record(props);
        }
        let own = (self.map)(props);
        if let Some(child) = &self.mounted {
            return child.set_props(own);
        }
        self.mounted = Some(self.child.mount(scope, own)?);
        Ok(())
    }
}
