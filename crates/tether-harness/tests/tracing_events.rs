//! Structured log events emitted along the connect lifecycle.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use tether_core::{Props, Store, Value};
use tether_harness::{RecordingView, RenderLog, append, string_builder, string_options};
use tether_runtime::{ConnectOptions, Projection, Scope, connect};
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

struct MessageCapture {
    messages: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for MessageCapture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Msg {
            message: Option<String>,
        }
        impl tracing::field::Visit for Msg {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.message = Some(value.to_string());
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.message = Some(format!("{value:?}").trim_matches('"').to_string());
                }
            }
        }
        let mut msg = Msg { message: None };
        event.record(&mut msg);
        if let Some(message) = msg.message {
            self.messages.lock().expect("capture lock").push(message);
        }
    }
}

fn capture() -> (Arc<Mutex<Vec<String>>>, tracing::subscriber::DefaultGuard) {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(MessageCapture {
        messages: Arc::clone(&messages),
    });
    (messages, tracing::subscriber::set_default(subscriber))
}

fn position(messages: &[String], name: &str) -> usize {
    messages
        .iter()
        .position(|m| m == name)
        .unwrap_or_else(|| panic!("expected {name} in {messages:?}"))
}

#[test]
fn lifecycle_events_in_order() {
    let (messages, _guard) = capture();

    let store = string_builder();
    let scope = Scope::with_store(store.clone().into_ref());
    let mounted = connect(string_options())
        .wrap("Container", RecordingView::factory(&RenderLog::new()))
        .mount(&scope, Props::new())
        .unwrap();
    store.dispatch(append("a"));
    store.dispatch(append(""));
    mounted.unmount();

    let messages = messages.lock().expect("capture lock").clone();
    let mount = position(&messages, "connect.mount");
    let emit = position(&messages, "connection.emit");
    let short_circuit = position(&messages, "connection.short_circuit");
    let unmount = position(&messages, "connect.unmount");
    assert!(mount < short_circuit, "{messages:?}");
    assert!(short_circuit < unmount, "{messages:?}");
    assert!(emit < unmount, "{messages:?}");
    assert!(messages.iter().any(|m| m == "store.dispatch"));
    assert!(messages.iter().any(|m| m == "harness.render"));
}

#[test]
fn batch_fault_is_logged() {
    let (messages, _guard) = capture();

    let store = string_builder();
    let scope = Scope::with_store(store.clone().into_ref());
    let options = ConnectOptions::new().with_state(Projection::new(|state: &Value| {
        if state.as_str() == Some("bad") {
            Value::from(7)
        } else {
            Value::from(Props::new())
        }
    }));
    let _mounted = connect(options)
        .wrap("Container", RecordingView::factory(&RenderLog::new()))
        .mount(&scope, Props::new())
        .unwrap();

    assert!(scope.batch(|| store.dispatch(append("bad"))).is_err());
    let messages = messages.lock().expect("capture lock").clone();
    assert!(messages.iter().any(|m| m == "host.fault"), "{messages:?}");
}
