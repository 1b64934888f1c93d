//! Event multiplexer: envelope in, handler fan-out.
//!
//! One malformed message must never take down the stream, so payload decoding
//! failures are logged per-envelope and skipped. The event name is an opaque
//! routing key; payload shape beyond "parses as JSON" is each consumer's
//! business.

use tracing::{debug, warn};

use crate::registry::HandlerRegistry;
use crate::sse::RawEnvelope;

/// Decode one envelope's payload and invoke every handler registered for its
/// event name, in registration order, synchronously.
pub fn dispatch_envelope(registry: &HandlerRegistry, envelope: &RawEnvelope) {
    let payload: serde_json::Value = match serde_json::from_str(&envelope.data) {
        Ok(value) => value,
        Err(err) => {
            warn!(event = %envelope.event, %err, "dropping undecodable payload");
            return;
        }
    };
    let ran = registry.dispatch(&envelope.event, &payload);
    if ran == 0 {
        debug!(event = %envelope.event, "no handler registered, dropping event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn envelope(event: &str, data: &str) -> RawEnvelope {
        RawEnvelope {
            event: event.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn malformed_payload_does_not_stop_later_messages() {
        let registry = HandlerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.subscribe(
            "nueva-solicitud",
            Arc::new(move |payload| sink.lock().unwrap().push(payload.clone())),
        );

        dispatch_envelope(&registry, &envelope("nueva-solicitud", "{\"id\":1}"));
        dispatch_envelope(&registry, &envelope("nueva-solicitud", "{not json"));
        dispatch_envelope(&registry, &envelope("nueva-solicitud", "{\"id\":2}"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0]["id"], 1);
        assert_eq!(seen[1]["id"], 2);
    }

    #[test]
    fn unknown_event_is_dropped_quietly() {
        let registry = HandlerRegistry::new();
        // No handlers at all: must not panic.
        dispatch_envelope(&registry, &envelope("desconocido", "{}"));
    }
}
