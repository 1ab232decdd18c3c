//! Port traits: the hexagonal boundary between the gate core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ HiveService (domain)
//! ```
//!
//! Driven adapters (event sinks, clocks) implement these traits.  The
//! [`HiveService`](super::service::HiveService) consumes them via generics,
//! so the core never reads the wall clock or writes output directly.

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / transport)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (log, ledger
/// persistence, dashboard feed, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: time source → domain)
// ───────────────────────────────────────────────────────────────

/// Millisecond timestamp source used for telemetry capture and ledger
/// entries.  Read once per tick.
pub trait ClockPort {
    fn now_ms(&self) -> u64;
}

impl<C: ClockPort + ?Sized> ClockPort for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
