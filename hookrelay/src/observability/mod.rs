//! Structured logging vocabulary.
//!
//! Library code emits `tracing` events with an `event` name from [`events`] and a
//! `component` field naming the emitting module. Subscriber installation belongs to
//! binaries and tests.

pub mod events;
pub mod fields;
