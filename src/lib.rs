//! Spillway moves delayed jobs between two tiers of a job-queue deployment:
//! a durable, replicated SlateDB store that holds jobs scheduled far in the
//! future, and a fast queue engine that performs the final precise delay and
//! dispatch. A per-pool background pumper, serialized across processes by a
//! lease on the pool name, periodically promotes jobs whose ready time has
//! entered a lookahead window and retires them from durable storage.
//!
//! Delivery is at-least-once: a crash between engine publish and durable
//! delete re-promotes the affected jobs on the next cycle. Consumers of the
//! fast engine must tolerate duplicate delivery of the same job id.

pub mod codec;
pub mod engine;
pub mod job;
pub mod keys;
pub mod lock;
pub mod manager;
pub mod metrics;
pub mod persistence;
pub mod pumper;
pub mod settings;
pub mod storage;
pub mod trace;
