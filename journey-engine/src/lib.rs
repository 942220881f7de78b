//! Journey Engine - Version Resolution and Cache-Aside Reads
//!
//! Resolves the active version of every module, section and field in a
//! journey, assembles the response shapes and serves them through a
//! cache-aside layer keyed by request identity.

pub mod assembler;
pub mod inflight;
pub mod resolver;
pub mod service;
pub mod telemetry;

pub use assembler::ResponseAssembler;
pub use inflight::{FlightGuard, SingleFlight};
pub use resolver::{select_active, ResolvedVersions, VersionResolver};
pub use service::JourneyService;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
