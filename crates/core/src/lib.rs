//! # Medinet Core
//!
//! Core business logic for the medinet clinical-record coordination system:
//! a central history aggregator that merges per-visit entries from many
//! independently-authenticated facilities into one longitudinal record per
//! national id, plus the per-facility encounter lifecycle and the
//! per-assignment access control around it.
//!
//! - [`auth`] -- facility write admission
//! - [`central`] -- the cross-facility patient aggregate
//! - [`encounter`] -- the encounter state machine
//! - [`access`] -- doctor-scoped authorization and listings
//! - [`artifacts`] -- lab requests and prescriptions
//! - [`projection`] -- the composed clinician-facing read model
//! - [`store`] -- shared in-memory collections and their atomicity rules
//!
//! **No API concerns**: transport framing, HTTP/gRPC servers and staff
//! credential issuance live outside this crate. Services here take the
//! authenticated identity ([`auth::FacilityContext`], a doctor's
//! [`medinet_types::StaffId`]) as explicit arguments.

pub mod access;
pub mod artifacts;
pub mod auth;
pub mod central;
pub mod config;
pub mod encounter;
pub mod error;
pub mod projection;
pub mod store;

pub use config::CoreConfig;
pub use error::{RecordError, RecordResult};
pub use store::MemoryStore;
