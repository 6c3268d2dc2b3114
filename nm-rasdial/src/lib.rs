// rasdial-like VPN control for NetworkManager
// Shared modules for the CLI and tests

#![warn(missing_docs)]

//! NetworkManager VPN helper library
//!
//! This library lists, activates and deactivates NetworkManager VPN profiles,
//! optionally rewriting a profile's stored credentials before activating it.
//!
//! # Main Components
//!
//! - [`config`]: Configuration file parsing and validation
//! - [`connectivity`]: Internet reachability probe and service restart
//! - [`credentials`]: Credential rewrite and profile reload
//! - [`error`]: Conditions callers can tell apart
//! - [`helper`]: VPN operations (list, connect, disconnect)
//! - [`keyfile`]: Lossless editing of INI-style profile files
//! - [`nm_service`]: NetworkManager interface and its D-Bus adapter
//! - [`privilege`]: One-time root check
//! - [`types`]: Shared data structures
//! - [`wait`]: Bounded polling

pub mod config;
pub mod connectivity;
pub mod credentials;
pub mod error;
pub mod helper;
pub mod keyfile;
pub mod nm_service;
pub mod privilege;
pub mod types;
pub mod wait;
