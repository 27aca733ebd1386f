//! privcheck: configuration, observability and file-backed roles for running
//! Warden has-privileges checks outside a cluster.
//!
//! # How it fits
//! `warden-authz` owns the authorization model; this crate loads a role file
//! and privilege table from disk and wires them into a
//! [`warden_authz::HasPrivilegesEvaluator`].
pub mod app;
pub mod config;
pub mod observability;
pub mod role_file;
