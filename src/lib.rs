//! kubegate - Kubernetes backend-for-frontend gateway
//!
//! Exposes Kubernetes resource CRUD and Helm release operations over HTTP,
//! gated by a role-based permission layer driven by JWT claims. All modules
//! are public for testing purposes.

pub mod authz;
pub mod claims;
pub mod errors;
pub mod gateway;
pub mod settings;
pub mod token;
pub mod web;
