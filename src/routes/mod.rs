//! Router Module Index
//!
//! Routes are split by who may call them. Access control is attached per module in
//! `create_router`, so an endpoint cannot end up in the wrong tier by accident.

/// Routes readable by anyone. Handlers resolve an optional `Viewer` and apply the
/// visibility policy themselves.
pub mod public;

/// Routes behind the `AuthUser` middleware. Ownership is checked inside each handler.
pub mod authenticated;

/// Staff-only reference data management.
pub mod admin;
