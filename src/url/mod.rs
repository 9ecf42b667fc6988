//! URL handling module for Range-Sweep
//!
//! Identifiers are turned into request URLs through a [`UrlTemplate`], which is
//! either written out explicitly or derived from a mirror link.

mod template;

pub use template::{UrlTemplate, ID_PLACEHOLDER};
