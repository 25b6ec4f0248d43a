//! Package catalog
//!
//! Recipes known to this crate, looked up by name.

pub mod dd4hep;

pub use dd4hep::Dd4hep;

use crate::package::Package;
use crate::{Error, Result};

/// Names of all catalogued packages
pub fn names() -> Vec<&'static str> {
    vec!["dd4hep"]
}

/// Look up a package by name (case-insensitive)
pub fn lookup(name: &str) -> Result<Box<dyn Package>> {
    match name.to_ascii_lowercase().as_str() {
        "dd4hep" => Ok(Box::new(Dd4hep::new()?)),
        other => Err(Error::Other(format!(
            "Unknown package '{}' (available: {})",
            other,
            names().join(", ")
        ))),
    }
}
