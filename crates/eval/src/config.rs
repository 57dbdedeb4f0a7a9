//! Runtime options, deserializable from the `[runtime]` table of a
//! `tessera.toml` file.

use serde::{Deserialize, Serialize};

use crate::print::{shared, SharedPrintSink, StderrSink, StdoutSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintTarget {
    #[default]
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Run the definedness check before every top-level sequence and every
    /// predicate registration.
    pub validate: bool,
    /// Where `Print` writes.
    pub print_target: PrintTarget,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            validate: true,
            print_target: PrintTarget::Stdout,
        }
    }
}

impl RuntimeConfig {
    pub fn print_sink(&self) -> SharedPrintSink {
        match self.print_target {
            PrintTarget::Stdout => shared(StdoutSink),
            PrintTarget::Stderr => shared(StderrSink),
        }
    }
}
