//! Error types for conflict-resolution operations

use thiserror::Error;

use crate::domain::AddressError;

/// Errors that can occur while scanning for or resolving MAC conflicts
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The management connection could not be established or maintained.
    /// Fatal for the whole pass.
    #[error("connection error: {0}")]
    Connection(String),

    /// A named machine could not be resolved to a live descriptor.
    /// Recovered locally: the machine is skipped, the pass continues.
    #[error("machine lookup failed: {0}")]
    Lookup(String),

    /// The expected old address was no longer present in the freshly
    /// fetched domain XML. Recovered locally: the rewrite and restart are
    /// skipped and the machine is left stopped.
    #[error("address {expected} not found in configuration of machine {machine}")]
    AttributeMismatch { machine: String, expected: String },

    /// Unique-address generation exceeded its retry cap. Effectively
    /// impossible given the ~23-bit random space, but surfaced as a fatal
    /// error rather than looping forever.
    #[error("failed to generate a unique MAC address after {0} attempts")]
    GenerationExhausted(usize),

    /// Malformed or unparsable domain XML
    #[error("XML error: {0}")]
    Xml(String),

    /// Invalid MAC address value
    #[error("address error: {0}")]
    Address(#[from] AddressError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Any other failure reported by the hypervisor backend
    #[error("hypervisor error: {0}")]
    Hypervisor(String),
}

/// Result type for conflict-resolution operations
pub type ResolverResult<T> = Result<T, ResolverError>;

impl From<quick_xml::Error> for ResolverError {
    fn from(err: quick_xml::Error) -> Self {
        ResolverError::Xml(err.to_string())
    }
}

impl From<serde_json::Error> for ResolverError {
    fn from(err: serde_json::Error) -> Self {
        ResolverError::Config(err.to_string())
    }
}
