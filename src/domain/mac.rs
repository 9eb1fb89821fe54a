// Copyright (c) 2025 - Cowboy AI, Inc.
//! MAC Address Value Object with Validation Invariants

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// MAC address validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid MAC address format: {0}")]
    InvalidMac(String),
}

/// MAC Address value object
///
/// Represents a 48-bit link-layer address with validation.
/// Invariants:
/// - Valid MAC address format (6 octets)
/// - Canonical representation (lowercase, colon-separated)
///
/// # Examples
///
/// ```rust
/// use macfix::domain::MacAddress;
///
/// let mac = MacAddress::new("52:54:00:aa:bb:cc").unwrap();
/// assert_eq!(mac.to_string(), "52:54:00:aa:bb:cc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Create a new MAC address with validation
    ///
    /// Accepts colon-separated, hyphen-separated, and bare hex forms.
    ///
    /// # Invariants
    /// - Valid MAC address format
    /// - 6 octets (48 bits)
    pub fn new(mac: impl AsRef<str>) -> Result<Self, AddressError> {
        let mac = mac.as_ref();
        let mac_clean = mac.replace([':', '-'], "");

        // Invariant: Must be exactly 12 hex digits (6 octets)
        if mac_clean.len() != 12 {
            return Err(AddressError::InvalidMac(mac.to_string()));
        }

        let mut octets = [0u8; 6];
        for (i, chunk) in mac_clean.as_bytes().chunks(2).enumerate() {
            let hex_str = std::str::from_utf8(chunk)
                .map_err(|_| AddressError::InvalidMac(mac.to_string()))?;
            octets[i] = u8::from_str_radix(hex_str, 16)
                .map_err(|_| AddressError::InvalidMac(mac.to_string()))?;
        }

        Ok(Self(octets))
    }

    /// Create from raw octets
    pub fn from_octets(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Get the octets
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Check if this is a multicast MAC address
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Check if the locally-administered bit is set
    pub fn is_locally_administered(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
