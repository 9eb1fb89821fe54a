// Copyright (c) 2025 - Cowboy AI, Inc.
//! Domain value objects

pub mod mac;

pub use mac::{AddressError, MacAddress};
