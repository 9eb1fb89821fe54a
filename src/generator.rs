//! Locally-administered MAC address generation
//!
//! Candidate addresses use the QEMU/KVM vendor prefix `52:54:00` with the
//! fourth octet restricted to the low 7 bits, leaving roughly 23 bits of
//! randomness. Entropy is not required to be cryptographically secure;
//! addresses are not a security boundary.

use rand::Rng;

use crate::domain::MacAddress;
use crate::errors::{ResolverError, ResolverResult};

/// Vendor prefix reserved for locally-administered QEMU/KVM guest addresses
pub const LOCAL_PREFIX: [u8; 3] = [0x52, 0x54, 0x00];

/// Retry cap for unique-address generation. Collisions are astronomically
/// unlikely in a ~23-bit space, so hitting this cap means the exclusion set
/// effectively covers the reachable space.
pub const MAX_GENERATE_ATTEMPTS: usize = 10_000;

/// Generate a random candidate address in the reserved range.
///
/// The first three octets are the fixed vendor prefix, the fourth octet is
/// restricted to `[0x00, 0x7f]`, and the last two octets are fully random.
pub fn generate() -> MacAddress {
    let mut rng = rand::rng();
    MacAddress::from_octets([
        LOCAL_PREFIX[0],
        LOCAL_PREFIX[1],
        LOCAL_PREFIX[2],
        rng.random_range(0x00..=0x7f),
        rng.random_range(0x00..=0xff),
        rng.random_range(0x00..=0xff),
    ])
}

/// Generate a candidate guaranteed absent from the caller's exclusion set.
///
/// `is_taken` is the membership test over the exclusion set. Generation is
/// retried up to [`MAX_GENERATE_ATTEMPTS`] times; exhaustion surfaces as
/// [`ResolverError::GenerationExhausted`] rather than looping forever.
pub fn generate_unique<F>(mut is_taken: F) -> ResolverResult<MacAddress>
where
    F: FnMut(&MacAddress) -> bool,
{
    for _ in 0..MAX_GENERATE_ATTEMPTS {
        let candidate = generate();
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
    }
    Err(ResolverError::GenerationExhausted(MAX_GENERATE_ATTEMPTS))
}
