//! A Chord distributed hash table.
//!
//! Every node owns the arc of the identifier circle between its predecessor's
//! id (exclusive) and its own id (inclusive). Lookups hop finger tables to the
//! owner in an expected logarithmic number of steps, and the periodic
//! stabilize/notify protocol heals successor and predecessor pointers after
//! membership changes, migrating keys to their new owners as it goes.

extern crate bincode;
#[macro_use]
extern crate log;
extern crate rand;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate sha3;
extern crate thiserror;

mod error;
mod key;
mod node;
mod protocol;
mod routing;
mod storage;

pub use self::error::ChordError;
pub use self::key::Key;
pub use self::routing::FingerEntry;
pub use self::node::node_data::NodeData;
pub use self::node::Node;

/// The number of bits in the identifier space. The ring holds `2^KEY_BITS`
/// distinct identifiers. Must be non-zero, at most 128, and divisible by 8.
pub const KEY_BITS: usize = 8;

/// The number of bytes in a key.
pub const KEY_LENGTH: usize = KEY_BITS / 8;

/// The maximum length of a message in bytes.
const MESSAGE_LENGTH: usize = 8196;

/// Interval between stabilization rounds in milliseconds.
const STABILIZE_INTERVAL: u64 = 100;

/// Interval between finger-table refresh steps in milliseconds.
const FIX_FINGER_INTERVAL: u64 = 90;

/// Request timeout time in milliseconds.
const REQUEST_TIMEOUT: u64 = 3000;

/// Maximum number of hops a single lookup may take before it is abandoned.
/// Lookups on a healthy ring terminate long before this; the cap only exists
/// so a corrupted ring cannot loop a lookup forever.
const LOOKUP_HOP_LIMIT: usize = 128;
