use sha3::{Digest, Sha3_256};
use std::fmt::{Debug, Formatter, Result};

use crate::{KEY_BITS, KEY_LENGTH};

/// An identifier on the Chord ring.
///
/// Identifiers are fixed-width, big-endian values in `[0, 2^KEY_BITS)`,
/// produced by hashing a node's address or a key's string form and truncating
/// the digest. The derived ordering is the plain numeric one; every interval
/// test in the protocol is circular and goes through [`is_between`] or
/// [`is_between_right_incl`] instead.
///
/// [`is_between`]: #method.is_between
/// [`is_between_right_incl`]: #method.is_between_right_incl
#[derive(Ord, PartialOrd, PartialEq, Eq, Clone, Hash, Serialize, Deserialize, Default, Copy)]
pub struct Key(pub [u8; KEY_LENGTH]);

impl Debug for Key {
    fn fmt(&self, f: &mut Formatter) -> Result {
        let hex_vec: Vec<String> = self.0.iter().map(|b| format!("{:02X}", b)).collect();
        write!(f, "{}", hex_vec.join(""))
    }
}

impl Key {
    /// Constructs a new `Key` from a byte array.
    pub fn new(data: [u8; KEY_LENGTH]) -> Self {
        Key(data)
    }

    /// Hashes `data` into the identifier space: a Sha3-256 digest truncated to
    /// `KEY_LENGTH` bytes.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(data);
        let digest = hasher.finalize();
        let mut ret = [0; KEY_LENGTH];
        ret.copy_from_slice(&digest[..KEY_LENGTH]);
        Key(ret)
    }

    /// Returns `true` if `self` lies strictly inside the open clockwise arc
    /// `(a, b)`.
    ///
    /// `a == b` describes the empty arc, so the result is `false` for every
    /// `self`; detecting a ring of one must use identity comparison, never an
    /// arc test.
    pub fn is_between(&self, a: &Key, b: &Key) -> bool {
        if a == b {
            false
        } else if a < b {
            a < self && self < b
        } else {
            a < self || self < b
        }
    }

    /// Returns `true` if `self` lies in the clockwise arc `(a, b]`.
    ///
    /// As [`is_between`], but with the right endpoint included; for `a == b`
    /// only `self == b` holds.
    ///
    /// [`is_between`]: #method.is_between
    pub fn is_between_right_incl(&self, a: &Key, b: &Key) -> bool {
        if a == b {
            self == b
        } else if a < b {
            a < self && self <= b
        } else {
            a < self || self <= b
        }
    }

    /// Returns `(self + 2^i) mod 2^KEY_BITS`, the start of finger-table row
    /// `i`.
    pub fn finger_start(&self, i: usize) -> Key {
        debug_assert!(i < KEY_BITS);
        let mut bytes = self.0;
        let mut carry = 1u16 << (i % 8);
        let mut index = KEY_LENGTH - 1 - i / 8;
        loop {
            let sum = u16::from(bytes[index]) + carry;
            bytes[index] = sum as u8;
            carry = sum >> 8;
            // the carry out of the top byte wraps around the ring
            if carry == 0 || index == 0 {
                break;
            }
            index -= 1;
        }
        Key(bytes)
    }
}

#[cfg(test)]
mod tests {
    extern crate num_bigint;
    use self::num_bigint::BigUint;

    use super::Key;
    use crate::{KEY_BITS, KEY_LENGTH};

    fn key(value: u8) -> Key {
        let mut bytes = [0u8; KEY_LENGTH];
        bytes[KEY_LENGTH - 1] = value;
        Key(bytes)
    }

    #[test]
    fn test_hash_is_deterministic_and_truncated() {
        let a = Key::hash(b"localhost:9000");
        let b = Key::hash(b"localhost:9000");
        let c = Key::hash(b"localhost:9001");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.0.len(), KEY_LENGTH);
    }

    #[test]
    fn test_between_simple_arc() {
        assert!(key(5).is_between(&key(1), &key(10)));
        assert!(!key(1).is_between(&key(1), &key(10)));
        assert!(!key(10).is_between(&key(1), &key(10)));
        assert!(!key(15).is_between(&key(1), &key(10)));
    }

    #[test]
    fn test_between_wrapped_arc() {
        // (200, 10) crosses zero
        assert!(key(250).is_between(&key(200), &key(10)));
        assert!(key(0).is_between(&key(200), &key(10)));
        assert!(key(5).is_between(&key(200), &key(10)));
        assert!(!key(10).is_between(&key(200), &key(10)));
        assert!(!key(200).is_between(&key(200), &key(10)));
        assert!(!key(100).is_between(&key(200), &key(10)));
    }

    #[test]
    fn test_between_empty_arc() {
        for value in [0, 7, 255] {
            assert!(!key(value).is_between(&key(7), &key(7)));
        }
    }

    #[test]
    fn test_between_right_incl() {
        assert!(key(10).is_between_right_incl(&key(1), &key(10)));
        assert!(!key(1).is_between_right_incl(&key(1), &key(10)));
        assert!(key(0).is_between_right_incl(&key(200), &key(10)));
        assert!(key(10).is_between_right_incl(&key(200), &key(10)));
        assert!(!key(200).is_between_right_incl(&key(200), &key(10)));

        // a == b keeps only the endpoint
        assert!(key(7).is_between_right_incl(&key(7), &key(7)));
        assert!(!key(8).is_between_right_incl(&key(7), &key(7)));
    }

    #[test]
    fn test_finger_start_matches_bigint() {
        let modulus = BigUint::from(1u8) << KEY_BITS;
        for start in [0u8, 1, 127, 128, 254, 255] {
            let k = key(start);
            for i in 0..KEY_BITS {
                let expected =
                    (BigUint::from_bytes_be(&k.0) + (BigUint::from(1u8) << i)) % &modulus;
                let actual = BigUint::from_bytes_be(&k.finger_start(i).0);
                assert_eq!(actual, expected, "start {} row {}", start, i);
            }
        }
    }

    #[test]
    fn test_finger_start_wraps() {
        assert_eq!(key(255).finger_start(0), key(0));
        assert_eq!(key(255).finger_start(7), key(127));
    }
}
