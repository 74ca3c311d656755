use std::fmt::{Debug, Formatter, Result};
use std::hash::{Hash, Hasher};

use crate::key::Key;

/// An immutable handle identifying a ring member: its identifier and the
/// address its listener is reachable at.
#[derive(Clone, Serialize, Deserialize)]
pub struct NodeData {
    pub id: Key,
    pub addr: String,
}

/// Two handles refer to the same ring member exactly when their ids match.
impl PartialEq for NodeData {
    fn eq(&self, other: &NodeData) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeData {}

impl Hash for NodeData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for NodeData {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{} - {:?}", self.addr, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::NodeData;
    use crate::key::Key;
    use crate::KEY_LENGTH;

    #[test]
    fn test_equality_is_id_equality() {
        let a = NodeData {
            id: Key::new([3; KEY_LENGTH]),
            addr: String::from("127.0.0.1:9000"),
        };
        let b = NodeData {
            id: Key::new([3; KEY_LENGTH]),
            addr: String::from("127.0.0.1:9001"),
        };
        let c = NodeData {
            id: Key::new([4; KEY_LENGTH]),
            addr: String::from("127.0.0.1:9000"),
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
