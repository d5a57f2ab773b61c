use std::fmt::Display;

////////////////////////////////////////////////////////////////////////////////

/// Opaque, totally ordered identity of a node or one of its sub-components.
///
/// A plain address names a logical node; a sub-address names a component
/// living inside it. All delivery and timer bookkeeping is keyed by the
/// [root](Address::root_address) of an address.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Address {
    root: String,
    sub: Option<String>,
}

impl Address {
    /// Create the address of a logical node.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            sub: None,
        }
    }

    /// Create the address of a sub-component of this node.
    ///
    /// Sub-addresses are one level deep: taking a sub-address of a
    /// sub-address stays under the same root.
    pub fn sub_address(&self, id: impl Into<String>) -> Self {
        Self {
            root: self.root.clone(),
            sub: Some(id.into()),
        }
    }

    /// The address of the logical node this address belongs to.
    pub fn root_address(&self) -> Self {
        Self {
            root: self.root.clone(),
            sub: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.sub.is_none()
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sub {
            Some(sub) => write!(f, "{}/{}", self.root, sub),
            None => write!(f, "{}", self.root),
        }
    }
}

impl<T> From<T> for Address
where
    T: Into<String>,
{
    fn from(value: T) -> Self {
        let s: String = value.into();
        match s.find('/') {
            Some(pos) => {
                let (root, sub) = s.split_at(pos);
                Address::new(root).sub_address(&sub[1..])
            }
            None => Address::new(s),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Address;

    ////////////////////////////////////////////////////////////////////////////////

    #[test]
    fn root_of_sub() {
        let a = Address::new("replica1");
        let w = a.sub_address("worker");
        assert_eq!(w.root_address(), a);
        assert_eq!(a.root_address(), a);
        assert!(a.is_root());
        assert!(!w.is_root());
    }

    ////////////////////////////////////////////////////////////////////////////////

    #[test]
    fn ordering_groups_by_root() {
        let a = Address::new("a");
        let b = Address::new("b");
        assert!(a < b);
        assert!(a < a.sub_address("x"));
        assert!(a.sub_address("x") < b);
    }

    ////////////////////////////////////////////////////////////////////////////////

    #[test]
    fn parse() {
        assert_eq!(Address::from("a"), Address::new("a"));
        assert_eq!(Address::from("a/x"), Address::new("a").sub_address("x"));
        assert_eq!(format!("{}", Address::from("a/x")), "a/x");
    }
}
