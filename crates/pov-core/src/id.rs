use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global string interner for node IDs.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Monotonic counter behind `NodeId::fresh`. Never rewinds, so two clips
/// created in the same tick still get distinct ids.
static COUNTER: AtomicU64 = AtomicU64::new(0);

/// A lightweight, interned identifier for clips in the scene graph.
/// Internally a 4-byte `Spur` index.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Spur);

impl NodeId {
    /// Intern a string as a NodeId, or return the existing one.
    pub fn intern(s: &str) -> Self {
        NodeId(INTERNER.get_or_intern(s))
    }

    /// Look up an already interned id without creating a new one.
    pub fn lookup(s: &str) -> Option<Self> {
        INTERNER.get(s).map(NodeId)
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Generate a new clip id (`clip_0`, `clip_1`, ...).
    pub fn fresh() -> Self {
        Self::with_prefix("clip")
    }

    /// Generate a unique ID with a prefix. Skips any candidate that was
    /// already interned from outside (e.g. a hand-written test id).
    pub fn with_prefix(prefix: &str) -> Self {
        loop {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("{prefix}_{n}");
            if INTERNER.get(&candidate).is_none() {
                return Self::intern(&candidate);
            }
        }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(NodeId::intern(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = NodeId::intern("intro_clip");
        let b = NodeId::intern("intro_clip");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "intro_clip");
    }

    #[test]
    fn fresh_ids_are_unique() {
        let ids: Vec<NodeId> = (0..64).map(|_| NodeId::fresh()).collect();
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn fresh_skips_externally_interned_names() {
        // Pre-intern the next few candidates; fresh must step over them.
        let next = COUNTER.load(Ordering::Relaxed);
        for n in next..next + 4 {
            NodeId::intern(&format!("taken_{n}"));
        }
        let id = NodeId::with_prefix("taken");
        let n: u64 = id.as_str()["taken_".len()..].parse().unwrap();
        assert!(n >= next + 4);
    }

    #[test]
    fn lookup_does_not_intern() {
        assert!(NodeId::lookup("never_seen_before_id").is_none());
        NodeId::intern("seen_id");
        assert!(NodeId::lookup("seen_id").is_some());
    }
}
