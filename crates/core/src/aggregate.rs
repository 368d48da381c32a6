//! Aggregate roots: the records every mutation goes through.

/// A consistency boundary with a stable identity and a revision counter.
///
/// Products, endpoints, applications, environments and subscriptions are
/// aggregates. Each change happens through the aggregate's own methods and
/// bumps [`AggregateRoot::version`]; other records refer to it only by id.
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Revision of the aggregate's state, starting at 1 on creation.
    fn version(&self) -> u64;

    /// Whether `self` is a later revision of the same aggregate than `other`.
    fn supersedes(&self, other: &Self) -> bool
    where
        Self: Sized,
    {
        self.id() == other.id() && self.version() > other.version()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doc {
        id: u32,
        revision: u64,
    }

    impl AggregateRoot for Doc {
        type Id = u32;

        fn id(&self) -> &u32 {
            &self.id
        }

        fn version(&self) -> u64 {
            self.revision
        }
    }

    #[test]
    fn supersedes_needs_same_id_and_higher_revision() {
        let v1 = Doc { id: 1, revision: 1 };
        let v2 = Doc { id: 1, revision: 2 };
        let other = Doc { id: 2, revision: 9 };
        assert!(v2.supersedes(&v1));
        assert!(!v1.supersedes(&v2));
        assert!(!other.supersedes(&v1));
    }
}
