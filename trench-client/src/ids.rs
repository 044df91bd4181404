// SPDX-License-Identifier: Apache-2.0

/// A pluggable source of opaque correlator ids for the B-proto client.
/// Production code uses [`UuidIdGen`]; tests can substitute a fixed or
/// sequential generator to get deterministic fixtures.
pub trait IdGen: Send + Sync {
    fn next_id(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::IdGen;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    pub struct SequentialIdGen(AtomicU64);

    impl IdGen for SequentialIdGen {
        fn next_id(&self) -> String {
            self.0.fetch_add(1, Ordering::Relaxed).to_string()
        }
    }
}
