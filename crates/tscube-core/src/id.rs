//! Strongly-typed indices used across the engine.
//!
//! Chunk and output-slot positions are plain counters inside one run; wrapping
//! them keeps a chunk number from being passed where a slot index is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! new_index {
    ($name:ident, $label:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(usize);

        impl $name {
            pub const fn new(v: usize) -> Self {
                Self(v)
            }
            pub const fn get(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {}", $label, self.0)
            }
        }
    };
}

new_index!(ChunkId, "chunk");
new_index!(SlotId, "slot");
