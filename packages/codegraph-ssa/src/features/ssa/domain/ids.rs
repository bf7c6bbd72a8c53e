//! Arena identifiers
//!
//! Every SSA entity lives in a `Program` arena and is addressed by one of
//! these copyable ids.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! arena_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

arena_id!(ValueId, "v");
arena_id!(BlockId, "b");
arena_id!(FunctionId, "f");
arena_id!(BlueprintId, "bp");
