//! Monotonic identifiers for threads and futures.
//!
//! Per spec §9 ("Graph of futures"), threads and futures reference each
//! other only by identifier, never by direct pointer into executor state —
//! this is what makes a [`Thread`](crate::Thread) or
//! [`Future`](crate::Future) safe to serialize, transport to a remote
//! executor, and resume later.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }
    };
}

id_type!(ThreadId, "t");
id_type!(FutureId, "f");
