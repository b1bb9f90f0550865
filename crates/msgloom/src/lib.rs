//! Top-level facade crate for msgLoom.
//!
//! Re-exports core types and the dispatch runtime so users can depend on a single crate.

pub mod core {
    pub use msgloom_core::*;
}

pub mod dispatch {
    pub use msgloom_dispatch::*;
}
