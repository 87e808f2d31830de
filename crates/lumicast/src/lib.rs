//! Top-level facade crate for lumicast.
//!
//! Re-exports the protocol core and the client runtime so users can depend
//! on a single crate.

pub mod core {
    pub use lumicast_core::*;
}

pub mod client {
    pub use lumicast_client::*;
}
