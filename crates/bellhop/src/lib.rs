//! A gateway to large language model backends.
//!
//! Configure a [`core::Generator`] once, derive variants of it freely, and
//! drive tool-using conversations with [`core::Agent`]. The [`Session`]
//! type keeps a chat transcript across agent runs, and the crate ships a
//! CLI demonstrating all of it.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod session;
pub mod tools;

pub use session::{Reply, Session, SessionBuilder};

/// Re-exports of [`bellhop_core`] crate.
pub mod core {
    pub use bellhop_core::*;
}

/// Re-exports of [`bellhop_model`] crate.
pub mod model {
    pub use bellhop_model::*;
}

/// Re-exports of [`bellhop_stream`] crate.
pub mod stream {
    pub use bellhop_stream::*;
}

/// Re-exports of [`bellhop_openai_model`] crate.
pub mod openai {
    pub use bellhop_openai_model::*;
}
