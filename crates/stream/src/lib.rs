//! Stream reconstruction shared by all model backends.
//!
//! Backends stream responses as framed JSON chunks whose content is
//! fragmented: text arrives piece by piece, tool calls are announced once
//! and their arguments follow in pieces. This crate reads such a stream and
//! turns it into an ordered channel of [`bellhop_model::StreamResponse`]
//! events. Adapters only need to provide a [`ChunkDecoder`] for their chunk
//! shape.

#[macro_use]
extern crate tracing;

mod chunk;
mod framing;
mod io;
mod reconstruct;
pub mod wire;

pub use chunk::{CandidateDelta, Chunk, ChunkDecoder, ToolFragment};
pub use framing::Framing;
pub use io::{Chunks, ChunksError};
pub use reconstruct::{Reconstructor, spawn};
