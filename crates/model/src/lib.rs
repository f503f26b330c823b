//! The normalized protocol shared by every model backend.
//!
//! This crate establishes an unified contract for driving various LLM
//! backends, so that callers can switch between them without modifying
//! their own code. Backends differ in wire protocols, streaming framing and
//! tool calling conventions; adapters hide those differences behind the
//! [`Prompter`] trait and the types defined here.
//!
//! Types in this crate don't define much behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;
mod tool;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
pub use tool::*;
