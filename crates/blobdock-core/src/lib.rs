//! Utilities shared by the blobdock crates: RFC 7807 problem responses and
//! OpenAPI document assembly.

pub mod openapi;
pub mod problemdetails;

pub use problemdetails::{Problem, ProblemDetails};
