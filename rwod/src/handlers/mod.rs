//! Operation handlers.
//!
//! Each handler receives an already path-validated request and returns either
//! a complete reply or an [`OpError`](crate::error::OpError) that the
//! dispatcher turns into a failure reply.

pub mod exec;
pub mod files;
pub mod git;
pub mod listing;
