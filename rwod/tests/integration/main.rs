#[path = "../common/mod.rs"]
mod common;

mod auth_tests;
mod file_ops_tests;
mod liveness_tests;
