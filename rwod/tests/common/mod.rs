pub mod client;
pub mod logging;
pub mod server;

pub use client::{
    OTHER_PRIVATE_KEY, PRIVATE_KEY, WsClient, connect, next_json, request, session_token, sign_token,
};
pub use logging::init_test_logging;
pub use server::TestServer;
