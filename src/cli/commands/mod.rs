pub mod parse;
pub mod provision;
pub mod server;
