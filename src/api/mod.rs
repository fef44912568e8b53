pub mod handler;
pub mod middleware;
pub mod server;

pub use server::{AppState, router, serve};
