pub mod dispatcher;
pub mod protocol;
pub mod server;
pub mod session;

#[cfg(test)]
mod testing;

pub use dispatcher::Dispatcher;
pub use server::McpServer;
pub use session::SessionSlot;
