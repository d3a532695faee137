mod command;
mod connection;

pub use command::ConnectionCommand;
pub use connection::Connection;
