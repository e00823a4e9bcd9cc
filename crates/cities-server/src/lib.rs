pub mod server;

pub use server::{CitiesServer, router};
