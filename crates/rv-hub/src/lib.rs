pub mod config;
pub mod server;
pub mod store;

pub use config::HubConfig;
pub use server::{router, HubState};
pub use store::SessionStore;
