pub mod command_link;
pub mod config;
pub mod error;
pub mod poller;
pub mod transport;

pub use command_link::{
    CommandLink, CommandLinkClient, ConnectionState, LinkConfig, LinkEvent, ReconnectPolicy,
};
pub use error::{ConfigError, LinkError, PollError};
pub use poller::{AlertPoller, FeedSnapshot, HttpMonitoringApi, MonitoringApi};
pub use transport::ChannelHandle;
