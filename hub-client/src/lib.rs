//! Client for the Brel Home Hub UDP protocol.
//!
//! [`HubSession`] is the entry point: it lists devices, reads and writes
//! them, and can start a [`ReportListener`] that keeps the shared
//! [`DeviceRegistry`] current from the hub's multicast reports.

pub mod discovery;
pub mod listener;
pub mod registry;
pub mod session;
pub mod transport;

pub use discovery::{DiscoveredHub, Discovery, DiscoveryStrategy};
pub use listener::{ReportCallback, ReportEvent, ReportListener, ReportListenerHandle};
pub use registry::DeviceRegistry;
pub use session::{log_reports, HubSession, PollReport};
pub use transport::UdpTransport;
