//! Host network side effects of bring-up: NetworkManager hand-off, DHCP and
//! routing.

pub mod dhcp;
pub mod manager;
pub mod route;

pub use dhcp::DhcpClient;
pub use manager::ManagedStateGuard;
pub use route::remove_default_route;
