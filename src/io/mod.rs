//! Ambient transport layer: concrete [`crate::message::InputSource`]
//! and [`crate::export::ExportDestination`] implementations over real
//! sockets and files (§11.1, §11.2). None of this is reached by the
//! core codec; it exists for the reference collector binary and for
//! callers who don't want to write their own transport glue.

pub mod sink;
pub mod tcp;
pub mod udp;

pub use sink::{UdpExportDestination, WriteExportDestination};
pub use tcp::TcpInputSource;
pub use udp::UdpInputSource;
