//! `ExportDestination` implementations over files and sockets (§11.2).

use std::io::{IoSlice, Write};
use std::net::UdpSocket;

use crate::export::ExportDestination;

/// Conservative UDP-safe MTU (Ethernet MTU 1500, minus IPv4 and UDP
/// headers) used as the default `preferred_maximum_message_size` for
/// destinations that don't know better.
const DEFAULT_PREFERRED_MESSAGE_SIZE: usize = 1472;

/// Scatter-gather export over anything implementing [`std::io::Write`]
/// — a file, a `TcpStream`, a pipe. Retries on partial
/// `write_vectored` results, since a `Write` impl is free to write less
/// than the full iovec set in one call.
pub struct WriteExportDestination<W: Write> {
    sink: W,
    connectionless: bool,
    preferred_maximum_message_size: usize,
}

impl<W: Write> WriteExportDestination<W> {
    pub fn new(sink: W, connectionless: bool) -> Self {
        WriteExportDestination {
            sink,
            connectionless,
            preferred_maximum_message_size: DEFAULT_PREFERRED_MESSAGE_SIZE,
        }
    }

    pub fn with_preferred_maximum_message_size(mut self, size: usize) -> Self {
        self.preferred_maximum_message_size = size;
        self
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: Write> ExportDestination for WriteExportDestination<W> {
    fn writev(&mut self, iovecs: &[&[u8]]) -> std::io::Result<usize> {
        let mut slices: Vec<IoSlice<'_>> = iovecs.iter().map(|b| IoSlice::new(b)).collect();
        let total: usize = iovecs.iter().map(|b| b.len()).sum();
        let mut written = 0;
        while written < total {
            let n = self.sink.write_vectored(&slices)?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "write_vectored returned zero",
                ));
            }
            written += n;
            if written >= total {
                break;
            }
            IoSlice::advance_slices(&mut slices, n);
        }
        self.sink.flush()?;
        Ok(written)
    }

    fn preferred_maximum_message_size(&self) -> usize {
        self.preferred_maximum_message_size
    }

    fn is_connectionless(&self) -> bool {
        self.connectionless
    }
}

/// `ExportDestination` over a connected [`UdpSocket`]. UDP has no
/// portable scatter-send in `std`, so the iovecs are concatenated into
/// one buffer and sent as a single datagram — one message, one
/// datagram, matching the UDP input side's own one-message-per-
/// datagram assumption (§11.1).
pub struct UdpExportDestination {
    socket: UdpSocket,
    preferred_maximum_message_size: usize,
}

impl UdpExportDestination {
    pub fn connect(local_addr: &str, remote_addr: &str) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(local_addr)?;
        socket.connect(remote_addr)?;
        Ok(UdpExportDestination {
            socket,
            preferred_maximum_message_size: DEFAULT_PREFERRED_MESSAGE_SIZE,
        })
    }

    pub fn with_preferred_maximum_message_size(mut self, size: usize) -> Self {
        self.preferred_maximum_message_size = size;
        self
    }
}

impl ExportDestination for UdpExportDestination {
    fn writev(&mut self, iovecs: &[&[u8]]) -> std::io::Result<usize> {
        let total: usize = iovecs.iter().map(|b| b.len()).sum();
        let mut datagram = Vec::with_capacity(total);
        for iov in iovecs {
            datagram.extend_from_slice(iov);
        }
        self.socket.send(&datagram)
    }

    fn preferred_maximum_message_size(&self) -> usize {
        self.preferred_maximum_message_size
    }

    fn is_connectionless(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_export_destination_concatenates_iovecs_in_order() {
        let mut dest = WriteExportDestination::new(Vec::<u8>::new(), false);
        let a = [1u8, 2, 3];
        let b = [4u8, 5];
        dest.writev(&[&a, &b]).unwrap();
        assert_eq!(dest.into_inner(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn write_export_destination_reports_connection_oriented() {
        let dest = WriteExportDestination::new(Vec::<u8>::new(), false);
        assert!(!dest.is_connectionless());
    }

    #[test]
    fn udp_destination_sends_one_concatenated_datagram() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let server_addr = server.local_addr().unwrap();
        let mut dest = UdpExportDestination::connect("127.0.0.1:0", &server_addr.to_string()).unwrap();

        let header = [0u8; 16];
        let body = [0xAAu8; 4];
        dest.writev(&[&header, &body]).unwrap();

        let mut buf = [0u8; 32];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(n, 20);
        assert!(dest.is_connectionless());
    }
}
