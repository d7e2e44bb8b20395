//! Reference collector binary (§11.4): a small multi-threaded demo
//! program built entirely out of the library's public primitives. One
//! thread per listening UDP socket reads datagrams and hands them to a
//! per-socket worker thread that owns a single [`Parser`] (and so a
//! single [`Session`](ipfix::Session)); the worker deframes each
//! datagram, dispatches it through a [`PlacementCollector`] bound to a
//! small demo flow record, and forwards decoded records to a shared
//! printer stage over a bounded channel. This is application
//! composition of core primitives, not a core feature (§5, "Session
//! management ambiguity" — the omitted threaded backend, designed here
//! explicitly as a bounded MPSC queue with a single consumer).

use std::net::{SocketAddr, UdpSocket};
use std::sync::mpsc;
use std::thread;

use log::{error, info, trace, warn};
use structopt::StructOpt;

use ipfix::{
    MessageBuffer, Parser, PlacementCollector, PlacementTemplate, PrintContentHandler, Settings,
    STANDARD_CATALOG,
};

/// Command-line overrides for the ambient [`Settings`] (§10.4, §10.5).
/// Any flag left unset falls back to the config file / environment /
/// built-in default.
#[derive(Debug, StructOpt)]
#[structopt(name = "ipfix-collector")]
struct Opts {
    /// Path to a TOML configuration file.
    #[structopt(long = "config")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[structopt(long = "log-level")]
    log_level: Option<String>,

    /// UDP address to listen on; may be given multiple times to run
    /// several independent sessions in parallel (one thread pair and
    /// one `Session` each — see scenario S6, cross-session isolation).
    #[structopt(short = "l", long = "listen")]
    listen: Vec<String>,

    /// Log every parsed event through `PrintContentHandler` instead of
    /// decoding through the demo placement — useful for tracing an
    /// unfamiliar stream before writing placement code.
    #[structopt(long = "trace")]
    trace: bool,
}

/// One decoded record forwarded from a worker thread to the printer
/// stage: which listener it came from, and the flat bytes a
/// `PlacementTemplate` decoded it into.
struct DecodedRecord {
    listener: SocketAddr,
    bytes: Vec<u8>,
}

/// `InputSource` over exactly one already-received UDP datagram. IPFIX
/// over UDP never packs more than one message per datagram (§11.1), so
/// there is no framing work left for this type beyond exposing the
/// bytes already sitting in memory.
struct DatagramSource {
    data: Vec<u8>,
    pos: usize,
}

impl ipfix::InputSource for DatagramSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.data.len() - self.pos;
        let n = buf.len().min(remaining);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
    fn can_peek(&self) -> bool {
        false
    }
    fn message_offset(&self) -> u64 {
        0
    }
    fn advance_message_offset(&mut self) {}
    fn resync(&mut self) -> bool {
        false
    }
}

/// Demo flow record layout: a flat byte buffer with named field
/// offsets, bound through a [`PlacementTemplate`] (§10.1 — placements
/// bind IEs to `(offset, size)` pairs into a caller-owned buffer rather
/// than raw pointers).
mod flow_record {
    pub const SRC_ADDR: (usize, usize) = (0, 4);
    pub const DST_ADDR: (usize, usize) = (4, 4);
    pub const SRC_PORT: (usize, usize) = (8, 2);
    pub const DST_PORT: (usize, usize) = (10, 2);
    pub const PROTOCOL: (usize, usize) = (12, 1);
    pub const OCTETS: (usize, usize) = (13, 8);
    pub const PACKETS: (usize, usize) = (21, 8);
    pub const SIZE: usize = 29;
}

fn demo_placement() -> PlacementTemplate {
    let mut placement = PlacementTemplate::new();
    let mut bind = |name: &str, (offset, size): (usize, usize)| {
        if let Some(ie) = STANDARD_CATALOG.lookup_by_name(name) {
            placement.place(ie, offset, size);
        }
    };
    bind("sourceIPv4Address", flow_record::SRC_ADDR);
    bind("destinationIPv4Address", flow_record::DST_ADDR);
    bind("sourceTransportPort", flow_record::SRC_PORT);
    bind("destinationTransportPort", flow_record::DST_PORT);
    bind("protocolIdentifier", flow_record::PROTOCOL);
    bind("octetDeltaCount", flow_record::OCTETS);
    bind("packetDeltaCount", flow_record::PACKETS);
    placement
}

fn format_record(bytes: &[u8]) -> String {
    let u32_at = |(offset, _): (usize, usize)| -> u32 {
        u32::from_ne_bytes(bytes[offset..offset + 4].try_into().unwrap())
    };
    let u16_at = |(offset, _): (usize, usize)| -> u16 {
        u16::from_ne_bytes(bytes[offset..offset + 2].try_into().unwrap())
    };
    let u64_at = |(offset, _): (usize, usize)| -> u64 {
        u64::from_ne_bytes(bytes[offset..offset + 8].try_into().unwrap())
    };
    format!(
        "{}:{} -> {}:{} proto={} octets={} packets={}",
        std::net::Ipv4Addr::from(u32_at(flow_record::SRC_ADDR)),
        u16_at(flow_record::SRC_PORT),
        std::net::Ipv4Addr::from(u32_at(flow_record::DST_ADDR)),
        u16_at(flow_record::DST_PORT),
        bytes[flow_record::PROTOCOL.0],
        u64_at(flow_record::OCTETS),
        u64_at(flow_record::PACKETS),
    )
}

/// Worker thread body: owns one `Session` (via `Parser`) for `listener`,
/// draining datagrams handed to it by the reader thread and forwarding
/// every decoded record to `sink`.
fn run_worker(
    listener: SocketAddr,
    datagrams: mpsc::Receiver<Vec<u8>>,
    sink: mpsc::SyncSender<DecodedRecord>,
    trace: bool,
) {
    let catalog = &*STANDARD_CATALOG;
    let mut parser = Parser::new(catalog);

    let mut print_handler = PrintContentHandler::new();
    let mut collector = PlacementCollector::new();
    if !trace {
        let sink = sink.clone();
        collector.register_placement(demo_placement(), move |bytes: &[u8]| {
            let record = DecodedRecord {
                listener,
                bytes: bytes.to_vec(),
            };
            if sink.send(record).is_err() {
                warn!("printer stage gone, dropping decoded record from {listener}");
            }
            Ok(())
        });
    }

    for datagram in datagrams {
        let mut source = DatagramSource { data: datagram, pos: 0 };
        let mut mb = MessageBuffer::new();
        match mb.deframe(&mut source) {
            Ok(ipfix::message::DeframeOutcome::NoMessage) => continue,
            Err(e) => {
                error!("[{listener}] failed to deframe datagram: {e}");
                continue;
            }
            Ok(ipfix::message::DeframeOutcome::Message) => {}
        }

        let result = if trace {
            parser.parse_message(&mb, &mut print_handler)
        } else {
            parser.parse_message(&mb, &mut collector)
        };
        if let Err(e) = result {
            error!("[{listener}] fatal error parsing message: {e}");
        }
    }
}

/// Reader thread body: owns the socket, hands each datagram's bytes
/// straight to the worker thread without parsing them itself.
fn run_reader(listener: SocketAddr, to_worker: mpsc::SyncSender<Vec<u8>>) {
    let socket = match UdpSocket::bind(listener) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to bind UDP socket to {listener}: {e}");
            return;
        }
    };
    info!("listening for IPFIX on {listener}");

    let mut buf = vec![0u8; 65535];
    loop {
        match socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                trace!("received {n} bytes from {from} on {listener}");
                if to_worker.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("recv error on {listener}: {e}");
            }
        }
    }
}

fn main() {
    let opts = Opts::from_args();
    let settings = Settings::load(opts.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("failed to load configuration, using defaults: {e}");
        Settings::default()
    });

    let log_level = opts.log_level.as_deref().unwrap_or(&settings.log_level);
    ipfix::logger::init(log_level);

    let listen_addrs: Vec<SocketAddr> = if !opts.listen.is_empty() {
        opts.listen.iter()
    } else {
        settings.listen.iter()
    }
    .filter_map(|s| match s.parse() {
        Ok(addr) => Some(addr),
        Err(e) => {
            error!("ignoring unparseable listen address {s:?}: {e}");
            None
        }
    })
    .collect();

    if listen_addrs.is_empty() {
        error!("no valid listen addresses configured, exiting");
        return;
    }

    info!("starting ipfix-collector with {} listener(s)", listen_addrs.len());

    // Printer stage: the single consumer of decoded records from every
    // worker thread (§9, bounded MPSC queue with single consumer).
    let (record_tx, record_rx) = mpsc::sync_channel::<DecodedRecord>(1024);
    let printer = thread::Builder::new()
        .name("printer".to_string())
        .spawn(move || {
            for record in record_rx {
                info!("[{}] {}", record.listener, format_record(&record.bytes));
            }
        })
        .expect("failed to spawn printer thread");

    let mut threads = Vec::new();
    for addr in listen_addrs {
        let (datagram_tx, datagram_rx) = mpsc::sync_channel::<Vec<u8>>(256);
        let record_tx = record_tx.clone();
        let trace = opts.trace;

        let worker = thread::Builder::new()
            .name(format!("worker-{addr}"))
            .spawn(move || run_worker(addr, datagram_rx, record_tx, trace))
            .expect("failed to spawn worker thread");

        let reader = thread::Builder::new()
            .name(format!("reader-{addr}"))
            .spawn(move || run_reader(addr, datagram_tx))
            .expect("failed to spawn reader thread");

        threads.push(reader);
        threads.push(worker);
    }
    drop(record_tx);

    for t in threads {
        let _ = t.join();
    }
    let _ = printer.join();
}
