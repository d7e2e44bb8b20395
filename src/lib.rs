//! Template-driven IPFIX (RFC 5101/7011) encoder/decoder.
//!
//! The core is a streaming, single-threaded-per-session codec built
//! from seven pieces: an [`ie`] catalog of information elements, a
//! byte-cursor [`transcoder`], a [`template`] model distinguishing wire
//! templates from caller-declared placements, per-domain [`session`]
//! state, a [`message`] deframer, a [`plan`]-compiled placement codec,
//! and a SAX-style [`dispatch`] layer on top of all of it. None of it
//! depends on a particular transport, logging framework, or
//! configuration format — those live in the ambient `io`, `settings`,
//! and `logger` modules, used by the reference collector binary
//! (`src/bin/collector.rs`) rather than by the library itself.

pub mod dispatch;
pub mod error;
pub mod export;
pub mod ie;
pub mod message;
pub mod plan;
pub mod session;
pub mod template;
pub mod transcoder;
pub mod varlen;

pub mod io;
pub mod logger;
pub mod settings;

pub use dispatch::{ContentHandler, Parser, PlacementCollector, PrintContentHandler};
pub use error::{AppError, CoreError, ErrorContext, Severity};
pub use export::{encode_data_set_chunk, encode_template_set_chunk, ExportDestination, Exporter};
pub use ie::{IEType, IeCatalog, InformationElement, STANDARD_CATALOG, VARLEN};
pub use message::{InputSource, MessageBuffer, MessageHeader};
pub use plan::{compile_decode_plan, compile_encode_plan, DecodePlan, EncodePlan};
pub use session::{DefineOutcome, DomainState, Session};
pub use settings::Settings;
pub use template::{Binding, PlacementTemplate, StructTemplate, TemplateField, WireTemplate};
pub use transcoder::Transcoder;
