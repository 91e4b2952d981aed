//! An SMPP v3.4 client library.
//!
//! Three layers compose into a client:
//!
//! * [`pdu`] — a schema-driven binary codec. Each command's body is an
//!   ordered field list; decoding walks that list because later fields
//!   (UDH, `short_message`, the submit_multi lists) take their layout from
//!   values parsed earlier in the same PDU.
//! * [`session`] — the connection lifecycle and request multiplexer: one
//!   reader task, a serialized writer, sequence-number correlation, a
//!   bounded in-flight window, periodic `enquire_link` and optional rate
//!   limiting.
//! * [`message`] — submit operations on top: data-coding selection,
//!   segmentation of long messages into concatenated parts with User Data
//!   Headers, query_sm and submit_multi.
//!
//! ```rust,no_run
//! use smppio::message::ShortMessage;
//! use smppio::session::{Session, SessionConfig};
//! use smppio::text::Text;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::connect(SessionConfig::new(
//!         "localhost:2775",
//!         "system_id",
//!         "password",
//!     ))
//!     .await?;
//!
//!     let msg = ShortMessage::new("root", "447700900000", Text::Gsm7("Hello!".into()));
//!     let result = session.submit(&msg).await?;
//!     println!("accepted as {}", result.message_id);
//!
//!     session.unbind().await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod message;
pub mod pdu;
pub mod session;
pub mod text;

#[cfg(test)]
mod tests;

pub use message::{
    DeliveryReceipt, MessageState, PartialSubmit, QueryResult, ShortMessage, SubmitMultiResult,
    SubmitResult,
};
pub use pdu::{CodecError, CommandId, CommandStatus, FieldMap, FieldName, Pdu, TlvMap, Value};
pub use session::{
    echo_handler, BindMode, Conn, Handler, RateLimiter, Session, SessionConfig, SessionStatus,
    SmppError, SmppResult,
};
pub use text::Text;
