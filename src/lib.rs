//! CASE (Certificate Authenticated Session Establishment) library.
//!
//! Implements the mutually-authenticated sigma handshake used between
//! nodes sharing a fabric, together with the self-describing TLV wire
//! encoding it rides on. Main parts of the api:
//! - [tlv](tlv) - Matter TLV reader/writer plus a decoded tree form,
//!                usable standalone for command payloads.
//! - [messages](messages) - codecs for the sigma1/2/3 handshake messages
//!                and their to-be-encrypted payload sections.
//! - [cert](cert) - operational certificates in their TLV encoding,
//!                chain validation and a small issuing helper.
//! - [fabric](fabric) - fabric identity, IPK derivation and the
//!                destination-id computation that addresses a sigma1.
//! - [resumption](resumption) - shared cache of resumable session state.
//! - [case](case::CaseContext) - the per-handshake state machine. One
//!                context per attempt; the owner pumps framed messages
//!                through it and installs the resulting session keys.
//!
//! The library is transport-agnostic: message bodies go in and out as
//! byte buffers, and reliability/retransmission is the caller's concern.
//!
//! Example of a complete in-process handshake (both roles):
//! ```no_run
//! # use std::sync::Arc;
//! # use matter_case::case::{CaseConfig, CaseContext};
//! # use matter_case::resumption::ResumptionStore;
//! # fn demo(initiator_cfg: Arc<CaseConfig>, responder_cfg: Arc<CaseConfig>) -> matter_case::error::Result<()> {
//! let store_a = Arc::new(ResumptionStore::default());
//! let store_b = Arc::new(ResumptionStore::default());
//! let (mut initiator, sigma1) =
//!     CaseContext::begin_as_initiator(initiator_cfg, store_a, 1, 0x2002, None)?;
//! let mut responder = CaseContext::begin_as_responder(responder_cfg, store_b, 2);
//! let sigma2 = responder.handle_message(&sigma1)?.outbound.unwrap();
//! let step = initiator.handle_message(&sigma2)?;
//! let keys = step.established.unwrap().keys;
//! if let Some(sigma3) = step.outbound {
//!     responder.handle_message(&sigma3)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod case;
pub mod cert;
pub mod error;
pub mod fabric;
pub mod messages;
pub mod resumption;
pub mod session_params;
pub mod tlv;
pub mod transcript;
mod util;
