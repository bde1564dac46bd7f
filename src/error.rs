//! Error taxonomy for the CASE library.
//!
//! Errors are grouped by origin: codec, crypto primitive, certificate
//! trust, and protocol sequencing. A failed handshake attempt surfaces
//! exactly one of these, once, and the attempt is terminal.

use thiserror::Error;

/// TLV and message codec errors. All decode paths are total; malformed
/// input maps to one of these instead of panicking.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("container open/close not balanced")]
    InvalidContainerNesting,
    #[error("invalid or unexpected tag")]
    InvalidTag,
    #[error("element has wrong type")]
    WrongType,
    #[error("output buffer too small")]
    BufferTooSmall,
    #[error("required field missing: {0}")]
    MissingField(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("aead authentication failed")]
    AeadAuthFailed,
    #[error("signature verification failed")]
    SignatureInvalid,
    #[error("invalid public key encoding")]
    InvalidPublicKey,
    #[error("key derivation failed")]
    KdfFailed,
}

/// Certificate chain validation outcomes other than success.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustError {
    #[error("certificate outside validity window")]
    CertificateExpired,
    #[error("certificate malformed")]
    CertificateMalformed,
    #[error("chain does not terminate at the trusted root")]
    UntrustedRoot,
    #[error("key usage does not permit this operation")]
    KeyUsageMismatch,
    #[error("extended key purpose not allowed")]
    PurposeMismatch,
    #[error("wrong certificate type for this position in the chain")]
    TypeMismatch,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message not valid in current handshake state")]
    UnexpectedMessage,
    #[error("resumption id or resume mic did not match")]
    ResumptionMismatch,
    #[error("destination id matches no local fabric/node")]
    DestinationMismatch,
    #[error("handshake timed out")]
    Timeout,
}

/// Coarse error surfaced by a failed handshake attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaseError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Trust(#[from] TrustError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, CaseError>;
