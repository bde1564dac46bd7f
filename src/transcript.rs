//! Running transcript hash and the handshake key schedule.
//!
//! Every derived key is salted with the transcript hash accumulated so
//! far, binding it to the exact byte sequence both peers exchanged.
//! Signatures cover TBS material that includes both ephemeral public
//! keys, not the TBE payload alone.

use sha2::{Digest, Sha256};

use crate::error::CryptoError;
use crate::messages::{RESUME_MIC_LEN, RESUMPTION_ID_LEN};
use crate::tlv::{ContainerKind, TlvTag, TlvWriter};
use crate::util::cryptoutil::{self, AEAD_KEY_LEN, AEAD_NONCE_LEN, SHA256_LEN};

type Result<T> = std::result::Result<T, CryptoError>;

pub const NONCE_SIGMA2: &[u8; AEAD_NONCE_LEN] = b"NCASE_Sigma2N";
pub const NONCE_SIGMA3: &[u8; AEAD_NONCE_LEN] = b"NCASE_Sigma3N";
pub const NONCE_RESUME1: &[u8; AEAD_NONCE_LEN] = b"NCASE_SigmaS1";
pub const NONCE_RESUME2: &[u8; AEAD_NONCE_LEN] = b"NCASE_SigmaS2";

const INFO_SIGMA2: &[u8] = b"Sigma2";
const INFO_SIGMA3: &[u8] = b"Sigma3";
const INFO_SESSION_KEYS: &[u8] = b"SessionKeys";
const INFO_RESUME1: &[u8] = b"Sigma1_Resume";
const INFO_RESUME2: &[u8] = b"Sigma2_Resume";
const INFO_RESUMPTION_KEYS: &[u8] = b"SessionResumptionKeys";

/// Incremental hash over sigma1 then sigma2 then sigma3 bytes, appended
/// in transmission order by both peers.
#[derive(Clone)]
pub struct Transcript {
    hasher: Sha256,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    pub fn append(&mut self, message: &[u8]) {
        self.hasher.update(message);
    }

    /// Hash of everything appended so far; the transcript keeps running.
    pub fn hash(&self) -> [u8; SHA256_LEN] {
        let mut out = [0u8; SHA256_LEN];
        out.copy_from_slice(&self.hasher.clone().finalize());
        out
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

/// Final traffic keys of an established session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKeys {
    pub initiator_to_responder: [u8; AEAD_KEY_LEN],
    pub responder_to_initiator: [u8; AEAD_KEY_LEN],
    pub attestation_challenge: [u8; AEAD_KEY_LEN],
}

impl std::fmt::Debug for SessionKeys {
    // keys never end up in logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKeys{..}")
    }
}

fn split_keypack(pack: &[u8]) -> SessionKeys {
    let mut keys = SessionKeys {
        initiator_to_responder: [0; AEAD_KEY_LEN],
        responder_to_initiator: [0; AEAD_KEY_LEN],
        attestation_challenge: [0; AEAD_KEY_LEN],
    };
    keys.initiator_to_responder.copy_from_slice(&pack[..16]);
    keys.responder_to_initiator.copy_from_slice(&pack[16..32]);
    keys.attestation_challenge.copy_from_slice(&pack[32..48]);
    keys
}

/// Key sealing `encrypted2`. Salt binds the responder random, its
/// ephemeral key and the sigma1 transcript.
pub fn sigma2_key(
    ipk: &[u8],
    responder_random: &[u8],
    responder_eph_public: &[u8],
    th_sigma1: &[u8],
    shared_secret: &[u8],
) -> Result<[u8; AEAD_KEY_LEN]> {
    let mut salt = ipk.to_vec();
    salt.extend_from_slice(responder_random);
    salt.extend_from_slice(responder_eph_public);
    salt.extend_from_slice(th_sigma1);
    let okm = cryptoutil::hkdf_sha256(&salt, shared_secret, INFO_SIGMA2, AEAD_KEY_LEN)?;
    let mut out = [0u8; AEAD_KEY_LEN];
    out.copy_from_slice(&okm);
    Ok(out)
}

/// Key sealing `encrypted3`. Salt binds the sigma1+sigma2 transcript.
pub fn sigma3_key(
    ipk: &[u8],
    th_sigma12: &[u8],
    shared_secret: &[u8],
) -> Result<[u8; AEAD_KEY_LEN]> {
    let mut salt = ipk.to_vec();
    salt.extend_from_slice(th_sigma12);
    let okm = cryptoutil::hkdf_sha256(&salt, shared_secret, INFO_SIGMA3, AEAD_KEY_LEN)?;
    let mut out = [0u8; AEAD_KEY_LEN];
    out.copy_from_slice(&okm);
    Ok(out)
}

/// Final session traffic keys after a fresh handshake. Salt binds the
/// whole three-message transcript.
pub fn session_keys(ipk: &[u8], th_all: &[u8], shared_secret: &[u8]) -> Result<SessionKeys> {
    let mut salt = ipk.to_vec();
    salt.extend_from_slice(th_all);
    let pack = cryptoutil::hkdf_sha256(&salt, shared_secret, INFO_SESSION_KEYS, AEAD_KEY_LEN * 3)?;
    Ok(split_keypack(&pack))
}

fn resume_key(
    shared_secret: &[u8],
    initiator_random: &[u8],
    resumption_id: &[u8; RESUMPTION_ID_LEN],
    info: &[u8],
) -> Result<[u8; AEAD_KEY_LEN]> {
    let mut salt = initiator_random.to_vec();
    salt.extend_from_slice(resumption_id);
    let okm = cryptoutil::hkdf_sha256(&salt, shared_secret, info, AEAD_KEY_LEN)?;
    let mut out = [0u8; AEAD_KEY_LEN];
    out.copy_from_slice(&okm);
    Ok(out)
}

/// MIC proving the initiator still holds the cached shared secret for
/// `resumption_id`; carried in sigma1.
pub fn sigma1_resume_mic(
    shared_secret: &[u8],
    initiator_random: &[u8],
    resumption_id: &[u8; RESUMPTION_ID_LEN],
) -> Result<[u8; RESUME_MIC_LEN]> {
    let key = resume_key(shared_secret, initiator_random, resumption_id, INFO_RESUME1)?;
    let sealed = cryptoutil::aead_seal(&key, NONCE_RESUME1, &[], &[])?;
    let mut out = [0u8; RESUME_MIC_LEN];
    out.copy_from_slice(&sealed);
    Ok(out)
}

pub fn verify_sigma1_resume_mic(
    shared_secret: &[u8],
    initiator_random: &[u8],
    resumption_id: &[u8; RESUMPTION_ID_LEN],
    mic: &[u8; RESUME_MIC_LEN],
) -> Result<()> {
    let key = resume_key(shared_secret, initiator_random, resumption_id, INFO_RESUME1)?;
    cryptoutil::aead_open(&key, NONCE_RESUME1, &[], mic).map(|_| ())
}

/// MIC proving the responder accepted the resumption; keyed to the NEW
/// resumption id it returns in sigma2resume.
pub fn sigma2_resume_mic(
    shared_secret: &[u8],
    initiator_random: &[u8],
    new_resumption_id: &[u8; RESUMPTION_ID_LEN],
) -> Result<[u8; RESUME_MIC_LEN]> {
    let key = resume_key(
        shared_secret,
        initiator_random,
        new_resumption_id,
        INFO_RESUME2,
    )?;
    let sealed = cryptoutil::aead_seal(&key, NONCE_RESUME2, &[], &[])?;
    let mut out = [0u8; RESUME_MIC_LEN];
    out.copy_from_slice(&sealed);
    Ok(out)
}

pub fn verify_sigma2_resume_mic(
    shared_secret: &[u8],
    initiator_random: &[u8],
    new_resumption_id: &[u8; RESUMPTION_ID_LEN],
    mic: &[u8; RESUME_MIC_LEN],
) -> Result<()> {
    let key = resume_key(
        shared_secret,
        initiator_random,
        new_resumption_id,
        INFO_RESUME2,
    )?;
    cryptoutil::aead_open(&key, NONCE_RESUME2, &[], mic).map(|_| ())
}

/// Traffic keys of a resumed session, derived from the cached shared
/// secret and both parties' fresh contributions.
pub fn resumed_session_keys(
    shared_secret: &[u8],
    initiator_random: &[u8],
    new_resumption_id: &[u8; RESUMPTION_ID_LEN],
    ipk: &[u8],
) -> Result<SessionKeys> {
    let mut salt = initiator_random.to_vec();
    salt.extend_from_slice(new_resumption_id);
    salt.extend_from_slice(ipk);
    let pack =
        cryptoutil::hkdf_sha256(&salt, shared_secret, INFO_RESUMPTION_KEYS, AEAD_KEY_LEN * 3)?;
    Ok(split_keypack(&pack))
}

/// To-be-signed structure binding a certificate chain to both ephemeral
/// keys of this exchange. Signed inside sigma2/sigma3 TBE sections.
pub fn signature_tbs(
    noc: &[u8],
    icac: Option<&[u8]>,
    own_eph_public: &[u8],
    peer_eph_public: &[u8],
) -> std::result::Result<Vec<u8>, crate::error::CodecError> {
    let mut w = TlvWriter::new();
    let token = w.start_container(TlvTag::Anonymous, ContainerKind::Structure)?;
    w.write_octetstring(TlvTag::Context(1), noc)?;
    if let Some(icac) = icac {
        w.write_octetstring(TlvTag::Context(2), icac)?;
    }
    w.write_octetstring(TlvTag::Context(3), own_eph_public)?;
    w.write_octetstring(TlvTag::Context(4), peer_eph_public)?;
    w.end_container(token)?;
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_matches_whole_buffer_hash() {
        let mut t = Transcript::new();
        t.append(b"sigma1-bytes");
        t.append(b"sigma2-bytes");
        let mut whole = b"sigma1-bytes".to_vec();
        whole.extend_from_slice(b"sigma2-bytes");
        assert_eq!(t.hash().to_vec(), cryptoutil::sha256(&whole));
        // hash() does not consume the transcript
        t.append(b"sigma3-bytes");
        whole.extend_from_slice(b"sigma3-bytes");
        assert_eq!(t.hash().to_vec(), cryptoutil::sha256(&whole));
    }

    #[test]
    fn test_keys_differ_per_context() {
        let shared = [7u8; 32];
        let ipk = [1u8; 16];
        let th = [2u8; 32];
        let k2 = sigma2_key(&ipk, &[3; 32], &[4; 65], &th, &shared).unwrap();
        let k3 = sigma3_key(&ipk, &th, &shared).unwrap();
        assert_ne!(k2, k3);
        // different transcript, different key
        let k3b = sigma3_key(&ipk, &[9; 32], &shared).unwrap();
        assert_ne!(k3, k3b);
    }

    #[test]
    fn test_resume_mic_roundtrip() {
        let shared = [8u8; 32];
        let random = [1u8; 32];
        let id = [2u8; RESUMPTION_ID_LEN];
        let mic = sigma1_resume_mic(&shared, &random, &id).unwrap();
        verify_sigma1_resume_mic(&shared, &random, &id, &mic).unwrap();
        // different cached secret fails authentication
        assert!(verify_sigma1_resume_mic(&[9u8; 32], &random, &id, &mic).is_err());
    }

    #[test]
    fn test_tbs_includes_both_ephemerals() {
        let a = signature_tbs(b"noc", None, &[1; 65], &[2; 65]).unwrap();
        let b = signature_tbs(b"noc", None, &[1; 65], &[3; 65]).unwrap();
        assert_ne!(a, b);
    }
}
