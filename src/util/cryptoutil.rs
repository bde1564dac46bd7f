//! Thin wrappers around the crypto primitives used by the handshake.
//! Protocol code builds inputs and sequences calls; the math lives here.

use aes::cipher::crypto_common;
use hmac::Mac;
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

type Result<T> = std::result::Result<T, CryptoError>;

/// AES-128-CCM with 16 byte tag and 13 byte nonce, as the secure channel
/// uses for every sealed handshake section.
pub type Aes128Ccm = ccm::Ccm<aes::Aes128, ccm::consts::U16, ccm::consts::U13>;

pub const AEAD_KEY_LEN: usize = 16;
pub const AEAD_MIC_LEN: usize = 16;
pub const AEAD_NONCE_LEN: usize = 13;
pub const SHA256_LEN: usize = 32;
pub const EC_PUBKEY_LEN: usize = 65;
pub const EC_SIGNATURE_LEN: usize = 64;

pub fn hkdf_sha256(salt: &[u8], secret: &[u8], info: &[u8], size: usize) -> Result<Vec<u8>> {
    let hk = hkdf::Hkdf::<Sha256>::new(Some(salt), secret);
    let mut okm = vec![0u8; size];
    match hk.expand(info, &mut okm) {
        Ok(()) => Ok(okm),
        Err(_) => Err(CryptoError::KdfFailed),
    }
}

pub fn hmac_sha256(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let mut hm =
        hmac::Hmac::<Sha256>::new_from_slice(key).map_err(|_| CryptoError::KdfFailed)?;
    hm.update(data);
    Ok(hm.finalize().into_bytes().to_vec())
}

pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

pub fn aead_seal(key: &[u8], nonce: &[u8], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
    let key = crypto_common::Key::<Aes128Ccm>::from_slice(key);
    let cipher = <Aes128Ccm as ccm::KeyInit>::new(key);
    ccm::aead::Aead::encrypt(
        &cipher,
        crypto_common::generic_array::GenericArray::from_slice(nonce),
        ccm::aead::Payload { msg, aad },
    )
    .map_err(|_| CryptoError::AeadAuthFailed)
}

/// Open an AEAD-sealed section. A wrong key or tampered ciphertext fails
/// authentication and yields no plaintext.
pub fn aead_open(key: &[u8], nonce: &[u8], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
    let key = crypto_common::Key::<Aes128Ccm>::from_slice(key);
    let cipher = <Aes128Ccm as ccm::KeyInit>::new(key);
    ccm::aead::Aead::decrypt(
        &cipher,
        crypto_common::generic_array::GenericArray::from_slice(nonce),
        ccm::aead::Payload { msg, aad },
    )
    .map_err(|_| CryptoError::AeadAuthFailed)
}

pub fn ecdsa_sign(key: &p256::SecretKey, msg: &[u8]) -> Result<[u8; EC_SIGNATURE_LEN]> {
    let key = ecdsa::SigningKey::from(key.clone());
    let sig = key
        .sign_recoverable(msg)
        .map_err(|_| CryptoError::SignatureInvalid)?
        .0;
    let mut out = [0u8; EC_SIGNATURE_LEN];
    out.copy_from_slice(&sig.to_bytes());
    Ok(out)
}

pub fn ecdsa_verify(public_key: &[u8], msg: &[u8], signature: &[u8]) -> Result<()> {
    let key = ecdsa::VerifyingKey::<p256::NistP256>::from_sec1_bytes(public_key)
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = ecdsa::Signature::<p256::NistP256>::from_slice(signature)
        .map_err(|_| CryptoError::SignatureInvalid)?;
    ecdsa::signature::Verifier::verify(&key, msg, &sig)
        .map_err(|_| CryptoError::SignatureInvalid)
}
