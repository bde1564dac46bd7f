//! Operational certificates in their native TLV encoding, and the chain
//! validation the handshake performs on a received NOC/ICAC pair.

use crate::error::{CodecError, TrustError};
use crate::messages::EPHEMERAL_PUBLIC_KEY_LEN;
use crate::tlv::{ContainerKind, ElementType, TlvReader, TlvTag, TlvWriter};
use crate::util::cryptoutil;

const TAG_SERIAL: u8 = 1;
const TAG_SIG_ALGO: u8 = 2;
const TAG_ISSUER: u8 = 3;
const TAG_NOT_BEFORE: u8 = 4;
const TAG_NOT_AFTER: u8 = 5;
const TAG_SUBJECT: u8 = 6;
const TAG_PUBKEY_ALGO: u8 = 7;
const TAG_CURVE: u8 = 8;
const TAG_PUBLIC_KEY: u8 = 9;
const TAG_EXTENSIONS: u8 = 10;
const TAG_SIGNATURE: u8 = 11;

// distinguished-name member tags
const DN_NODE_ID: u8 = 17;
const DN_ICAC_ID: u8 = 19;
const DN_ROOT_CA_ID: u8 = 20;
const DN_FABRIC_ID: u8 = 21;

// extension member tags
const EXT_BASIC_CONSTRAINTS: u8 = 1;
const EXT_KEY_USAGE: u8 = 2;
const EXT_KEY_PURPOSES: u8 = 3;

pub const KEY_USAGE_DIGITAL_SIGNATURE: u8 = 0x01;
pub const KEY_USAGE_KEY_CERT_SIGN: u8 = 0x20;

pub const PURPOSE_SERVER_AUTH: u8 = 1;
pub const PURPOSE_CLIENT_AUTH: u8 = 2;

const SIG_ALGO_ECDSA_SHA256: u8 = 1;
const PUBKEY_ALGO_EC: u8 = 1;
const CURVE_P256: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertType {
    Root,
    Icac,
    Node,
}

/// Subject or issuer identity fields present in a certificate DN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnInfo {
    pub node_id: Option<u64>,
    pub icac_id: Option<u64>,
    pub root_ca_id: Option<u64>,
    pub fabric_id: Option<u64>,
}

impl DnInfo {
    fn cert_type(&self) -> Option<CertType> {
        if self.node_id.is_some() {
            Some(CertType::Node)
        } else if self.icac_id.is_some() {
            Some(CertType::Icac)
        } else if self.root_ca_id.is_some() {
            Some(CertType::Root)
        } else {
            None
        }
    }
}

/// Parsed certificate. `tbs` is the raw signed span, kept so chain
/// verification hashes the exact bytes the issuer signed.
#[derive(Debug, Clone)]
pub struct MatterCert {
    pub serial: Vec<u8>,
    pub issuer: DnInfo,
    pub subject: DnInfo,
    /// validity bounds in seconds since 2000-01-01 UTC
    pub not_before: u32,
    pub not_after: u32,
    pub public_key: [u8; EPHEMERAL_PUBLIC_KEY_LEN],
    pub is_ca: bool,
    pub key_usage: u8,
    pub key_purposes: Option<Vec<u8>>,
    pub signature: [u8; 64],
    tbs: Vec<u8>,
}

const END_CONTAINER: u8 = 0x18;

/// Certificate validity epoch, 2000-01-01T00:00:00Z as a unix timestamp.
const EPOCH_2000_OFFSET: u64 = 946_684_800;

/// Current time in the certificate epoch (seconds since 2000-01-01 UTC).
pub fn epoch2000_now() -> u32 {
    let unix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(EPOCH_2000_OFFSET);
    unix.saturating_sub(EPOCH_2000_OFFSET) as u32
}

fn decode_dn(r: &mut TlvReader) -> Result<DnInfo, CodecError> {
    let mut dn = DnInfo::default();
    r.enter_container()?;
    while let Some(elem) = r.next()? {
        match elem.tag {
            TlvTag::Context(DN_NODE_ID) => dn.node_id = Some(r.get_uint()?),
            TlvTag::Context(DN_ICAC_ID) => dn.icac_id = Some(r.get_uint()?),
            TlvTag::Context(DN_ROOT_CA_ID) => dn.root_ca_id = Some(r.get_uint()?),
            TlvTag::Context(DN_FABRIC_ID) => dn.fabric_id = Some(r.get_uint()?),
            _ => {}
        }
    }
    r.exit_container()?;
    Ok(dn)
}

impl MatterCert {
    pub fn decode(data: &[u8]) -> Result<Self, TrustError> {
        Self::decode_int(data).map_err(|_| TrustError::CertificateMalformed)
    }

    fn decode_int(data: &[u8]) -> Result<Self, CodecError> {
        let mut r = TlvReader::new(data);
        r.open_message()?;
        let mut serial = None;
        let mut issuer = None;
        let mut subject = None;
        let mut not_before = None;
        let mut not_after = None;
        let mut public_key = None;
        let mut is_ca = false;
        let mut key_usage = None;
        let mut key_purposes = None;
        let mut signature = None;
        let mut tbs_end = None;
        loop {
            let mark = r.position();
            let elem = match r.next()? {
                Some(e) => e,
                None => break,
            };
            match elem.tag {
                TlvTag::Context(TAG_SERIAL) => serial = Some(r.get_octetstring()?.to_vec()),
                TlvTag::Context(TAG_SIG_ALGO) => {
                    if r.get_u8()? != SIG_ALGO_ECDSA_SHA256 {
                        return Err(CodecError::WrongType);
                    }
                }
                TlvTag::Context(TAG_ISSUER) => issuer = Some(decode_dn(&mut r)?),
                TlvTag::Context(TAG_NOT_BEFORE) => not_before = Some(r.get_u32()?),
                TlvTag::Context(TAG_NOT_AFTER) => not_after = Some(r.get_u32()?),
                TlvTag::Context(TAG_SUBJECT) => subject = Some(decode_dn(&mut r)?),
                TlvTag::Context(TAG_PUBKEY_ALGO) | TlvTag::Context(TAG_CURVE) => {
                    r.get_u8()?;
                }
                TlvTag::Context(TAG_PUBLIC_KEY) => {
                    let pk = r.get_octetstring()?;
                    public_key = Some(
                        <[u8; EPHEMERAL_PUBLIC_KEY_LEN]>::try_from(pk)
                            .map_err(|_| CodecError::WrongType)?,
                    );
                }
                TlvTag::Context(TAG_EXTENSIONS) => {
                    r.enter_container()?;
                    while let Some(ext) = r.next()? {
                        match ext.tag {
                            TlvTag::Context(EXT_BASIC_CONSTRAINTS) => {
                                if ext.typ != ElementType::Structure {
                                    return Err(CodecError::WrongType);
                                }
                                r.enter_container()?;
                                while let Some(bc) = r.next()? {
                                    if bc.tag == TlvTag::Context(1) {
                                        is_ca = r.get_bool()?;
                                    }
                                }
                                r.exit_container()?;
                            }
                            TlvTag::Context(EXT_KEY_USAGE) => key_usage = Some(r.get_u8()?),
                            TlvTag::Context(EXT_KEY_PURPOSES) => {
                                r.enter_container()?;
                                let mut purposes = Vec::new();
                                while r.next()?.is_some() {
                                    purposes.push(r.get_u8()?);
                                }
                                r.exit_container()?;
                                key_purposes = Some(purposes);
                            }
                            _ => {}
                        }
                    }
                    r.exit_container()?;
                }
                TlvTag::Context(TAG_SIGNATURE) => {
                    let sig = r.get_octetstring()?;
                    signature =
                        Some(<[u8; 64]>::try_from(sig).map_err(|_| CodecError::WrongType)?);
                    tbs_end = Some(mark);
                }
                // keep the cursor on element boundaries so `mark` stays valid
                _ => r.skip()?,
            }
        }
        let tbs_end = tbs_end.ok_or(CodecError::MissingField("signature"))?;
        // the signed span is the certificate with the signature element cut out
        let mut tbs = data[..tbs_end].to_vec();
        tbs.push(END_CONTAINER);
        Ok(Self {
            serial: serial.ok_or(CodecError::MissingField("serial"))?,
            issuer: issuer.ok_or(CodecError::MissingField("issuer"))?,
            subject: subject.ok_or(CodecError::MissingField("subject"))?,
            not_before: not_before.ok_or(CodecError::MissingField("notBefore"))?,
            not_after: not_after.ok_or(CodecError::MissingField("notAfter"))?,
            public_key: public_key.ok_or(CodecError::MissingField("publicKey"))?,
            is_ca,
            key_usage: key_usage.ok_or(CodecError::MissingField("keyUsage"))?,
            key_purposes,
            signature: signature.ok_or(CodecError::MissingField("signature"))?,
            tbs,
        })
    }

    pub fn cert_type(&self) -> Option<CertType> {
        self.subject.cert_type()
    }

    fn verify_signed_by(&self, issuer_public_key: &[u8]) -> Result<(), TrustError> {
        cryptoutil::ecdsa_verify(issuer_public_key, &self.tbs, &self.signature)
            .map_err(|_| TrustError::UntrustedRoot)
    }

    fn check_validity(&self, now: u32) -> Result<(), TrustError> {
        if now < self.not_before || now > self.not_after {
            return Err(TrustError::CertificateExpired);
        }
        Ok(())
    }
}

/// Inputs the trust check needs beyond the chain itself.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    /// current time, seconds since 2000-01-01 UTC
    pub now: u32,
    pub required_key_usage: u8,
    pub required_purpose: Option<u8>,
    pub required_cert_type: CertType,
}

impl ValidationContext {
    pub fn for_operational_cert(now: u32) -> Self {
        Self {
            now,
            required_key_usage: KEY_USAGE_DIGITAL_SIGNATURE,
            required_purpose: None,
            required_cert_type: CertType::Node,
        }
    }
}

/// Identity extracted from a validated chain; the public key feeds
/// ECDSA verification of the accompanying handshake signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPeer {
    pub public_key: [u8; EPHEMERAL_PUBLIC_KEY_LEN],
    pub node_id: u64,
    pub fabric_id: u64,
}

/// Validate a received NOC (+ optional ICAC) against the trusted root.
/// Called once per handshake; every failure is terminal for the attempt.
pub fn validate(
    noc: &[u8],
    icac: Option<&[u8]>,
    root: &[u8],
    ctx: &ValidationContext,
) -> Result<ValidatedPeer, TrustError> {
    let root = MatterCert::decode(root)?;
    if !root.is_ca || root.cert_type() != Some(CertType::Root) {
        return Err(TrustError::TypeMismatch);
    }
    // trusted roots are self-signed
    root.verify_signed_by(&root.public_key)?;

    let noc = MatterCert::decode(noc)?;
    let icac = match icac {
        Some(data) => Some(MatterCert::decode(data)?),
        None => None,
    };

    let signer_key = match &icac {
        Some(icac) => {
            if !icac.is_ca || icac.cert_type() != Some(CertType::Icac) {
                return Err(TrustError::TypeMismatch);
            }
            icac.verify_signed_by(&root.public_key)?;
            icac.check_validity(ctx.now)?;
            if icac.key_usage & KEY_USAGE_KEY_CERT_SIGN == 0 {
                return Err(TrustError::KeyUsageMismatch);
            }
            icac.public_key
        }
        None => root.public_key,
    };

    if noc.cert_type() != Some(ctx.required_cert_type) || noc.is_ca {
        return Err(TrustError::TypeMismatch);
    }
    noc.verify_signed_by(&signer_key)?;
    noc.check_validity(ctx.now)?;
    if noc.key_usage & ctx.required_key_usage != ctx.required_key_usage {
        return Err(TrustError::KeyUsageMismatch);
    }
    if let Some(purpose) = ctx.required_purpose {
        match &noc.key_purposes {
            Some(purposes) if purposes.contains(&purpose) => {}
            _ => return Err(TrustError::PurposeMismatch),
        }
    }

    let fabric_id = noc
        .subject
        .fabric_id
        .ok_or(TrustError::CertificateMalformed)?;
    if let Some(icac) = &icac {
        // an intermediate scoped to another fabric cannot vouch here
        if icac.subject.fabric_id.is_some_and(|f| f != fabric_id) {
            return Err(TrustError::UntrustedRoot);
        }
    }
    let node_id = noc
        .subject
        .node_id
        .ok_or(TrustError::CertificateMalformed)?;

    Ok(ValidatedPeer {
        public_key: noc.public_key,
        node_id,
        fabric_id,
    })
}

/// Parameters for issuing a certificate in the native TLV format.
#[derive(Debug, Clone)]
pub struct CertParams {
    pub serial: u64,
    pub cert_type: CertType,
    pub subject_id: u64,
    pub issuer_type: CertType,
    pub issuer_id: u64,
    pub fabric_id: Option<u64>,
    pub not_before: u32,
    pub not_after: u32,
    pub key_usage: u8,
    pub key_purposes: Option<Vec<u8>>,
    pub public_key: Vec<u8>,
}

fn dn_tag(t: CertType) -> u8 {
    match t {
        CertType::Root => DN_ROOT_CA_ID,
        CertType::Icac => DN_ICAC_ID,
        CertType::Node => DN_NODE_ID,
    }
}

fn encode_dn(
    w: &mut TlvWriter,
    slot: u8,
    typ: CertType,
    id: u64,
    fabric_id: Option<u64>,
) -> Result<(), CodecError> {
    let token = w.start_container(TlvTag::Context(slot), ContainerKind::Structure)?;
    w.write_uint(TlvTag::Context(dn_tag(typ)), id)?;
    if let Some(f) = fabric_id {
        w.write_uint(TlvTag::Context(DN_FABRIC_ID), f)?;
    }
    w.end_container(token)
}

fn encode_tbs(params: &CertParams) -> Result<Vec<u8>, CodecError> {
    let mut w = TlvWriter::new();
    let cert = w.start_container(TlvTag::Anonymous, ContainerKind::Structure)?;
    w.write_octetstring(
        TlvTag::Context(TAG_SERIAL),
        &params.serial.to_be_bytes(),
    )?;
    w.write_uint(TlvTag::Context(TAG_SIG_ALGO), SIG_ALGO_ECDSA_SHA256 as u64)?;
    encode_dn(
        &mut w,
        TAG_ISSUER,
        params.issuer_type,
        params.issuer_id,
        params.fabric_id,
    )?;
    w.write_uint(TlvTag::Context(TAG_NOT_BEFORE), params.not_before as u64)?;
    w.write_uint(TlvTag::Context(TAG_NOT_AFTER), params.not_after as u64)?;
    encode_dn(
        &mut w,
        TAG_SUBJECT,
        params.cert_type,
        params.subject_id,
        params.fabric_id,
    )?;
    w.write_uint(TlvTag::Context(TAG_PUBKEY_ALGO), PUBKEY_ALGO_EC as u64)?;
    w.write_uint(TlvTag::Context(TAG_CURVE), CURVE_P256 as u64)?;
    w.write_octetstring(TlvTag::Context(TAG_PUBLIC_KEY), &params.public_key)?;
    let exts = w.start_container(TlvTag::Context(TAG_EXTENSIONS), ContainerKind::Structure)?;
    let bc = w.start_container(
        TlvTag::Context(EXT_BASIC_CONSTRAINTS),
        ContainerKind::Structure,
    )?;
    w.write_bool(TlvTag::Context(1), params.cert_type != CertType::Node)?;
    w.end_container(bc)?;
    w.write_uint(TlvTag::Context(EXT_KEY_USAGE), params.key_usage as u64)?;
    if let Some(purposes) = &params.key_purposes {
        let arr = w.start_container(TlvTag::Context(EXT_KEY_PURPOSES), ContainerKind::Array)?;
        for p in purposes {
            w.write_uint(TlvTag::Anonymous, *p as u64)?;
        }
        w.end_container(arr)?;
    }
    w.end_container(exts)?;
    w.end_container(cert)?;
    w.finish()
}

/// Issue a certificate signed by `issuer_key`.
pub fn sign_certificate(
    params: &CertParams,
    issuer_key: &p256::SecretKey,
) -> Result<Vec<u8>, crate::error::CaseError> {
    let tbs = encode_tbs(params)?;
    let signature = cryptoutil::ecdsa_sign(issuer_key, &tbs)?;
    // splice the signature in before the closing byte of the tbs span
    let mut w = TlvWriter::new();
    w.write_octetstring(TlvTag::Context(TAG_SIGNATURE), &signature)?;
    let sig_field = w.finish()?;
    let mut out = tbs;
    let end = out.pop();
    debug_assert_eq!(end, Some(END_CONTAINER));
    out.extend_from_slice(&sig_field);
    out.push(END_CONTAINER);
    Ok(out)
}

#[cfg(test)]
pub(crate) mod testcerts {
    use super::*;

    pub struct TestAuthority {
        pub root_key: p256::SecretKey,
        pub root_cert: Vec<u8>,
        pub fabric_id: u64,
    }

    pub fn valid_from() -> u32 {
        epoch2000_now().saturating_sub(3600)
    }

    pub fn valid_until() -> u32 {
        epoch2000_now() + 100_000_000
    }

    impl TestAuthority {
        pub fn new(fabric_id: u64) -> Self {
            let root_key = p256::SecretKey::random(&mut rand::thread_rng());
            let root_cert = sign_certificate(
                &CertParams {
                    serial: 1,
                    cert_type: CertType::Root,
                    subject_id: 1,
                    issuer_type: CertType::Root,
                    issuer_id: 1,
                    fabric_id: Some(fabric_id),
                    not_before: valid_from(),
                    not_after: valid_until(),
                    key_usage: KEY_USAGE_KEY_CERT_SIGN,
                    key_purposes: None,
                    public_key: root_key.public_key().to_sec1_bytes().to_vec(),
                },
                &root_key,
            )
            .unwrap();
            Self {
                root_key,
                root_cert,
                fabric_id,
            }
        }

        pub fn issue_noc(&self, node_id: u64) -> (p256::SecretKey, Vec<u8>) {
            let key = p256::SecretKey::random(&mut rand::thread_rng());
            let cert = sign_certificate(
                &CertParams {
                    serial: 100 + node_id,
                    cert_type: CertType::Node,
                    subject_id: node_id,
                    issuer_type: CertType::Root,
                    issuer_id: 1,
                    fabric_id: Some(self.fabric_id),
                    not_before: valid_from(),
                    not_after: valid_until(),
                    key_usage: KEY_USAGE_DIGITAL_SIGNATURE,
                    key_purposes: Some(vec![PURPOSE_SERVER_AUTH, PURPOSE_CLIENT_AUTH]),
                    public_key: key.public_key().to_sec1_bytes().to_vec(),
                },
                &self.root_key,
            )
            .unwrap();
            (key, cert)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testcerts::{valid_from, valid_until, TestAuthority};
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let ca = TestAuthority::new(0x2000);
        let (_key, noc) = ca.issue_noc(55);
        let cert = MatterCert::decode(&noc).unwrap();
        assert_eq!(cert.subject.node_id, Some(55));
        assert_eq!(cert.subject.fabric_id, Some(0x2000));
        assert!(!cert.is_ca);
        assert_eq!(cert.cert_type(), Some(CertType::Node));
    }

    #[test]
    fn test_validate_chain_ok() {
        let ca = TestAuthority::new(0x2000);
        let (key, noc) = ca.issue_noc(55);
        let peer = validate(
            &noc,
            None,
            &ca.root_cert,
            &ValidationContext::for_operational_cert(epoch2000_now()),
        )
        .unwrap();
        assert_eq!(peer.node_id, 55);
        assert_eq!(peer.fabric_id, 0x2000);
        assert_eq!(
            peer.public_key.to_vec(),
            key.public_key().to_sec1_bytes().to_vec()
        );
    }

    #[test]
    fn test_validate_with_icac() {
        let ca = TestAuthority::new(7);
        let icac_key = p256::SecretKey::random(&mut rand::thread_rng());
        let icac = sign_certificate(
            &CertParams {
                serial: 2,
                cert_type: CertType::Icac,
                subject_id: 2,
                issuer_type: CertType::Root,
                issuer_id: 1,
                fabric_id: Some(7),
                not_before: valid_from(),
                not_after: valid_until(),
                key_usage: KEY_USAGE_KEY_CERT_SIGN,
                key_purposes: None,
                public_key: icac_key.public_key().to_sec1_bytes().to_vec(),
            },
            &ca.root_key,
        )
        .unwrap();
        let node_key = p256::SecretKey::random(&mut rand::thread_rng());
        let noc = sign_certificate(
            &CertParams {
                serial: 3,
                cert_type: CertType::Node,
                subject_id: 99,
                issuer_type: CertType::Icac,
                issuer_id: 2,
                fabric_id: Some(7),
                not_before: valid_from(),
                not_after: valid_until(),
                key_usage: KEY_USAGE_DIGITAL_SIGNATURE,
                key_purposes: None,
                public_key: node_key.public_key().to_sec1_bytes().to_vec(),
            },
            &icac_key,
        )
        .unwrap();
        let peer = validate(
            &noc,
            Some(&icac),
            &ca.root_cert,
            &ValidationContext::for_operational_cert(epoch2000_now()),
        )
        .unwrap();
        assert_eq!(peer.node_id, 99);
    }

    #[test]
    fn test_icac_not_chaining_to_root() {
        let ca = TestAuthority::new(7);
        let other_ca = TestAuthority::new(7);
        // intermediate issued by a different authority
        let icac_key = p256::SecretKey::random(&mut rand::thread_rng());
        let icac = sign_certificate(
            &CertParams {
                serial: 2,
                cert_type: CertType::Icac,
                subject_id: 2,
                issuer_type: CertType::Root,
                issuer_id: 1,
                fabric_id: Some(7),
                not_before: valid_from(),
                not_after: valid_until(),
                key_usage: KEY_USAGE_KEY_CERT_SIGN,
                key_purposes: None,
                public_key: icac_key.public_key().to_sec1_bytes().to_vec(),
            },
            &other_ca.root_key,
        )
        .unwrap();
        let node_key = p256::SecretKey::random(&mut rand::thread_rng());
        let noc = sign_certificate(
            &CertParams {
                serial: 3,
                cert_type: CertType::Node,
                subject_id: 99,
                issuer_type: CertType::Icac,
                issuer_id: 2,
                fabric_id: Some(7),
                not_before: valid_from(),
                not_after: valid_until(),
                key_usage: KEY_USAGE_DIGITAL_SIGNATURE,
                key_purposes: None,
                public_key: node_key.public_key().to_sec1_bytes().to_vec(),
            },
            &icac_key,
        )
        .unwrap();
        assert_eq!(
            validate(
                &noc,
                Some(&icac),
                &ca.root_cert,
                &ValidationContext::for_operational_cert(epoch2000_now()),
            ),
            Err(TrustError::UntrustedRoot)
        );
    }

    #[test]
    fn test_expired_certificate() {
        let ca = TestAuthority::new(1);
        let (_key, noc) = ca.issue_noc(5);
        assert_eq!(
            validate(
                &noc,
                None,
                &ca.root_cert,
                &ValidationContext::for_operational_cert(valid_until() + 1),
            ),
            Err(TrustError::CertificateExpired)
        );
    }

    #[test]
    fn test_key_usage_and_type_mismatch() {
        let ca = TestAuthority::new(1);
        // noc without the digital-signature bit
        let key = p256::SecretKey::random(&mut rand::thread_rng());
        let noc = sign_certificate(
            &CertParams {
                serial: 9,
                cert_type: CertType::Node,
                subject_id: 5,
                issuer_type: CertType::Root,
                issuer_id: 1,
                fabric_id: Some(1),
                not_before: valid_from(),
                not_after: valid_until(),
                key_usage: KEY_USAGE_KEY_CERT_SIGN,
                key_purposes: None,
                public_key: key.public_key().to_sec1_bytes().to_vec(),
            },
            &ca.root_key,
        )
        .unwrap();
        assert_eq!(
            validate(
                &noc,
                None,
                &ca.root_cert,
                &ValidationContext::for_operational_cert(epoch2000_now()),
            ),
            Err(TrustError::KeyUsageMismatch)
        );
        // a CA cert presented as the NOC
        assert_eq!(
            validate(
                &ca.root_cert.clone(),
                None,
                &ca.root_cert,
                &ValidationContext::for_operational_cert(epoch2000_now()),
            ),
            Err(TrustError::TypeMismatch)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let ca = TestAuthority::new(1);
        assert_eq!(
            validate(
                &[1, 2, 3],
                None,
                &ca.root_cert,
                &ValidationContext::for_operational_cert(epoch2000_now()),
            ),
            Err(TrustError::CertificateMalformed)
        );
    }
}
