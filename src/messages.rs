//! Sigma handshake message codecs.
//!
//! Context tags are the stable wire assignment; renumbering breaks
//! interoperability with every deployed peer. Decoders tolerate unknown
//! trailing fields as the extension point, and reject a required field
//! that is absent or of the wrong shape.

use crate::error::CodecError;
use crate::session_params::SessionParameters;
use crate::tlv::{ContainerKind, ElementType, TlvReader, TlvTag, TlvWriter};

type Result<T> = std::result::Result<T, CodecError>;

pub const RANDOM_LEN: usize = 32;
pub const DESTINATION_ID_LEN: usize = 32;
pub const RESUMPTION_ID_LEN: usize = 16;
pub const RESUME_MIC_LEN: usize = 16;
pub const EPHEMERAL_PUBLIC_KEY_LEN: usize = 65;
pub const SIGNATURE_LEN: usize = 64;

fn fixed<const N: usize>(data: &[u8]) -> Result<[u8; N]> {
    data.try_into().map_err(|_| CodecError::WrongType)
}

fn expect_struct(typ: ElementType) -> Result<()> {
    if typ != ElementType::Structure {
        return Err(CodecError::WrongType);
    }
    Ok(())
}

/// Resumption id and MIC travel together; carrying them as a pair keeps
/// the both-or-neither invariant structural.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumptionPair {
    pub resumption_id: [u8; RESUMPTION_ID_LEN],
    pub resume_mic: [u8; RESUME_MIC_LEN],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sigma1 {
    pub initiator_random: [u8; RANDOM_LEN],
    pub initiator_session_id: u16,
    pub destination_id: [u8; DESTINATION_ID_LEN],
    pub initiator_eph_public_key: [u8; EPHEMERAL_PUBLIC_KEY_LEN],
    pub initiator_session_params: Option<SessionParameters>,
    pub resumption: Option<ResumptionPair>,
}

impl Sigma1 {
    const TAG_RANDOM: u8 = 1;
    const TAG_SESSION_ID: u8 = 2;
    const TAG_DESTINATION_ID: u8 = 3;
    const TAG_EPH_PUBLIC_KEY: u8 = 4;
    const TAG_SESSION_PARAMS: u8 = 5;
    const TAG_RESUMPTION_ID: u8 = 6;
    const TAG_RESUME_MIC: u8 = 7;

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = TlvWriter::new();
        let token = w.start_container(TlvTag::Anonymous, ContainerKind::Structure)?;
        w.write_octetstring(TlvTag::Context(Self::TAG_RANDOM), &self.initiator_random)?;
        w.write_uint(
            TlvTag::Context(Self::TAG_SESSION_ID),
            self.initiator_session_id as u64,
        )?;
        w.write_octetstring(
            TlvTag::Context(Self::TAG_DESTINATION_ID),
            &self.destination_id,
        )?;
        w.write_octetstring(
            TlvTag::Context(Self::TAG_EPH_PUBLIC_KEY),
            &self.initiator_eph_public_key,
        )?;
        if let Some(params) = &self.initiator_session_params {
            params.encode(&mut w, Self::TAG_SESSION_PARAMS)?;
        }
        if let Some(resumption) = &self.resumption {
            w.write_octetstring(
                TlvTag::Context(Self::TAG_RESUMPTION_ID),
                &resumption.resumption_id,
            )?;
            w.write_octetstring(
                TlvTag::Context(Self::TAG_RESUME_MIC),
                &resumption.resume_mic,
            )?;
        }
        w.end_container(token)?;
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = TlvReader::new(data);
        r.open_message()?;
        let mut random = None;
        let mut session_id = None;
        let mut destination_id = None;
        let mut eph_public_key = None;
        let mut params = None;
        let mut resumption_id = None;
        let mut resume_mic = None;
        while let Some(elem) = r.next()? {
            match elem.tag {
                TlvTag::Context(Self::TAG_RANDOM) => {
                    random = Some(fixed::<RANDOM_LEN>(r.get_octetstring()?)?)
                }
                TlvTag::Context(Self::TAG_SESSION_ID) => session_id = Some(r.get_u16()?),
                TlvTag::Context(Self::TAG_DESTINATION_ID) => {
                    destination_id = Some(fixed::<DESTINATION_ID_LEN>(r.get_octetstring()?)?)
                }
                TlvTag::Context(Self::TAG_EPH_PUBLIC_KEY) => {
                    eph_public_key =
                        Some(fixed::<EPHEMERAL_PUBLIC_KEY_LEN>(r.get_octetstring()?)?)
                }
                TlvTag::Context(Self::TAG_SESSION_PARAMS) => {
                    expect_struct(elem.typ)?;
                    params = Some(SessionParameters::decode(&mut r)?);
                }
                TlvTag::Context(Self::TAG_RESUMPTION_ID) => {
                    resumption_id = Some(fixed::<RESUMPTION_ID_LEN>(r.get_octetstring()?)?)
                }
                TlvTag::Context(Self::TAG_RESUME_MIC) => {
                    resume_mic = Some(fixed::<RESUME_MIC_LEN>(r.get_octetstring()?)?)
                }
                _ => {}
            }
        }
        let resumption = match (resumption_id, resume_mic) {
            (Some(resumption_id), Some(resume_mic)) => Some(ResumptionPair {
                resumption_id,
                resume_mic,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(CodecError::MissingField("initiatorResumeMIC")),
            (None, Some(_)) => return Err(CodecError::MissingField("resumptionID")),
        };
        Ok(Self {
            initiator_random: random.ok_or(CodecError::MissingField("initiatorRandom"))?,
            initiator_session_id: session_id
                .ok_or(CodecError::MissingField("initiatorSessionId"))?,
            destination_id: destination_id.ok_or(CodecError::MissingField("destinationId"))?,
            initiator_eph_public_key: eph_public_key
                .ok_or(CodecError::MissingField("initiatorEphPubKey"))?,
            initiator_session_params: params,
            resumption,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sigma2 {
    pub responder_random: [u8; RANDOM_LEN],
    pub responder_session_id: u16,
    pub responder_eph_public_key: [u8; EPHEMERAL_PUBLIC_KEY_LEN],
    /// AEAD ciphertext+tag over the encoded [Sigma2Tbe]; opaque here.
    pub encrypted2: Vec<u8>,
    pub responder_session_params: Option<SessionParameters>,
}

impl Sigma2 {
    const TAG_RANDOM: u8 = 1;
    const TAG_SESSION_ID: u8 = 2;
    const TAG_EPH_PUBLIC_KEY: u8 = 3;
    const TAG_ENCRYPTED2: u8 = 4;
    const TAG_SESSION_PARAMS: u8 = 5;

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = TlvWriter::new();
        let token = w.start_container(TlvTag::Anonymous, ContainerKind::Structure)?;
        w.write_octetstring(TlvTag::Context(Self::TAG_RANDOM), &self.responder_random)?;
        w.write_uint(
            TlvTag::Context(Self::TAG_SESSION_ID),
            self.responder_session_id as u64,
        )?;
        w.write_octetstring(
            TlvTag::Context(Self::TAG_EPH_PUBLIC_KEY),
            &self.responder_eph_public_key,
        )?;
        w.write_octetstring(TlvTag::Context(Self::TAG_ENCRYPTED2), &self.encrypted2)?;
        if let Some(params) = &self.responder_session_params {
            params.encode(&mut w, Self::TAG_SESSION_PARAMS)?;
        }
        w.end_container(token)?;
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = TlvReader::new(data);
        r.open_message()?;
        let mut random = None;
        let mut session_id = None;
        let mut eph_public_key = None;
        let mut encrypted2 = None;
        let mut params = None;
        while let Some(elem) = r.next()? {
            match elem.tag {
                TlvTag::Context(Self::TAG_RANDOM) => {
                    random = Some(fixed::<RANDOM_LEN>(r.get_octetstring()?)?)
                }
                TlvTag::Context(Self::TAG_SESSION_ID) => session_id = Some(r.get_u16()?),
                TlvTag::Context(Self::TAG_EPH_PUBLIC_KEY) => {
                    eph_public_key =
                        Some(fixed::<EPHEMERAL_PUBLIC_KEY_LEN>(r.get_octetstring()?)?)
                }
                TlvTag::Context(Self::TAG_ENCRYPTED2) => {
                    encrypted2 = Some(r.get_octetstring()?.to_vec())
                }
                TlvTag::Context(Self::TAG_SESSION_PARAMS) => {
                    expect_struct(elem.typ)?;
                    params = Some(SessionParameters::decode(&mut r)?);
                }
                _ => {}
            }
        }
        Ok(Self {
            responder_random: random.ok_or(CodecError::MissingField("responderRandom"))?,
            responder_session_id: session_id
                .ok_or(CodecError::MissingField("responderSessionId"))?,
            responder_eph_public_key: eph_public_key
                .ok_or(CodecError::MissingField("responderEphPubKey"))?,
            encrypted2: encrypted2.ok_or(CodecError::MissingField("encrypted2"))?,
            responder_session_params: params,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sigma2Resume {
    pub resumption_id: [u8; RESUMPTION_ID_LEN],
    pub sigma2_resume_mic: [u8; RESUME_MIC_LEN],
    pub responder_session_id: u16,
    pub responder_session_params: Option<SessionParameters>,
}

impl Sigma2Resume {
    const TAG_RESUMPTION_ID: u8 = 1;
    const TAG_RESUME_MIC: u8 = 2;
    const TAG_SESSION_ID: u8 = 3;
    const TAG_SESSION_PARAMS: u8 = 4;

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = TlvWriter::new();
        let token = w.start_container(TlvTag::Anonymous, ContainerKind::Structure)?;
        w.write_octetstring(TlvTag::Context(Self::TAG_RESUMPTION_ID), &self.resumption_id)?;
        w.write_octetstring(
            TlvTag::Context(Self::TAG_RESUME_MIC),
            &self.sigma2_resume_mic,
        )?;
        w.write_uint(
            TlvTag::Context(Self::TAG_SESSION_ID),
            self.responder_session_id as u64,
        )?;
        if let Some(params) = &self.responder_session_params {
            params.encode(&mut w, Self::TAG_SESSION_PARAMS)?;
        }
        w.end_container(token)?;
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = TlvReader::new(data);
        r.open_message()?;
        let mut resumption_id = None;
        let mut mic = None;
        let mut session_id = None;
        let mut params = None;
        while let Some(elem) = r.next()? {
            match elem.tag {
                TlvTag::Context(Self::TAG_RESUMPTION_ID) => {
                    resumption_id = Some(fixed::<RESUMPTION_ID_LEN>(r.get_octetstring()?)?)
                }
                TlvTag::Context(Self::TAG_RESUME_MIC) => {
                    mic = Some(fixed::<RESUME_MIC_LEN>(r.get_octetstring()?)?)
                }
                TlvTag::Context(Self::TAG_SESSION_ID) => session_id = Some(r.get_u16()?),
                TlvTag::Context(Self::TAG_SESSION_PARAMS) => {
                    expect_struct(elem.typ)?;
                    params = Some(SessionParameters::decode(&mut r)?);
                }
                _ => {}
            }
        }
        Ok(Self {
            resumption_id: resumption_id.ok_or(CodecError::MissingField("resumptionID"))?,
            sigma2_resume_mic: mic.ok_or(CodecError::MissingField("sigma2ResumeMIC"))?,
            responder_session_id: session_id
                .ok_or(CodecError::MissingField("responderSessionId"))?,
            responder_session_params: params,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sigma3 {
    /// AEAD ciphertext+tag over the encoded [Sigma3Tbe]; opaque here.
    pub encrypted3: Vec<u8>,
}

impl Sigma3 {
    const TAG_ENCRYPTED3: u8 = 1;

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = TlvWriter::new();
        let token = w.start_container(TlvTag::Anonymous, ContainerKind::Structure)?;
        w.write_octetstring(TlvTag::Context(Self::TAG_ENCRYPTED3), &self.encrypted3)?;
        w.end_container(token)?;
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = TlvReader::new(data);
        r.open_message()?;
        let mut encrypted3 = None;
        while let Some(elem) = r.next()? {
            if elem.tag == TlvTag::Context(Self::TAG_ENCRYPTED3) {
                encrypted3 = Some(r.get_octetstring()?.to_vec());
            }
        }
        Ok(Self {
            encrypted3: encrypted3.ok_or(CodecError::MissingField("encrypted3"))?,
        })
    }
}

/// Plaintext sealed into `encrypted2`. The outer [Sigma2] codec never
/// sees this; it is built in a scratch buffer and sealed before embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sigma2Tbe {
    pub responder_noc: Vec<u8>,
    pub responder_icac: Option<Vec<u8>>,
    pub signature: [u8; SIGNATURE_LEN],
    pub resumption_id: [u8; RESUMPTION_ID_LEN],
}

impl Sigma2Tbe {
    const TAG_NOC: u8 = 1;
    const TAG_ICAC: u8 = 2;
    const TAG_SIGNATURE: u8 = 3;
    const TAG_RESUMPTION_ID: u8 = 4;

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = TlvWriter::new();
        let token = w.start_container(TlvTag::Anonymous, ContainerKind::Structure)?;
        w.write_octetstring(TlvTag::Context(Self::TAG_NOC), &self.responder_noc)?;
        if let Some(icac) = &self.responder_icac {
            w.write_octetstring(TlvTag::Context(Self::TAG_ICAC), icac)?;
        }
        w.write_octetstring(TlvTag::Context(Self::TAG_SIGNATURE), &self.signature)?;
        w.write_octetstring(TlvTag::Context(Self::TAG_RESUMPTION_ID), &self.resumption_id)?;
        w.end_container(token)?;
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = TlvReader::new(data);
        r.open_message()?;
        let mut noc = None;
        let mut icac = None;
        let mut signature = None;
        let mut resumption_id = None;
        while let Some(elem) = r.next()? {
            match elem.tag {
                TlvTag::Context(Self::TAG_NOC) => noc = Some(r.get_octetstring()?.to_vec()),
                TlvTag::Context(Self::TAG_ICAC) => icac = Some(r.get_octetstring()?.to_vec()),
                TlvTag::Context(Self::TAG_SIGNATURE) => {
                    signature = Some(fixed::<SIGNATURE_LEN>(r.get_octetstring()?)?)
                }
                TlvTag::Context(Self::TAG_RESUMPTION_ID) => {
                    resumption_id = Some(fixed::<RESUMPTION_ID_LEN>(r.get_octetstring()?)?)
                }
                _ => {}
            }
        }
        Ok(Self {
            responder_noc: noc.ok_or(CodecError::MissingField("responderNOC"))?,
            responder_icac: icac,
            signature: signature.ok_or(CodecError::MissingField("signature"))?,
            resumption_id: resumption_id.ok_or(CodecError::MissingField("resumptionID"))?,
        })
    }
}

/// Plaintext sealed into `encrypted3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sigma3Tbe {
    pub initiator_noc: Vec<u8>,
    pub initiator_icac: Option<Vec<u8>>,
    pub signature: [u8; SIGNATURE_LEN],
}

impl Sigma3Tbe {
    const TAG_NOC: u8 = 1;
    const TAG_ICAC: u8 = 2;
    const TAG_SIGNATURE: u8 = 3;

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = TlvWriter::new();
        let token = w.start_container(TlvTag::Anonymous, ContainerKind::Structure)?;
        w.write_octetstring(TlvTag::Context(Self::TAG_NOC), &self.initiator_noc)?;
        if let Some(icac) = &self.initiator_icac {
            w.write_octetstring(TlvTag::Context(Self::TAG_ICAC), icac)?;
        }
        w.write_octetstring(TlvTag::Context(Self::TAG_SIGNATURE), &self.signature)?;
        w.end_container(token)?;
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = TlvReader::new(data);
        r.open_message()?;
        let mut noc = None;
        let mut icac = None;
        let mut signature = None;
        while let Some(elem) = r.next()? {
            match elem.tag {
                TlvTag::Context(Self::TAG_NOC) => noc = Some(r.get_octetstring()?.to_vec()),
                TlvTag::Context(Self::TAG_ICAC) => icac = Some(r.get_octetstring()?.to_vec()),
                TlvTag::Context(Self::TAG_SIGNATURE) => {
                    signature = Some(fixed::<SIGNATURE_LEN>(r.get_octetstring()?)?)
                }
                _ => {}
            }
        }
        Ok(Self {
            initiator_noc: noc.ok_or(CodecError::MissingField("initiatorNOC"))?,
            initiator_icac: icac,
            signature: signature.ok_or(CodecError::MissingField("signature"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::{ContainerKind, TlvTag, TlvWriter};

    fn sigma1_fixture(resumption: Option<ResumptionPair>) -> Sigma1 {
        Sigma1 {
            initiator_random: [0x5a; RANDOM_LEN],
            initiator_session_id: 0xbeef,
            destination_id: [0x11; DESTINATION_ID_LEN],
            initiator_eph_public_key: [0x04; EPHEMERAL_PUBLIC_KEY_LEN],
            initiator_session_params: Some(SessionParameters {
                session_idle_interval_ms: Some(300),
                max_paths_per_invoke: Some(2),
                ..Default::default()
            }),
            resumption,
        }
    }

    #[test]
    fn test_sigma1_roundtrip() {
        let msg = sigma1_fixture(None);
        assert_eq!(Sigma1::decode(&msg.encode().unwrap()).unwrap(), msg);

        let msg = sigma1_fixture(Some(ResumptionPair {
            resumption_id: [9; RESUMPTION_ID_LEN],
            resume_mic: [7; RESUME_MIC_LEN],
        }));
        assert_eq!(Sigma1::decode(&msg.encode().unwrap()).unwrap(), msg);
    }

    #[test]
    fn test_sigma1_resumption_pair_incomplete() {
        // hand-encode with the id but no mic
        let mut w = TlvWriter::new();
        let t = w
            .start_container(TlvTag::Anonymous, ContainerKind::Structure)
            .unwrap();
        w.write_octetstring(TlvTag::Context(1), &[0; RANDOM_LEN]).unwrap();
        w.write_uint(TlvTag::Context(2), 1).unwrap();
        w.write_octetstring(TlvTag::Context(3), &[0; DESTINATION_ID_LEN])
            .unwrap();
        w.write_octetstring(TlvTag::Context(4), &[0; EPHEMERAL_PUBLIC_KEY_LEN])
            .unwrap();
        w.write_octetstring(TlvTag::Context(6), &[0; RESUMPTION_ID_LEN])
            .unwrap();
        w.end_container(t).unwrap();
        let data = w.finish().unwrap();
        assert_eq!(
            Sigma1::decode(&data),
            Err(CodecError::MissingField("initiatorResumeMIC"))
        );
    }

    #[test]
    fn test_sigma1_missing_destination() {
        let mut w = TlvWriter::new();
        let t = w
            .start_container(TlvTag::Anonymous, ContainerKind::Structure)
            .unwrap();
        w.write_octetstring(TlvTag::Context(1), &[0; RANDOM_LEN]).unwrap();
        w.write_uint(TlvTag::Context(2), 1).unwrap();
        w.write_octetstring(TlvTag::Context(4), &[0; EPHEMERAL_PUBLIC_KEY_LEN])
            .unwrap();
        w.end_container(t).unwrap();
        let data = w.finish().unwrap();
        assert_eq!(
            Sigma1::decode(&data),
            Err(CodecError::MissingField("destinationId"))
        );
    }

    #[test]
    fn test_sigma1_unknown_trailing_field_tolerated() {
        let msg = sigma1_fixture(None);
        let mut data = msg.encode().unwrap();
        // splice an unknown context-tagged uint before the terminator
        let end = data.pop().unwrap();
        data.extend_from_slice(&[0x24, 0x63, 0x05]);
        data.push(end);
        assert_eq!(Sigma1::decode(&data).unwrap(), msg);
    }

    #[test]
    fn test_sigma1_params_wrong_container_kind() {
        let mut w = TlvWriter::new();
        let t = w
            .start_container(TlvTag::Anonymous, ContainerKind::Structure)
            .unwrap();
        w.write_octetstring(TlvTag::Context(1), &[0; RANDOM_LEN]).unwrap();
        w.write_uint(TlvTag::Context(2), 1).unwrap();
        w.write_octetstring(TlvTag::Context(3), &[0; DESTINATION_ID_LEN])
            .unwrap();
        w.write_octetstring(TlvTag::Context(4), &[0; EPHEMERAL_PUBLIC_KEY_LEN])
            .unwrap();
        // params slot as an array instead of a structure
        let a = w
            .start_container(TlvTag::Context(5), ContainerKind::Array)
            .unwrap();
        w.end_container(a).unwrap();
        w.end_container(t).unwrap();
        let data = w.finish().unwrap();
        assert_eq!(Sigma1::decode(&data), Err(CodecError::WrongType));
    }

    #[test]
    fn test_sigma2_roundtrip() {
        let msg = Sigma2 {
            responder_random: [3; RANDOM_LEN],
            responder_session_id: 17,
            responder_eph_public_key: [4; EPHEMERAL_PUBLIC_KEY_LEN],
            encrypted2: vec![0xde, 0xad, 0xbe, 0xef],
            responder_session_params: None,
        };
        assert_eq!(Sigma2::decode(&msg.encode().unwrap()).unwrap(), msg);
    }

    #[test]
    fn test_sigma2_resume_roundtrip() {
        let msg = Sigma2Resume {
            resumption_id: [1; RESUMPTION_ID_LEN],
            sigma2_resume_mic: [2; RESUME_MIC_LEN],
            responder_session_id: 40000,
            responder_session_params: Some(SessionParameters {
                session_active_interval_ms: Some(500),
                ..Default::default()
            }),
        };
        assert_eq!(Sigma2Resume::decode(&msg.encode().unwrap()).unwrap(), msg);
    }

    #[test]
    fn test_sigma3_and_tbe_roundtrip() {
        let msg = Sigma3 {
            encrypted3: vec![9; 120],
        };
        assert_eq!(Sigma3::decode(&msg.encode().unwrap()).unwrap(), msg);

        let tbe = Sigma2Tbe {
            responder_noc: vec![1; 200],
            responder_icac: Some(vec![2; 180]),
            signature: [3; SIGNATURE_LEN],
            resumption_id: [4; RESUMPTION_ID_LEN],
        };
        assert_eq!(Sigma2Tbe::decode(&tbe.encode().unwrap()).unwrap(), tbe);

        let tbe = Sigma3Tbe {
            initiator_noc: vec![1; 200],
            initiator_icac: None,
            signature: [3; SIGNATURE_LEN],
        };
        assert_eq!(Sigma3Tbe::decode(&tbe.encode().unwrap()).unwrap(), tbe);
    }
}
