//! CASE handshake state machine. One [CaseContext] drives a single
//! in-flight handshake; the owner feeds it reassembled message bodies
//! and delivers whatever bytes come back out.
//!
//! The context is transport-agnostic and strictly half-duplex. It never
//! retries internally: every parse or validation failure is terminal
//! for the attempt, and retransmission of already-built bytes is the
//! owner's job. The resumption store is the only state shared between
//! contexts.

use std::sync::Arc;

use rand::RngCore;

use crate::cert::{self, ValidationContext};
use crate::error::{CaseError, CodecError, CryptoError, ProtocolError, Result};
use crate::fabric::{match_destination, Fabric, NodeCandidate};
use crate::messages::{
    ResumptionPair, Sigma1, Sigma2, Sigma2Resume, Sigma2Tbe, Sigma3, Sigma3Tbe,
    EPHEMERAL_PUBLIC_KEY_LEN, RANDOM_LEN, RESUMPTION_ID_LEN,
};
use crate::resumption::{ResumptionRecord, ResumptionStore};
use crate::session_params::SessionParameters;
use crate::transcript::{
    self, SessionKeys, Transcript, NONCE_SIGMA2, NONCE_SIGMA3,
};
use crate::util::cryptoutil;

/// Protocol opcodes, carried as the first byte of every framed message.
pub const OPCODE_SIGMA1: u8 = 0x30;
pub const OPCODE_SIGMA2: u8 = 0x31;
pub const OPCODE_SIGMA3: u8 = 0x32;
pub const OPCODE_SIGMA2_RESUME: u8 = 0x33;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    Idle,
    AwaitingSigma1,
    AwaitingSigma2,
    AwaitingSigma3,
    Complete,
    Failed,
}

impl CaseState {
    fn is_awaiting(self) -> bool {
        matches!(
            self,
            CaseState::AwaitingSigma1 | CaseState::AwaitingSigma2 | CaseState::AwaitingSigma3
        )
    }
}

/// Everything a handshake needs about the local node. Built once by the
/// embedding session manager and shared across contexts.
pub struct CaseConfig {
    pub fabric: Fabric,
    pub fabric_index: u8,
    pub node_id: u64,
    pub noc: Vec<u8>,
    pub icac: Option<Vec<u8>>,
    pub operational_key: p256::SecretKey,
    pub root_cert: Vec<u8>,
    pub session_params: SessionParameters,
}

impl CaseConfig {
    fn params(&self) -> Option<SessionParameters> {
        if self.session_params.is_empty() {
            None
        } else {
            Some(self.session_params.clone())
        }
    }
}

/// Session state handed to the owner once the handshake completes.
#[derive(Debug, Clone)]
pub struct EstablishedSession {
    pub keys: SessionKeys,
    pub local_session_id: u16,
    pub peer_session_id: u16,
    pub peer_node_id: u64,
    pub peer_session_params: Option<SessionParameters>,
    pub resumed: bool,
}

/// Result of driving the state machine one step.
#[derive(Debug, Default)]
pub struct CaseOutcome {
    /// Framed bytes to hand to the transport, if this step produced any.
    pub outbound: Option<Vec<u8>>,
    /// Present exactly once, on the step that reaches `Complete`.
    pub established: Option<EstablishedSession>,
}

fn frame(opcode: u8, body: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(opcode);
    out.extend_from_slice(&body);
    out
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    rand::thread_rng().fill_bytes(&mut out);
    out
}

fn eph_public_bytes(
    secret: &p256::ecdh::EphemeralSecret,
) -> std::result::Result<[u8; EPHEMERAL_PUBLIC_KEY_LEN], CryptoError> {
    secret
        .public_key()
        .to_sec1_bytes()
        .as_ref()
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey)
}

fn shared_secret(
    secret: p256::ecdh::EphemeralSecret,
    peer_public: &[u8],
) -> std::result::Result<Vec<u8>, CryptoError> {
    let peer = p256::PublicKey::from_sec1_bytes(peer_public)
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(secret.diffie_hellman(&peer).raw_secret_bytes().to_vec())
}

/// One in-flight handshake.
pub struct CaseContext {
    config: Arc<CaseConfig>,
    store: Arc<ResumptionStore>,
    role: Role,
    state: CaseState,
    local_session_id: u16,
    peer_session_id: u16,
    peer_node_id: u64,
    initiator_random: [u8; RANDOM_LEN],
    eph_secret: Option<p256::ecdh::EphemeralSecret>,
    eph_public: [u8; EPHEMERAL_PUBLIC_KEY_LEN],
    peer_eph_public: [u8; EPHEMERAL_PUBLIC_KEY_LEN],
    shared: Vec<u8>,
    transcript: Transcript,
    /// id the responder seals into sigma2, installed on completion
    pending_resumption_id: [u8; RESUMPTION_ID_LEN],
    /// record the initiator offers to resume from
    resume: Option<ResumptionRecord>,
    peer_params: Option<SessionParameters>,
}

impl CaseContext {
    /// Build an initiator context and its sigma1 in one step; the
    /// returned bytes go straight to the transport.
    pub fn begin_as_initiator(
        config: Arc<CaseConfig>,
        store: Arc<ResumptionStore>,
        local_session_id: u16,
        peer_node_id: u64,
        resume: Option<ResumptionRecord>,
    ) -> Result<(Self, Vec<u8>)> {
        let mut ctx = Self::new(
            config,
            store,
            Role::Initiator,
            local_session_id,
            peer_node_id,
            resume,
        );
        let sigma1 = ctx.build_sigma1()?;
        Ok((ctx, sigma1))
    }

    /// Build a responder context armed for the peer's sigma1.
    pub fn begin_as_responder(
        config: Arc<CaseConfig>,
        store: Arc<ResumptionStore>,
        local_session_id: u16,
    ) -> Self {
        let mut ctx = Self::new(config, store, Role::Responder, local_session_id, 0, None);
        ctx.state = CaseState::AwaitingSigma1;
        ctx
    }

    fn new(
        config: Arc<CaseConfig>,
        store: Arc<ResumptionStore>,
        role: Role,
        local_session_id: u16,
        peer_node_id: u64,
        resume: Option<ResumptionRecord>,
    ) -> Self {
        Self {
            config,
            store,
            role,
            state: CaseState::Idle,
            local_session_id,
            peer_session_id: 0,
            peer_node_id,
            initiator_random: [0; RANDOM_LEN],
            eph_secret: None,
            eph_public: [0; EPHEMERAL_PUBLIC_KEY_LEN],
            peer_eph_public: [0; EPHEMERAL_PUBLIC_KEY_LEN],
            shared: Vec::new(),
            transcript: Transcript::new(),
            pending_resumption_id: [0; RESUMPTION_ID_LEN],
            resume,
            peer_params: None,
        }
    }

    pub fn state(&self) -> CaseState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Drive the state machine with one framed inbound message. Any
    /// error is terminal: the context moves to `Failed` and must be
    /// discarded.
    pub fn handle_message(&mut self, message: &[u8]) -> Result<CaseOutcome> {
        let (opcode, body) = match message.split_first() {
            Some(split) => split,
            None => return Err(self.failed(CodecError::UnexpectedEndOfInput.into())),
        };
        let step = match (self.role, self.state, *opcode) {
            (Role::Responder, CaseState::AwaitingSigma1, OPCODE_SIGMA1) => self.on_sigma1(body),
            (Role::Responder, CaseState::AwaitingSigma3, OPCODE_SIGMA3) => self.on_sigma3(body),
            (Role::Initiator, CaseState::AwaitingSigma2, OPCODE_SIGMA2) => self.on_sigma2(body),
            (Role::Initiator, CaseState::AwaitingSigma2, OPCODE_SIGMA2_RESUME) => {
                self.on_sigma2_resume(body)
            }
            _ => Err(ProtocolError::UnexpectedMessage.into()),
        };
        match step {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.failed(e)),
        }
    }

    /// The owner's timer for the current awaiting state expired.
    pub fn on_timeout(&mut self) -> Result<()> {
        if self.state.is_awaiting() {
            return Err(self.failed(ProtocolError::Timeout.into()));
        }
        Ok(())
    }

    /// Cancel the handshake, discarding ephemeral key material and the
    /// accumulated transcript.
    pub fn abort(&mut self) {
        log::debug!("case: handshake aborted in {:?}", self.state);
        self.teardown();
        self.state = CaseState::Failed;
    }

    fn failed(&mut self, e: CaseError) -> CaseError {
        log::debug!("case: {:?} handshake failed in {:?}: {}", self.role, self.state, e);
        self.teardown();
        self.state = CaseState::Failed;
        e
    }

    fn teardown(&mut self) {
        self.eph_secret = None;
        self.shared.clear();
        self.resume = None;
        self.transcript = Transcript::new();
    }

    // ---- initiator ----

    fn build_sigma1(&mut self) -> Result<Vec<u8>> {
        self.initiator_random = random_bytes();
        let eph = p256::ecdh::EphemeralSecret::random(&mut rand::thread_rng());
        self.eph_public = eph_public_bytes(&eph)?;
        self.eph_secret = Some(eph);
        let destination_id = self
            .config
            .fabric
            .destination_id(&self.initiator_random, self.peer_node_id)?;
        let resumption = match &self.resume {
            Some(record) => Some(ResumptionPair {
                resumption_id: record.resumption_id,
                resume_mic: transcript::sigma1_resume_mic(
                    &record.shared_secret,
                    &self.initiator_random,
                    &record.resumption_id,
                )?,
            }),
            None => None,
        };
        let sigma1 = Sigma1 {
            initiator_random: self.initiator_random,
            initiator_session_id: self.local_session_id,
            destination_id,
            initiator_eph_public_key: self.eph_public,
            initiator_session_params: self.config.params(),
            resumption,
        }
        .encode()?;
        self.transcript.append(&sigma1);
        self.state = CaseState::AwaitingSigma2;
        log::debug!("case: sigma1 sent, awaiting sigma2");
        Ok(frame(OPCODE_SIGMA1, sigma1))
    }

    fn on_sigma2(&mut self, body: &[u8]) -> Result<CaseOutcome> {
        let sigma2 = Sigma2::decode(body)?;
        let eph = self
            .eph_secret
            .take()
            .ok_or(ProtocolError::UnexpectedMessage)?;
        let shared = shared_secret(eph, &sigma2.responder_eph_public_key)?;
        let ipk = self.config.fabric.signed_ipk()?;
        let th_sigma1 = self.transcript.hash();
        let s2k = transcript::sigma2_key(
            &ipk,
            &sigma2.responder_random,
            &sigma2.responder_eph_public_key,
            &th_sigma1,
            &shared,
        )?;
        let plain = cryptoutil::aead_open(&s2k, NONCE_SIGMA2, &[], &sigma2.encrypted2)?;
        let tbe = Sigma2Tbe::decode(&plain)?;
        let peer = cert::validate(
            &tbe.responder_noc,
            tbe.responder_icac.as_deref(),
            &self.config.root_cert,
            &ValidationContext::for_operational_cert(cert::epoch2000_now()),
        )?;
        if peer.fabric_id != self.config.fabric.id || peer.node_id != self.peer_node_id {
            return Err(ProtocolError::DestinationMismatch.into());
        }
        let peer_tbs = transcript::signature_tbs(
            &tbe.responder_noc,
            tbe.responder_icac.as_deref(),
            &sigma2.responder_eph_public_key,
            &self.eph_public,
        )?;
        cryptoutil::ecdsa_verify(&peer.public_key, &peer_tbs, &tbe.signature)?;

        self.transcript.append(body);
        let th_sigma12 = self.transcript.hash();
        let s3k = transcript::sigma3_key(&ipk, &th_sigma12, &shared)?;
        let own_tbs = transcript::signature_tbs(
            &self.config.noc,
            self.config.icac.as_deref(),
            &self.eph_public,
            &sigma2.responder_eph_public_key,
        )?;
        let signature = cryptoutil::ecdsa_sign(&self.config.operational_key, &own_tbs)?;
        let tbe3 = Sigma3Tbe {
            initiator_noc: self.config.noc.clone(),
            initiator_icac: self.config.icac.clone(),
            signature,
        }
        .encode()?;
        let sigma3 = Sigma3 {
            encrypted3: cryptoutil::aead_seal(&s3k, NONCE_SIGMA3, &[], &tbe3)?,
        }
        .encode()?;
        self.transcript.append(&sigma3);
        let keys = transcript::session_keys(&ipk, &self.transcript.hash(), &shared)?;

        let record = ResumptionRecord {
            resumption_id: tbe.resumption_id,
            shared_secret: shared,
            peer_node_id: peer.node_id,
            fabric_index: self.config.fabric_index,
            session_params: sigma2.responder_session_params.clone().unwrap_or_default(),
        };
        match self.resume.take() {
            // a stale record was offered but not accepted; retire its id
            Some(old) => self.store.rotate(&old.resumption_id, record),
            None => self.store.put(record),
        }
        self.peer_session_id = sigma2.responder_session_id;
        self.state = CaseState::Complete;
        log::debug!("case: fresh session established with node {:#x}", peer.node_id);
        Ok(CaseOutcome {
            outbound: Some(frame(OPCODE_SIGMA3, sigma3)),
            established: Some(EstablishedSession {
                keys,
                local_session_id: self.local_session_id,
                peer_session_id: self.peer_session_id,
                peer_node_id: peer.node_id,
                peer_session_params: sigma2.responder_session_params,
                resumed: false,
            }),
        })
    }

    fn on_sigma2_resume(&mut self, body: &[u8]) -> Result<CaseOutcome> {
        let msg = Sigma2Resume::decode(body)?;
        // only legal if sigma1 actually offered resumption
        let record = self
            .resume
            .take()
            .ok_or(ProtocolError::ResumptionMismatch)?;
        transcript::verify_sigma2_resume_mic(
            &record.shared_secret,
            &self.initiator_random,
            &msg.resumption_id,
            &msg.sigma2_resume_mic,
        )?;
        let ipk = self.config.fabric.signed_ipk()?;
        let keys = transcript::resumed_session_keys(
            &record.shared_secret,
            &self.initiator_random,
            &msg.resumption_id,
            &ipk,
        )?;
        self.store.rotate(
            &record.resumption_id,
            ResumptionRecord {
                resumption_id: msg.resumption_id,
                shared_secret: record.shared_secret,
                peer_node_id: record.peer_node_id,
                fabric_index: record.fabric_index,
                session_params: msg
                    .responder_session_params
                    .clone()
                    .unwrap_or(record.session_params),
            },
        );
        self.eph_secret = None;
        self.peer_session_id = msg.responder_session_id;
        self.state = CaseState::Complete;
        log::debug!("case: session resumed with node {:#x}", record.peer_node_id);
        Ok(CaseOutcome {
            outbound: None,
            established: Some(EstablishedSession {
                keys,
                local_session_id: self.local_session_id,
                peer_session_id: self.peer_session_id,
                peer_node_id: record.peer_node_id,
                peer_session_params: msg.responder_session_params,
                resumed: true,
            }),
        })
    }

    // ---- responder ----

    fn on_sigma1(&mut self, body: &[u8]) -> Result<CaseOutcome> {
        let sigma1 = Sigma1::decode(body)?;
        self.transcript.append(body);
        let candidates = [NodeCandidate {
            fabric: self.config.fabric.clone(),
            fabric_index: self.config.fabric_index,
            node_id: self.config.node_id,
        }];
        if match_destination(&candidates, &sigma1.initiator_random, &sigma1.destination_id)
            .is_none()
        {
            return Err(ProtocolError::DestinationMismatch.into());
        }
        self.initiator_random = sigma1.initiator_random;
        self.peer_session_id = sigma1.initiator_session_id;
        self.peer_params = sigma1.initiator_session_params.clone();

        if let Some(pair) = &sigma1.resumption {
            if let Some(record) = self.store.lookup(&pair.resumption_id) {
                let mic_ok = record.fabric_index == self.config.fabric_index
                    && transcript::verify_sigma1_resume_mic(
                        &record.shared_secret,
                        &sigma1.initiator_random,
                        &pair.resumption_id,
                        &pair.resume_mic,
                    )
                    .is_ok();
                if mic_ok {
                    return self.accept_resumption(record);
                }
                log::debug!("case: resume MIC check failed, taking fresh path");
            } else {
                log::debug!("case: unknown or expired resumption id, taking fresh path");
            }
        }
        self.fresh_sigma2(&sigma1)
    }

    fn accept_resumption(&mut self, record: ResumptionRecord) -> Result<CaseOutcome> {
        let new_id: [u8; RESUMPTION_ID_LEN] = random_bytes();
        let mic = transcript::sigma2_resume_mic(
            &record.shared_secret,
            &self.initiator_random,
            &new_id,
        )?;
        let ipk = self.config.fabric.signed_ipk()?;
        let keys = transcript::resumed_session_keys(
            &record.shared_secret,
            &self.initiator_random,
            &new_id,
            &ipk,
        )?;
        let msg = Sigma2Resume {
            resumption_id: new_id,
            sigma2_resume_mic: mic,
            responder_session_id: self.local_session_id,
            responder_session_params: self.config.params(),
        }
        .encode()?;
        // the old id must be dead before the peer can see completion
        self.store.rotate(
            &record.resumption_id,
            ResumptionRecord {
                resumption_id: new_id,
                shared_secret: record.shared_secret,
                peer_node_id: record.peer_node_id,
                fabric_index: record.fabric_index,
                session_params: self.peer_params.clone().unwrap_or(record.session_params),
            },
        );
        self.state = CaseState::Complete;
        log::debug!("case: session resumed with node {:#x}", record.peer_node_id);
        Ok(CaseOutcome {
            outbound: Some(frame(OPCODE_SIGMA2_RESUME, msg)),
            established: Some(EstablishedSession {
                keys,
                local_session_id: self.local_session_id,
                peer_session_id: self.peer_session_id,
                peer_node_id: record.peer_node_id,
                peer_session_params: self.peer_params.clone(),
                resumed: true,
            }),
        })
    }

    fn fresh_sigma2(&mut self, sigma1: &Sigma1) -> Result<CaseOutcome> {
        let eph = p256::ecdh::EphemeralSecret::random(&mut rand::thread_rng());
        self.eph_public = eph_public_bytes(&eph)?;
        self.peer_eph_public = sigma1.initiator_eph_public_key;
        self.shared = shared_secret(eph, &sigma1.initiator_eph_public_key)?;
        self.pending_resumption_id = random_bytes();
        let responder_random: [u8; RANDOM_LEN] = random_bytes();
        let ipk = self.config.fabric.signed_ipk()?;
        let th_sigma1 = self.transcript.hash();
        let s2k = transcript::sigma2_key(
            &ipk,
            &responder_random,
            &self.eph_public,
            &th_sigma1,
            &self.shared,
        )?;
        let tbs = transcript::signature_tbs(
            &self.config.noc,
            self.config.icac.as_deref(),
            &self.eph_public,
            &sigma1.initiator_eph_public_key,
        )?;
        let signature = cryptoutil::ecdsa_sign(&self.config.operational_key, &tbs)?;
        let tbe = Sigma2Tbe {
            responder_noc: self.config.noc.clone(),
            responder_icac: self.config.icac.clone(),
            signature,
            resumption_id: self.pending_resumption_id,
        }
        .encode()?;
        let sigma2 = Sigma2 {
            responder_random,
            responder_session_id: self.local_session_id,
            responder_eph_public_key: self.eph_public,
            encrypted2: cryptoutil::aead_seal(&s2k, NONCE_SIGMA2, &[], &tbe)?,
            responder_session_params: self.config.params(),
        }
        .encode()?;
        self.transcript.append(&sigma2);
        self.state = CaseState::AwaitingSigma3;
        log::debug!("case: sigma2 sent, awaiting sigma3");
        Ok(CaseOutcome {
            outbound: Some(frame(OPCODE_SIGMA2, sigma2)),
            established: None,
        })
    }

    fn on_sigma3(&mut self, body: &[u8]) -> Result<CaseOutcome> {
        let sigma3 = Sigma3::decode(body)?;
        let ipk = self.config.fabric.signed_ipk()?;
        let th_sigma12 = self.transcript.hash();
        let s3k = transcript::sigma3_key(&ipk, &th_sigma12, &self.shared)?;
        let plain = cryptoutil::aead_open(&s3k, NONCE_SIGMA3, &[], &sigma3.encrypted3)?;
        let tbe = Sigma3Tbe::decode(&plain)?;
        let peer = cert::validate(
            &tbe.initiator_noc,
            tbe.initiator_icac.as_deref(),
            &self.config.root_cert,
            &ValidationContext::for_operational_cert(cert::epoch2000_now()),
        )?;
        if peer.fabric_id != self.config.fabric.id {
            return Err(ProtocolError::DestinationMismatch.into());
        }
        let peer_tbs = transcript::signature_tbs(
            &tbe.initiator_noc,
            tbe.initiator_icac.as_deref(),
            &self.peer_eph_public,
            &self.eph_public,
        )?;
        cryptoutil::ecdsa_verify(&peer.public_key, &peer_tbs, &tbe.signature)?;

        self.transcript.append(body);
        let keys = transcript::session_keys(&ipk, &self.transcript.hash(), &self.shared)?;
        self.store.put(ResumptionRecord {
            resumption_id: self.pending_resumption_id,
            shared_secret: std::mem::take(&mut self.shared),
            peer_node_id: peer.node_id,
            fabric_index: self.config.fabric_index,
            session_params: self.peer_params.clone().unwrap_or_default(),
        });
        self.state = CaseState::Complete;
        log::debug!("case: fresh session established with node {:#x}", peer.node_id);
        Ok(CaseOutcome {
            outbound: None,
            established: Some(EstablishedSession {
                keys,
                local_session_id: self.local_session_id,
                peer_session_id: self.peer_session_id,
                peer_node_id: peer.node_id,
                peer_session_params: self.peer_params.clone(),
                resumed: false,
            }),
        })
    }
}
