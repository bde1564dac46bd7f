// In-process CASE handshake between two nodes of one fabric: a fresh
// sigma1/2/3 exchange first, then an abbreviated resumed handshake.
// Run with RUST_LOG=debug to watch the state transitions.

use std::sync::Arc;

use anyhow::{Context, Result};

use matter_case::case::{CaseConfig, CaseContext, EstablishedSession};
use matter_case::cert::{
    epoch2000_now, sign_certificate, CertParams, CertType, MatterCert,
    KEY_USAGE_DIGITAL_SIGNATURE, KEY_USAGE_KEY_CERT_SIGN,
};
use matter_case::fabric::Fabric;
use matter_case::resumption::{ResumptionRecord, ResumptionStore};
use matter_case::session_params::SessionParameters;

const FABRIC_ID: u64 = 0x1000;
const ROOT_CA_ID: u64 = 1;
const INITIATOR_NODE: u64 = 0x100;
const RESPONDER_NODE: u64 = 0x200;
const IPK_EPOCH_KEY: [u8; 16] = *b"demo-ipk-epoch-k";

struct Authority {
    key: p256::SecretKey,
    cert: Vec<u8>,
}

fn bootstrap_authority() -> Result<Authority> {
    let key = p256::SecretKey::random(&mut rand::thread_rng());
    let cert = sign_certificate(
        &CertParams {
            serial: 1,
            cert_type: CertType::Root,
            subject_id: ROOT_CA_ID,
            issuer_type: CertType::Root,
            issuer_id: ROOT_CA_ID,
            fabric_id: Some(FABRIC_ID),
            not_before: epoch2000_now() - 60,
            not_after: epoch2000_now() + 10 * 365 * 24 * 3600,
            key_usage: KEY_USAGE_KEY_CERT_SIGN,
            key_purposes: None,
            public_key: key.public_key().to_sec1_bytes().to_vec(),
        },
        &key,
    )?;
    Ok(Authority { key, cert })
}

fn make_node(ca: &Authority, fabric: &Fabric, node_id: u64) -> Result<Arc<CaseConfig>> {
    let key = p256::SecretKey::random(&mut rand::thread_rng());
    let noc = sign_certificate(
        &CertParams {
            serial: node_id,
            cert_type: CertType::Node,
            subject_id: node_id,
            issuer_type: CertType::Root,
            issuer_id: ROOT_CA_ID,
            fabric_id: Some(FABRIC_ID),
            not_before: epoch2000_now() - 60,
            not_after: epoch2000_now() + 365 * 24 * 3600,
            key_usage: KEY_USAGE_DIGITAL_SIGNATURE,
            key_purposes: None,
            public_key: key.public_key().to_sec1_bytes().to_vec(),
        },
        &ca.key,
    )?;
    Ok(Arc::new(CaseConfig {
        fabric: fabric.clone(),
        fabric_index: 1,
        node_id,
        noc,
        icac: None,
        operational_key: key,
        root_cert: ca.cert.clone(),
        session_params: SessionParameters {
            session_idle_interval_ms: Some(300),
            ..Default::default()
        },
    }))
}

fn run_handshake(
    initiator: &Arc<CaseConfig>,
    initiator_store: &Arc<ResumptionStore>,
    responder: &Arc<CaseConfig>,
    responder_store: &Arc<ResumptionStore>,
    resume: Option<ResumptionRecord>,
) -> Result<EstablishedSession> {
    let (mut init, sigma1) = CaseContext::begin_as_initiator(
        initiator.clone(),
        initiator_store.clone(),
        1,
        RESPONDER_NODE,
        resume,
    )?;
    let mut resp = CaseContext::begin_as_responder(responder.clone(), responder_store.clone(), 2);
    let reply = resp
        .handle_message(&sigma1)?
        .outbound
        .context("responder produced no reply")?;
    let step = init.handle_message(&reply)?;
    if let Some(sigma3) = step.outbound {
        resp.handle_message(&sigma3)?;
    }
    step.established.context("handshake did not complete")
}

fn main() -> Result<()> {
    env_logger::init();

    let ca = bootstrap_authority()?;
    let root_public = MatterCert::decode(&ca.cert)
        .map_err(anyhow::Error::from)?
        .public_key;
    let fabric = Fabric::new(FABRIC_ID, &IPK_EPOCH_KEY, &root_public);

    let initiator = make_node(&ca, &fabric, INITIATOR_NODE)?;
    let responder = make_node(&ca, &fabric, RESPONDER_NODE)?;
    let initiator_store = Arc::new(ResumptionStore::default());
    let responder_store = Arc::new(ResumptionStore::default());

    let session = run_handshake(
        &initiator,
        &initiator_store,
        &responder,
        &responder_store,
        None,
    )?;
    println!(
        "fresh handshake complete: peer node {:#x}, session ids {}/{}, resumed={}",
        session.peer_node_id, session.local_session_id, session.peer_session_id, session.resumed
    );

    let record = initiator_store
        .snapshot()
        .pop()
        .context("no resumption record cached")?;
    let session = run_handshake(
        &initiator,
        &initiator_store,
        &responder,
        &responder_store,
        Some(record),
    )?;
    println!(
        "resumed handshake complete: peer node {:#x}, session ids {}/{}, resumed={}",
        session.peer_node_id, session.local_session_id, session.peer_session_id, session.resumed
    );

    Ok(())
}
