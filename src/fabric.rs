//! Fabric identity and the key material derived from it.

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::io::Write;

use crate::error::CryptoError;
use crate::messages::DESTINATION_ID_LEN;
use crate::util::cryptoutil;

type Result<T> = std::result::Result<T, CryptoError>;

#[derive(Clone)]
pub struct Fabric {
    pub id: u64,
    pub ipk_epoch_key: Vec<u8>,
    root_public_key: Vec<u8>,
}

impl Fabric {
    pub fn new(fabric_id: u64, ipk_epoch_key: &[u8], root_public_key: &[u8]) -> Self {
        Self {
            id: fabric_id,
            ipk_epoch_key: ipk_epoch_key.to_owned(),
            root_public_key: root_public_key.to_owned(),
        }
    }

    pub fn root_public_key(&self) -> &[u8] {
        &self.root_public_key
    }

    /// Compressed fabric identifier
    pub fn compressed(&self) -> Result<Vec<u8>> {
        let mut buf_id = Vec::new();
        let _ = buf_id.write_u64::<BigEndian>(self.id);
        cryptoutil::hkdf_sha256(
            &buf_id,
            &self.root_public_key.as_slice()[1..],
            "CompressedFabric".as_bytes(),
            8,
        )
    }

    /// Integrity Protection Key
    pub fn signed_ipk(&self) -> Result<Vec<u8>> {
        cryptoutil::hkdf_sha256(
            &self.compressed()?,
            &self.ipk_epoch_key,
            "GroupKey v1.0".as_bytes(),
            16,
        )
    }

    /// Destination identifier binding a sigma1 to one (fabric, node) pair:
    /// HMAC over random ‖ root key ‖ fabric id ‖ node id under the IPK.
    pub fn destination_id(
        &self,
        initiator_random: &[u8],
        node_id: u64,
    ) -> Result<[u8; DESTINATION_ID_LEN]> {
        let mut dst = Vec::new();
        let _ = dst.write_all(initiator_random);
        let _ = dst.write_all(&self.root_public_key);
        let _ = dst.write_u64::<LittleEndian>(self.id);
        let _ = dst.write_u64::<LittleEndian>(node_id);
        let mac = cryptoutil::hmac_sha256(&dst, &self.signed_ipk()?)?;
        let mut out = [0u8; DESTINATION_ID_LEN];
        out.copy_from_slice(&mac);
        Ok(out)
    }
}

/// One (fabric, node) identity a responder will answer for.
#[derive(Clone)]
pub struct NodeCandidate {
    pub fabric: Fabric,
    pub fabric_index: u8,
    pub node_id: u64,
}

/// Find the candidate whose destination id matches the one carried in a
/// received sigma1. No match means the message was not meant for us.
pub fn match_destination<'a>(
    candidates: &'a [NodeCandidate],
    initiator_random: &[u8],
    destination_id: &[u8; DESTINATION_ID_LEN],
) -> Option<&'a NodeCandidate> {
    candidates.iter().find(|c| {
        c.fabric
            .destination_id(initiator_random, c.node_id)
            .map(|d| &d == destination_id)
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_fabric(id: u64) -> Fabric {
        let key = p256::SecretKey::random(&mut rand::thread_rng());
        let public = key.public_key().to_sec1_bytes();
        Fabric::new(id, &[0x17; 16], &public)
    }

    #[test]
    fn test_destination_id_is_stable() {
        let fabric = test_fabric(1000);
        let random = [5u8; 32];
        let a = fabric.destination_id(&random, 55).unwrap();
        let b = fabric.destination_id(&random, 55).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, fabric.destination_id(&random, 56).unwrap());
    }

    #[test]
    fn test_match_destination() {
        let candidates = vec![
            NodeCandidate {
                fabric: test_fabric(1),
                fabric_index: 1,
                node_id: 11,
            },
            NodeCandidate {
                fabric: test_fabric(2),
                fabric_index: 2,
                node_id: 22,
            },
        ];
        let random = [9u8; 32];
        let want = candidates[1]
            .fabric
            .destination_id(&random, 22)
            .unwrap();
        let hit = match_destination(&candidates, &random, &want).unwrap();
        assert_eq!(hit.node_id, 22);
        assert!(match_destination(&candidates, &random, &[0; 32]).is_none());
    }
}
