//! Negotiated session parameter substructure carried by every sigma
//! message. All members are optional; an absent slot means the peer's
//! defaults apply.

use crate::error::CodecError;
use crate::tlv::{ContainerKind, ElementType, TlvReader, TlvTag, TlvWriter};

type Result<T> = std::result::Result<T, CodecError>;

const TAG_IDLE_INTERVAL: u8 = 1;
const TAG_ACTIVE_INTERVAL: u8 = 2;
const TAG_ACTIVE_THRESHOLD: u8 = 3;
const TAG_DATA_MODEL_REVISION: u8 = 4;
const TAG_INTERACTION_MODEL_REVISION: u8 = 5;
const TAG_SPECIFICATION_VERSION: u8 = 6;
const TAG_MAX_PATHS_PER_INVOKE: u8 = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionParameters {
    pub session_idle_interval_ms: Option<u32>,
    pub session_active_interval_ms: Option<u32>,
    pub session_active_threshold_ms: Option<u16>,
    pub data_model_revision: Option<u16>,
    pub interaction_model_revision: Option<u16>,
    pub specification_version: Option<u32>,
    pub max_paths_per_invoke: Option<u16>,
}

impl SessionParameters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Encode into the caller's context-tag slot. Call only when there is
    /// something to say; fully-default parameters are left off the wire.
    pub fn encode(&self, w: &mut TlvWriter, slot: u8) -> Result<()> {
        let token = w.start_container(TlvTag::Context(slot), ContainerKind::Structure)?;
        if let Some(v) = self.session_idle_interval_ms {
            w.write_uint(TlvTag::Context(TAG_IDLE_INTERVAL), v as u64)?;
        }
        if let Some(v) = self.session_active_interval_ms {
            w.write_uint(TlvTag::Context(TAG_ACTIVE_INTERVAL), v as u64)?;
        }
        if let Some(v) = self.session_active_threshold_ms {
            w.write_uint(TlvTag::Context(TAG_ACTIVE_THRESHOLD), v as u64)?;
        }
        if let Some(v) = self.data_model_revision {
            w.write_uint(TlvTag::Context(TAG_DATA_MODEL_REVISION), v as u64)?;
        }
        if let Some(v) = self.interaction_model_revision {
            w.write_uint(TlvTag::Context(TAG_INTERACTION_MODEL_REVISION), v as u64)?;
        }
        if let Some(v) = self.specification_version {
            w.write_uint(TlvTag::Context(TAG_SPECIFICATION_VERSION), v as u64)?;
        }
        if let Some(v) = self.max_paths_per_invoke {
            w.write_uint(TlvTag::Context(TAG_MAX_PATHS_PER_INVOKE), v as u64)?;
        }
        w.end_container(token)
    }

    /// Decode the substructure the reader is currently positioned on.
    /// Members may appear in any subset and order; unrecognized member
    /// tags are skipped for forward compatibility.
    pub fn decode(r: &mut TlvReader) -> Result<Self> {
        let mut out = Self::default();
        r.enter_container()?;
        while let Some(elem) = r.next()? {
            let tag = match elem.tag {
                TlvTag::Context(t) => t,
                _ => continue,
            };
            if elem.typ != ElementType::UnsignedInt {
                continue;
            }
            match tag {
                TAG_IDLE_INTERVAL => out.session_idle_interval_ms = Some(r.get_u32()?),
                TAG_ACTIVE_INTERVAL => out.session_active_interval_ms = Some(r.get_u32()?),
                TAG_ACTIVE_THRESHOLD => out.session_active_threshold_ms = Some(r.get_u16()?),
                TAG_DATA_MODEL_REVISION => out.data_model_revision = Some(r.get_u16()?),
                TAG_INTERACTION_MODEL_REVISION => {
                    out.interaction_model_revision = Some(r.get_u16()?)
                }
                TAG_SPECIFICATION_VERSION => out.specification_version = Some(r.get_u32()?),
                TAG_MAX_PATHS_PER_INVOKE => out.max_paths_per_invoke = Some(r.get_u16()?),
                _ => {}
            }
        }
        r.exit_container()?;
        Ok(out)
    }
}
