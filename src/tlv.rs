//! Matter TLV encoder/decoder.
//!
//! Writer produces tagged elements with integers in the smallest fitting
//! width class; reader is a lazy forward-only cursor which decodes integers
//! to their canonical widest form. Every handshake message is one
//! anonymous-tagged structure at the top level.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::CodecError;

type Result<T> = std::result::Result<T, CodecError>;

const TYPE_INT_1: u8 = 0x00;
const TYPE_INT_2: u8 = 0x01;
const TYPE_INT_4: u8 = 0x02;
const TYPE_INT_8: u8 = 0x03;
const TYPE_UINT_1: u8 = 0x04;
const TYPE_UINT_2: u8 = 0x05;
const TYPE_UINT_4: u8 = 0x06;
const TYPE_UINT_8: u8 = 0x07;
const TYPE_BOOL_FALSE: u8 = 0x08;
const TYPE_BOOL_TRUE: u8 = 0x09;
const TYPE_FLOAT_4: u8 = 0x0A;
const TYPE_FLOAT_8: u8 = 0x0B;
const TYPE_UTF8_L1: u8 = 0x0C;
const TYPE_UTF8_L2: u8 = 0x0D;
const TYPE_UTF8_L4: u8 = 0x0E;
const TYPE_OCTET_STRING_L1: u8 = 0x10;
const TYPE_OCTET_STRING_L2: u8 = 0x11;
const TYPE_OCTET_STRING_L4: u8 = 0x12;
const TYPE_NULL: u8 = 0x14;
const TYPE_STRUCT: u8 = 0x15;
const TYPE_ARRAY: u8 = 0x16;
const TYPE_LIST: u8 = 0x17;
const TYPE_END_CONTAINER: u8 = 0x18;

const TAGCTRL_ANONYMOUS: u8 = 0;
const TAGCTRL_CONTEXT: u8 = 1;
const TAGCTRL_COMMON_2: u8 = 2;
const TAGCTRL_COMMON_4: u8 = 3;
const TAGCTRL_FULL_6: u8 = 6;
const TAGCTRL_FULL_8: u8 = 7;

/// Tag attached to a TLV element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvTag {
    Anonymous,
    Context(u8),
    CommonProfile(u32),
    FullyQualified { vendor: u16, profile: u16, tag: u32 },
}

/// Container kinds the writer can open. `List` is read-only on the wire
/// side of this library and intentionally absent here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Structure,
    Array,
}

/// Wire element classes reported by [TlvReader::next].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    UnsignedInt,
    SignedInt,
    Float,
    Double,
    Bool,
    Utf8,
    Bytes,
    Null,
    Structure,
    Array,
    List,
}

/// Proof of an open container; must be passed back to
/// [TlvWriter::end_container] in LIFO order.
#[derive(Debug)]
#[must_use]
pub struct ContainerToken {
    depth: usize,
}

/// TLV output buffer. Create, write elements, then [TlvWriter::finish].
pub struct TlvWriter {
    data: Vec<u8>,
    limit: Option<usize>,
    depth: usize,
}

impl TlvWriter {
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(1024),
            limit: None,
            depth: 0,
        }
    }

    /// Writer which fails with `BufferTooSmall` instead of growing past
    /// `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            data: Vec::with_capacity(limit.min(1024)),
            limit: Some(limit),
            depth: 0,
        }
    }

    fn ensure(&self, extra: usize) -> Result<()> {
        if let Some(limit) = self.limit {
            if self.data.len() + extra > limit {
                return Err(CodecError::BufferTooSmall);
            }
        }
        Ok(())
    }

    fn write_control(&mut self, tag: TlvTag, typ: u8) -> Result<()> {
        match tag {
            TlvTag::Anonymous => {
                self.ensure(1)?;
                self.data.push(typ);
            }
            TlvTag::Context(t) => {
                self.ensure(2)?;
                self.data.push((TAGCTRL_CONTEXT << 5) | typ);
                self.data.push(t);
            }
            TlvTag::CommonProfile(t) => {
                if t <= 0xffff {
                    self.ensure(3)?;
                    self.data.push((TAGCTRL_COMMON_2 << 5) | typ);
                    let _ = self.data.write_u16::<LittleEndian>(t as u16);
                } else {
                    self.ensure(5)?;
                    self.data.push((TAGCTRL_COMMON_4 << 5) | typ);
                    let _ = self.data.write_u32::<LittleEndian>(t);
                }
            }
            TlvTag::FullyQualified {
                vendor,
                profile,
                tag: t,
            } => {
                if t <= 0xffff {
                    self.ensure(7)?;
                    self.data.push((TAGCTRL_FULL_6 << 5) | typ);
                    let _ = self.data.write_u16::<LittleEndian>(vendor);
                    let _ = self.data.write_u16::<LittleEndian>(profile);
                    let _ = self.data.write_u16::<LittleEndian>(t as u16);
                } else {
                    self.ensure(9)?;
                    self.data.push((TAGCTRL_FULL_8 << 5) | typ);
                    let _ = self.data.write_u16::<LittleEndian>(vendor);
                    let _ = self.data.write_u16::<LittleEndian>(profile);
                    let _ = self.data.write_u32::<LittleEndian>(t);
                }
            }
        }
        Ok(())
    }

    /// Unsigned integer in the smallest fitting width class.
    pub fn write_uint(&mut self, tag: TlvTag, value: u64) -> Result<()> {
        if value <= 0xff {
            self.write_control(tag, TYPE_UINT_1)?;
            self.ensure(1)?;
            self.data.push(value as u8);
        } else if value <= 0xffff {
            self.write_control(tag, TYPE_UINT_2)?;
            self.ensure(2)?;
            let _ = self.data.write_u16::<LittleEndian>(value as u16);
        } else if value <= 0xffff_ffff {
            self.write_control(tag, TYPE_UINT_4)?;
            self.ensure(4)?;
            let _ = self.data.write_u32::<LittleEndian>(value as u32);
        } else {
            self.write_control(tag, TYPE_UINT_8)?;
            self.ensure(8)?;
            let _ = self.data.write_u64::<LittleEndian>(value);
        }
        Ok(())
    }

    /// Signed integer in the smallest fitting width class.
    pub fn write_int(&mut self, tag: TlvTag, value: i64) -> Result<()> {
        if let Ok(v) = i8::try_from(value) {
            self.write_control(tag, TYPE_INT_1)?;
            self.ensure(1)?;
            let _ = self.data.write_i8(v);
        } else if let Ok(v) = i16::try_from(value) {
            self.write_control(tag, TYPE_INT_2)?;
            self.ensure(2)?;
            let _ = self.data.write_i16::<LittleEndian>(v);
        } else if let Ok(v) = i32::try_from(value) {
            self.write_control(tag, TYPE_INT_4)?;
            self.ensure(4)?;
            let _ = self.data.write_i32::<LittleEndian>(v);
        } else {
            self.write_control(tag, TYPE_INT_8)?;
            self.ensure(8)?;
            let _ = self.data.write_i64::<LittleEndian>(value);
        }
        Ok(())
    }

    pub fn write_f32(&mut self, tag: TlvTag, value: f32) -> Result<()> {
        self.write_control(tag, TYPE_FLOAT_4)?;
        self.ensure(4)?;
        let _ = self.data.write_f32::<LittleEndian>(value);
        Ok(())
    }

    pub fn write_f64(&mut self, tag: TlvTag, value: f64) -> Result<()> {
        self.write_control(tag, TYPE_FLOAT_8)?;
        self.ensure(8)?;
        let _ = self.data.write_f64::<LittleEndian>(value);
        Ok(())
    }

    pub fn write_bool(&mut self, tag: TlvTag, value: bool) -> Result<()> {
        let typ = if value { TYPE_BOOL_TRUE } else { TYPE_BOOL_FALSE };
        self.write_control(tag, typ)
    }

    pub fn write_null(&mut self, tag: TlvTag) -> Result<()> {
        self.write_control(tag, TYPE_NULL)
    }

    pub fn write_string(&mut self, tag: TlvTag, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() > 0xffff {
            self.write_control(tag, TYPE_UTF8_L4)?;
            self.ensure(4 + bytes.len())?;
            let _ = self.data.write_u32::<LittleEndian>(bytes.len() as u32);
        } else if bytes.len() > 0xff {
            self.write_control(tag, TYPE_UTF8_L2)?;
            self.ensure(2 + bytes.len())?;
            let _ = self.data.write_u16::<LittleEndian>(bytes.len() as u16);
        } else {
            self.write_control(tag, TYPE_UTF8_L1)?;
            self.ensure(1 + bytes.len())?;
            self.data.push(bytes.len() as u8);
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_octetstring(&mut self, tag: TlvTag, value: &[u8]) -> Result<()> {
        if value.len() > 0xffff {
            self.write_control(tag, TYPE_OCTET_STRING_L4)?;
            self.ensure(4 + value.len())?;
            let _ = self.data.write_u32::<LittleEndian>(value.len() as u32);
        } else if value.len() > 0xff {
            self.write_control(tag, TYPE_OCTET_STRING_L2)?;
            self.ensure(2 + value.len())?;
            let _ = self.data.write_u16::<LittleEndian>(value.len() as u16);
        } else {
            self.write_control(tag, TYPE_OCTET_STRING_L1)?;
            self.ensure(1 + value.len())?;
            self.data.push(value.len() as u8);
        }
        self.data.extend_from_slice(value);
        Ok(())
    }

    pub fn start_container(&mut self, tag: TlvTag, kind: ContainerKind) -> Result<ContainerToken> {
        let typ = match kind {
            ContainerKind::Structure => TYPE_STRUCT,
            ContainerKind::Array => TYPE_ARRAY,
        };
        self.write_control(tag, typ)?;
        self.depth += 1;
        Ok(ContainerToken { depth: self.depth })
    }

    pub fn end_container(&mut self, token: ContainerToken) -> Result<()> {
        if token.depth != self.depth {
            return Err(CodecError::InvalidContainerNesting);
        }
        self.ensure(1)?;
        self.data.push(TYPE_END_CONTAINER);
        self.depth -= 1;
        Ok(())
    }

    /// Write a value tree under `tag`. `List` values are never produced on
    /// the wire by this library and are rejected here.
    pub fn write(&mut self, tag: TlvTag, value: &TlvValue) -> Result<()> {
        match value {
            TlvValue::UnsignedInt(v) => self.write_uint(tag, *v),
            TlvValue::SignedInt(v) => self.write_int(tag, *v),
            TlvValue::Float(v) => self.write_f32(tag, *v),
            TlvValue::Double(v) => self.write_f64(tag, *v),
            TlvValue::Bool(v) => self.write_bool(tag, *v),
            TlvValue::Utf8(v) => self.write_string(tag, v),
            TlvValue::Bytes(v) => self.write_octetstring(tag, v),
            TlvValue::Null => self.write_null(tag),
            TlvValue::Structure(fields) => {
                let token = self.start_container(tag, ContainerKind::Structure)?;
                for (t, v) in fields {
                    self.write(*t, v)?;
                }
                self.end_container(token)
            }
            TlvValue::Array(members) => {
                let token = self.start_container(tag, ContainerKind::Array)?;
                for v in members {
                    self.write(TlvTag::Anonymous, v)?;
                }
                self.end_container(token)
            }
            TlvValue::List(_) => Err(CodecError::WrongType),
        }
    }

    /// Returns the encoded bytes. Fails if any container is still open.
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.depth != 0 {
            return Err(CodecError::InvalidContainerNesting);
        }
        Ok(self.data)
    }
}

impl Default for TlvWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Element header returned by [TlvReader::next].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub tag: TlvTag,
    pub typ: ElementType,
}

#[derive(Clone, Copy)]
struct Current {
    typ: u8,
    consumed: bool,
}

/// Lazy forward-only cursor over a TLV buffer. `next` advances to the
/// following element header without consuming its value; a value left
/// unfetched is skipped implicitly. Re-create the reader to restart.
pub struct TlvReader<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
    current: Option<Current>,
}

impl<'a> TlvReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
            current: None,
        }
    }

    /// Byte offset of the cursor. Between elements this is the start of
    /// the next control byte, which lets callers slice raw element spans.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(CodecError::UnexpectedEndOfInput);
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_tag(&mut self, tagctrl: u8) -> Result<TlvTag> {
        match tagctrl {
            TAGCTRL_ANONYMOUS => Ok(TlvTag::Anonymous),
            TAGCTRL_CONTEXT => Ok(TlvTag::Context(self.take_u8()?)),
            TAGCTRL_COMMON_2 => {
                let mut c = self.take(2)?;
                let t = c
                    .read_u16::<LittleEndian>()
                    .map_err(|_| CodecError::UnexpectedEndOfInput)?;
                Ok(TlvTag::CommonProfile(t as u32))
            }
            TAGCTRL_COMMON_4 => {
                let mut c = self.take(4)?;
                let t = c
                    .read_u32::<LittleEndian>()
                    .map_err(|_| CodecError::UnexpectedEndOfInput)?;
                Ok(TlvTag::CommonProfile(t))
            }
            TAGCTRL_FULL_6 | TAGCTRL_FULL_8 => {
                let mut c = self.take(4)?;
                let vendor = c
                    .read_u16::<LittleEndian>()
                    .map_err(|_| CodecError::UnexpectedEndOfInput)?;
                let profile = c
                    .read_u16::<LittleEndian>()
                    .map_err(|_| CodecError::UnexpectedEndOfInput)?;
                let tag = if tagctrl == TAGCTRL_FULL_6 {
                    let mut t = self.take(2)?;
                    t.read_u16::<LittleEndian>()
                        .map_err(|_| CodecError::UnexpectedEndOfInput)? as u32
                } else {
                    let mut t = self.take(4)?;
                    t.read_u32::<LittleEndian>()
                        .map_err(|_| CodecError::UnexpectedEndOfInput)?
                };
                Ok(TlvTag::FullyQualified {
                    vendor,
                    profile,
                    tag,
                })
            }
            _ => Err(CodecError::InvalidTag),
        }
    }

    fn length(&mut self, width: usize) -> Result<usize> {
        let mut c = self.take(width)?;
        let len = c
            .read_uint::<LittleEndian>(width)
            .map_err(|_| CodecError::UnexpectedEndOfInput)?;
        Ok(len as usize)
    }

    fn value_size(typ: u8) -> Option<usize> {
        match typ {
            TYPE_INT_1 | TYPE_UINT_1 => Some(1),
            TYPE_INT_2 | TYPE_UINT_2 => Some(2),
            TYPE_INT_4 | TYPE_UINT_4 | TYPE_FLOAT_4 => Some(4),
            TYPE_INT_8 | TYPE_UINT_8 | TYPE_FLOAT_8 => Some(8),
            TYPE_BOOL_FALSE | TYPE_BOOL_TRUE | TYPE_NULL => Some(0),
            _ => None,
        }
    }

    fn skip_value(&mut self, typ: u8) -> Result<()> {
        if let Some(n) = Self::value_size(typ) {
            self.take(n)?;
            return Ok(());
        }
        match typ {
            TYPE_UTF8_L1 | TYPE_OCTET_STRING_L1 => {
                let len = self.length(1)?;
                self.take(len)?;
            }
            TYPE_UTF8_L2 | TYPE_OCTET_STRING_L2 => {
                let len = self.length(2)?;
                self.take(len)?;
            }
            TYPE_UTF8_L4 | TYPE_OCTET_STRING_L4 => {
                let len = self.length(4)?;
                self.take(len)?;
            }
            TYPE_STRUCT | TYPE_ARRAY | TYPE_LIST => {
                // skip the whole subtree, including nested containers
                let mut nest = 1usize;
                while nest > 0 {
                    let fb = self.take_u8()?;
                    let typ = fb & 0x1f;
                    if typ == TYPE_END_CONTAINER {
                        nest -= 1;
                        continue;
                    }
                    self.read_tag(fb >> 5)?;
                    match typ {
                        TYPE_STRUCT | TYPE_ARRAY | TYPE_LIST => nest += 1,
                        _ => self.skip_value(typ)?,
                    }
                }
            }
            _ => return Err(CodecError::WrongType),
        }
        Ok(())
    }

    /// Discard the current element's value without decoding it. Callers
    /// that slice raw spans via [`TlvReader::position`] use this to keep
    /// the cursor on element boundaries.
    pub fn skip(&mut self) -> Result<()> {
        self.skip_pending()
    }

    fn skip_pending(&mut self) -> Result<()> {
        if let Some(cur) = self.current.take() {
            if !cur.consumed {
                self.skip_value(cur.typ)?;
            }
        }
        Ok(())
    }

    /// Advance to the next element in the current container. Returns
    /// `Ok(None)` at the container's end (or end of input at top level).
    pub fn next(&mut self) -> Result<Option<Element>> {
        self.skip_pending()?;
        if self.depth == 0 && self.pos >= self.data.len() {
            return Ok(None);
        }
        let fb = self.take_u8()?;
        let typ = fb & 0x1f;
        if typ == TYPE_END_CONTAINER {
            if self.depth == 0 {
                return Err(CodecError::InvalidContainerNesting);
            }
            // stay positioned on the terminator for exit_container
            self.pos -= 1;
            return Ok(None);
        }
        let tag = self.read_tag(fb >> 5)?;
        let kind = match typ {
            TYPE_INT_1 | TYPE_INT_2 | TYPE_INT_4 | TYPE_INT_8 => ElementType::SignedInt,
            TYPE_UINT_1 | TYPE_UINT_2 | TYPE_UINT_4 | TYPE_UINT_8 => ElementType::UnsignedInt,
            TYPE_BOOL_FALSE | TYPE_BOOL_TRUE => ElementType::Bool,
            TYPE_FLOAT_4 => ElementType::Float,
            TYPE_FLOAT_8 => ElementType::Double,
            TYPE_UTF8_L1 | TYPE_UTF8_L2 | TYPE_UTF8_L4 => ElementType::Utf8,
            TYPE_OCTET_STRING_L1 | TYPE_OCTET_STRING_L2 | TYPE_OCTET_STRING_L4 => {
                ElementType::Bytes
            }
            TYPE_NULL => ElementType::Null,
            TYPE_STRUCT => ElementType::Structure,
            TYPE_ARRAY => ElementType::Array,
            TYPE_LIST => ElementType::List,
            _ => return Err(CodecError::WrongType),
        };
        self.current = Some(Current {
            typ,
            consumed: false,
        });
        Ok(Some(Element { tag, typ: kind }))
    }

    fn consume(&mut self) -> Result<u8> {
        match self.current.as_mut() {
            Some(cur) if !cur.consumed => {
                cur.consumed = true;
                Ok(cur.typ)
            }
            _ => Err(CodecError::WrongType),
        }
    }

    /// Unsigned integer in canonical widest form regardless of wire width.
    pub fn get_uint(&mut self) -> Result<u64> {
        let typ = self.consume()?;
        let width = match typ {
            TYPE_UINT_1 => 1,
            TYPE_UINT_2 => 2,
            TYPE_UINT_4 => 4,
            TYPE_UINT_8 => 8,
            _ => return Err(CodecError::WrongType),
        };
        let mut c = self.take(width)?;
        c.read_uint::<LittleEndian>(width)
            .map_err(|_| CodecError::UnexpectedEndOfInput)
    }

    pub fn get_int(&mut self) -> Result<i64> {
        let typ = self.consume()?;
        let width = match typ {
            TYPE_INT_1 => 1,
            TYPE_INT_2 => 2,
            TYPE_INT_4 => 4,
            TYPE_INT_8 => 8,
            _ => return Err(CodecError::WrongType),
        };
        let mut c = self.take(width)?;
        c.read_int::<LittleEndian>(width)
            .map_err(|_| CodecError::UnexpectedEndOfInput)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        u8::try_from(self.get_uint()?).map_err(|_| CodecError::WrongType)
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        u16::try_from(self.get_uint()?).map_err(|_| CodecError::WrongType)
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        u32::try_from(self.get_uint()?).map_err(|_| CodecError::WrongType)
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        match self.consume()? {
            TYPE_BOOL_FALSE => Ok(false),
            TYPE_BOOL_TRUE => Ok(true),
            _ => Err(CodecError::WrongType),
        }
    }

    pub fn get_f32(&mut self) -> Result<f32> {
        match self.consume()? {
            TYPE_FLOAT_4 => {
                let mut c = self.take(4)?;
                c.read_f32::<LittleEndian>()
                    .map_err(|_| CodecError::UnexpectedEndOfInput)
            }
            _ => Err(CodecError::WrongType),
        }
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        match self.consume()? {
            TYPE_FLOAT_8 => {
                let mut c = self.take(8)?;
                c.read_f64::<LittleEndian>()
                    .map_err(|_| CodecError::UnexpectedEndOfInput)
            }
            _ => Err(CodecError::WrongType),
        }
    }

    pub fn get_null(&mut self) -> Result<()> {
        match self.consume()? {
            TYPE_NULL => Ok(()),
            _ => Err(CodecError::WrongType),
        }
    }

    pub fn get_octetstring(&mut self) -> Result<&'a [u8]> {
        let typ = self.consume()?;
        let len = match typ {
            TYPE_OCTET_STRING_L1 => self.length(1)?,
            TYPE_OCTET_STRING_L2 => self.length(2)?,
            TYPE_OCTET_STRING_L4 => self.length(4)?,
            _ => return Err(CodecError::WrongType),
        };
        self.take(len)
    }

    pub fn get_string(&mut self) -> Result<&'a str> {
        let typ = self.consume()?;
        let len = match typ {
            TYPE_UTF8_L1 => self.length(1)?,
            TYPE_UTF8_L2 => self.length(2)?,
            TYPE_UTF8_L4 => self.length(4)?,
            _ => return Err(CodecError::WrongType),
        };
        std::str::from_utf8(self.take(len)?).map_err(|_| CodecError::WrongType)
    }

    /// Step into the current container element; subsequent `next` calls
    /// iterate its members.
    pub fn enter_container(&mut self) -> Result<()> {
        let typ = self.consume()?;
        match typ {
            TYPE_STRUCT | TYPE_ARRAY | TYPE_LIST => {
                self.depth += 1;
                Ok(())
            }
            _ => Err(CodecError::WrongType),
        }
    }

    /// Leave the container entered last, skipping any unread members.
    pub fn exit_container(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(CodecError::InvalidContainerNesting);
        }
        while self.next()?.is_some() {}
        // consume the terminator next() stopped on
        let fb = self.take_u8()?;
        if fb & 0x1f != TYPE_END_CONTAINER {
            return Err(CodecError::InvalidContainerNesting);
        }
        self.depth -= 1;
        Ok(())
    }

    /// Read the mandatory anonymous top-level structure header and step
    /// into it. Any other top-level shape is a format error.
    pub fn open_message(&mut self) -> Result<()> {
        let elem = self.next()?.ok_or(CodecError::UnexpectedEndOfInput)?;
        if elem.tag != TlvTag::Anonymous {
            return Err(CodecError::InvalidTag);
        }
        if elem.typ != ElementType::Structure {
            return Err(CodecError::WrongType);
        }
        self.enter_container()
    }
}

/// Owned decoded value tree. Unsigned/signed integers are canonical u64/i64
/// no matter the wire width; floats keep their written precision.
#[derive(Debug, Clone, PartialEq)]
pub enum TlvValue {
    UnsignedInt(u64),
    SignedInt(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Utf8(String),
    Bytes(Vec<u8>),
    Null,
    Structure(Vec<(TlvTag, TlvValue)>),
    Array(Vec<TlvValue>),
    /// Accepted on decode for forward compatibility; never encoded.
    List(Vec<(TlvTag, TlvValue)>),
}

impl TlvValue {
    /// Encode a top-level message. The value must be a structure; it is
    /// emitted with the anonymous tag per the message framing rule.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            TlvValue::Structure(_) => {}
            _ => return Err(CodecError::WrongType),
        }
        let mut w = TlvWriter::new();
        w.write(TlvTag::Anonymous, self)?;
        w.finish()
    }

    /// Decode a top-level message: exactly one anonymous-tagged structure.
    pub fn decode(data: &[u8]) -> Result<TlvValue> {
        let mut r = TlvReader::new(data);
        r.open_message()?;
        let fields = Self::decode_members(&mut r)?;
        r.exit_container()?;
        if r.next()?.is_some() {
            return Err(CodecError::InvalidTag);
        }
        Ok(TlvValue::Structure(fields))
    }

    fn decode_members(r: &mut TlvReader) -> Result<Vec<(TlvTag, TlvValue)>> {
        let mut out = Vec::new();
        while let Some(elem) = r.next()? {
            let value = Self::decode_value(r, elem.typ)?;
            out.push((elem.tag, value));
        }
        Ok(out)
    }

    fn decode_value(r: &mut TlvReader, typ: ElementType) -> Result<TlvValue> {
        Ok(match typ {
            ElementType::UnsignedInt => TlvValue::UnsignedInt(r.get_uint()?),
            ElementType::SignedInt => TlvValue::SignedInt(r.get_int()?),
            ElementType::Float => TlvValue::Float(r.get_f32()?),
            ElementType::Double => TlvValue::Double(r.get_f64()?),
            ElementType::Bool => TlvValue::Bool(r.get_bool()?),
            ElementType::Utf8 => TlvValue::Utf8(r.get_string()?.to_owned()),
            ElementType::Bytes => TlvValue::Bytes(r.get_octetstring()?.to_vec()),
            ElementType::Null => {
                r.get_null()?;
                TlvValue::Null
            }
            ElementType::Structure => {
                r.enter_container()?;
                let fields = Self::decode_members(r)?;
                r.exit_container()?;
                TlvValue::Structure(fields)
            }
            ElementType::Array => {
                r.enter_container()?;
                let mut members = Vec::new();
                while let Some(elem) = r.next()? {
                    if elem.tag != TlvTag::Anonymous {
                        return Err(CodecError::InvalidTag);
                    }
                    members.push(Self::decode_value(r, elem.typ)?);
                }
                r.exit_container()?;
                TlvValue::Array(members)
            }
            ElementType::List => {
                r.enter_container()?;
                let fields = Self::decode_members(r)?;
                r.exit_container()?;
                TlvValue::List(fields)
            }
        })
    }
}

impl std::fmt::Display for TlvTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlvTag::Anonymous => write!(f, "_"),
            TlvTag::Context(t) => write!(f, "{}", t),
            TlvTag::CommonProfile(t) => write!(f, "common:{}", t),
            TlvTag::FullyQualified {
                vendor,
                profile,
                tag,
            } => write!(f, "{}:{}:{}", vendor, profile, tag),
        }
    }
}

impl std::fmt::Display for TlvValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlvValue::UnsignedInt(v) => write!(f, "{}", v),
            TlvValue::SignedInt(v) => write!(f, "{}", v),
            TlvValue::Float(v) => write!(f, "{}f32", v),
            TlvValue::Double(v) => write!(f, "{}f64", v),
            TlvValue::Bool(v) => write!(f, "{}", v),
            TlvValue::Utf8(v) => write!(f, "{:?}", v),
            TlvValue::Bytes(v) => write!(f, "h'{}'", hex::encode(v)),
            TlvValue::Null => write!(f, "null"),
            TlvValue::Structure(fields) => {
                write!(f, "{{")?;
                for (i, (t, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", t, v)?;
                }
                write!(f, "}}")
            }
            TlvValue::Array(members) => {
                write!(f, "[")?;
                for (i, v) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            TlvValue::List(fields) => {
                write!(f, "[[")?;
                for (i, (t, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", t, v)?;
                }
                write!(f, "]]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: TlvValue) {
        let enc = v.encode().unwrap();
        let dec = TlvValue::decode(&enc).unwrap();
        assert_eq!(dec, v);
        assert_eq!(dec.to_string(), v.to_string());
    }

    #[test]
    fn test_int_boundaries() {
        let fields = vec![
            (TlvTag::Context(0), TlvValue::SignedInt(i8::MIN as i64)),
            (TlvTag::Context(1), TlvValue::SignedInt(i8::MAX as i64)),
            (TlvTag::Context(2), TlvValue::SignedInt(i16::MIN as i64)),
            (TlvTag::Context(3), TlvValue::SignedInt(i16::MAX as i64)),
            (TlvTag::Context(4), TlvValue::SignedInt(i32::MIN as i64)),
            (TlvTag::Context(5), TlvValue::SignedInt(i32::MAX as i64)),
            (TlvTag::Context(6), TlvValue::SignedInt(i64::MIN)),
            (TlvTag::Context(7), TlvValue::SignedInt(i64::MAX)),
            (TlvTag::Context(8), TlvValue::UnsignedInt(0)),
            (TlvTag::Context(9), TlvValue::UnsignedInt(0xff)),
            (TlvTag::Context(10), TlvValue::UnsignedInt(0x100)),
            (TlvTag::Context(11), TlvValue::UnsignedInt(0xffff)),
            (TlvTag::Context(12), TlvValue::UnsignedInt(0x10000)),
            (TlvTag::Context(13), TlvValue::UnsignedInt(0xffff_ffff)),
            (TlvTag::Context(14), TlvValue::UnsignedInt(u64::MAX)),
        ];
        roundtrip(TlvValue::Structure(fields));
    }

    #[test]
    fn test_mixed_types() {
        roundtrip(TlvValue::Structure(vec![
            (TlvTag::Context(0), TlvValue::Bool(true)),
            (TlvTag::Context(1), TlvValue::Bool(false)),
            (TlvTag::Context(2), TlvValue::Utf8("žluťoučký".to_owned())),
            (TlvTag::Context(3), TlvValue::Bytes(vec![1, 2, 3])),
            (TlvTag::Context(4), TlvValue::Null),
            (TlvTag::Context(5), TlvValue::Float(1.5)),
            (TlvTag::Context(6), TlvValue::Double(-0.25)),
            (TlvTag::Context(7), TlvValue::Bytes(vec![0xab; 300])),
            (TlvTag::Context(8), TlvValue::Utf8(String::new())),
        ]));
    }

    #[test]
    fn test_wide_length_strings_roundtrip() {
        // lengths past u16 take the 4-byte length form; the declared
        // length must match the bytes that follow
        let v = TlvValue::Structure(vec![
            (TlvTag::Context(1), TlvValue::Bytes(vec![0xab; 70_000])),
            (TlvTag::Context(2), TlvValue::Utf8("x".repeat(70_000))),
        ]);
        let enc = v.encode().unwrap();
        assert_eq!(&enc[1..7], &[0x32, 0x01, 0x70, 0x11, 0x01, 0x00]);
        assert_eq!(TlvValue::decode(&enc).unwrap(), v);
    }

    #[test]
    fn test_nested_containers() {
        roundtrip(TlvValue::Structure(vec![
            (TlvTag::Context(1), TlvValue::Structure(vec![])),
            (TlvTag::Context(2), TlvValue::Array(vec![])),
            (
                TlvTag::Context(3),
                TlvValue::Structure(vec![
                    (
                        TlvTag::Context(1),
                        TlvValue::Array(vec![
                            TlvValue::UnsignedInt(1),
                            TlvValue::UnsignedInt(2),
                            TlvValue::Structure(vec![(
                                TlvTag::Context(9),
                                TlvValue::Utf8("deep".to_owned()),
                            )]),
                        ]),
                    ),
                    (TlvTag::CommonProfile(0x10001), TlvValue::SignedInt(-42)),
                    (
                        TlvTag::FullyQualified {
                            vendor: 0xfff1,
                            profile: 0xdeed,
                            tag: 7,
                        },
                        TlvValue::Bool(true),
                    ),
                ]),
            ),
        ]));
    }

    #[test]
    fn test_fixed_encodings() {
        // int8 42 at context tag 2 inside the top-level structure
        let enc = TlvValue::Structure(vec![(TlvTag::Context(2), TlvValue::SignedInt(42))])
            .encode()
            .unwrap();
        assert_eq!(enc, [0x15, 0x20, 0x02, 0x2a, 0x18]);
        // empty top-level structure is exactly open+close
        let enc = TlvValue::Structure(vec![]).encode().unwrap();
        assert_eq!(enc, [0x15, 0x18]);
    }

    #[test]
    fn test_top_level_must_be_anon_struct() {
        // top-level array
        let mut w = TlvWriter::new();
        let t = w
            .start_container(TlvTag::Anonymous, ContainerKind::Array)
            .unwrap();
        w.end_container(t).unwrap();
        let data = w.finish().unwrap();
        assert_eq!(TlvValue::decode(&data), Err(CodecError::WrongType));

        // context-tagged top-level structure
        let mut w = TlvWriter::new();
        let t = w
            .start_container(TlvTag::Context(1), ContainerKind::Structure)
            .unwrap();
        w.end_container(t).unwrap();
        let data = w.finish().unwrap();
        assert_eq!(TlvValue::decode(&data), Err(CodecError::InvalidTag));

        // non-container top level
        let mut w = TlvWriter::new();
        w.write_uint(TlvTag::Anonymous, 1).unwrap();
        let data = w.finish().unwrap();
        assert_eq!(TlvValue::decode(&data), Err(CodecError::WrongType));
    }

    #[test]
    fn test_writer_nesting_checks() {
        let mut w = TlvWriter::new();
        let outer = w
            .start_container(TlvTag::Anonymous, ContainerKind::Structure)
            .unwrap();
        let _inner = w
            .start_container(TlvTag::Context(1), ContainerKind::Structure)
            .unwrap();
        // closing the outer container before the inner one is rejected
        assert_eq!(
            w.end_container(outer),
            Err(CodecError::InvalidContainerNesting)
        );

        let mut w = TlvWriter::new();
        let _open = w
            .start_container(TlvTag::Anonymous, ContainerKind::Structure)
            .unwrap();
        assert_eq!(w.finish(), Err(CodecError::InvalidContainerNesting));
    }

    #[test]
    fn test_writer_limit() {
        let mut w = TlvWriter::with_limit(4);
        let _t = w
            .start_container(TlvTag::Anonymous, ContainerKind::Structure)
            .unwrap();
        assert_eq!(
            w.write_octetstring(TlvTag::Context(1), &[0; 16]),
            Err(CodecError::BufferTooSmall)
        );
    }

    #[test]
    fn test_reader_lazy_skip() {
        // unfetched values (including containers) are skipped on next()
        let v = TlvValue::Structure(vec![
            (TlvTag::Context(1), TlvValue::UnsignedInt(7)),
            (
                TlvTag::Context(2),
                TlvValue::Structure(vec![(TlvTag::Context(0), TlvValue::Bytes(vec![9; 40]))]),
            ),
            (TlvTag::Context(3), TlvValue::Utf8("after".to_owned())),
        ]);
        let data = v.encode().unwrap();
        let mut r = TlvReader::new(&data);
        r.open_message().unwrap();
        let e = r.next().unwrap().unwrap();
        assert_eq!(e.tag, TlvTag::Context(1));
        // skip both the uint and the nested struct without touching them
        let e = r.next().unwrap().unwrap();
        assert_eq!(e.tag, TlvTag::Context(2));
        let e = r.next().unwrap().unwrap();
        assert_eq!(e.tag, TlvTag::Context(3));
        assert_eq!(r.get_string().unwrap(), "after");
        assert!(r.next().unwrap().is_none());
    }

    #[test]
    fn test_reader_list_skippable() {
        // hand-built buffer with a list member: accepted and skippable
        let mut data = vec![0x15];
        data.push((1 << 5) | TYPE_LIST);
        data.push(5); // tag
        data.extend_from_slice(&[0x24, 0x01, 0x07, 0x18]); // uint tag1=7, end
        data.push((1 << 5) | TYPE_UINT_1);
        data.extend_from_slice(&[6, 99]);
        data.push(0x18);
        let mut r = TlvReader::new(&data);
        r.open_message().unwrap();
        let e = r.next().unwrap().unwrap();
        assert_eq!(e.typ, ElementType::List);
        let e = r.next().unwrap().unwrap();
        assert_eq!(e.tag, TlvTag::Context(6));
        assert_eq!(r.get_uint().unwrap(), 99);
    }

    #[test]
    fn test_truncated_input() {
        let v = TlvValue::Structure(vec![(TlvTag::Context(1), TlvValue::Bytes(vec![1; 32]))]);
        let data = v.encode().unwrap();
        for cut in 1..data.len() {
            // never panics, always a clean error
            assert!(TlvValue::decode(&data[..cut]).is_err());
        }
    }

    #[test]
    fn test_float_precision_preserved() {
        let v = TlvValue::Structure(vec![
            (TlvTag::Context(1), TlvValue::Float(std::f32::consts::PI)),
            (TlvTag::Context(2), TlvValue::Double(std::f64::consts::PI)),
        ]);
        let dec = TlvValue::decode(&v.encode().unwrap()).unwrap();
        match &dec {
            TlvValue::Structure(fields) => {
                assert!(matches!(fields[0].1, TlvValue::Float(_)));
                assert!(matches!(fields[1].1, TlvValue::Double(_)));
            }
            _ => panic!("expected structure"),
        }
        assert_eq!(dec, v);
    }
}
