//! Program representation and the binary image format.
//!
//! A program is the shared word stream plus the tables that point into it:
//! variable declarations, per-kind actor entry offsets and per-event
//! handler offsets. Binary images (`.avm`) are laid out little-endian:
//! ```text
//! "AVM1"
//! u32 var_count    { u8 scope, u8 flags, i32 default, u16 name_len, name }
//! u32 actor_count  { i32 kind, i32 tick, i32 load }     (-1 = none)
//! u32 event_count  { i32 event, i32 offset }
//! u32 code_len     { i32 word }
//! [u8; 32]         blake3 digest of everything above
//! ```

use std::collections::BTreeMap;

use crate::error::{DecodeError, EncodeError};
use crate::var::{Scope, VarDecl};

/// Magic bytes at the start of every image.
pub const MAGIC: &[u8; 4] = b"AVM1";

/// Longest variable name an image can hold, in bytes.
pub const MAX_NAME_LEN: usize = u16::MAX as usize;

const DIGEST_LEN: usize = 32;

/// Entry offsets of one actor kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActorScripts {
    /// Script run once per simulation tick.
    pub tick: Option<usize>,
    /// Script run once when an entity of this kind is materialized.
    pub load: Option<usize>,
}

/// A compiled behavior program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    /// The instruction stream, data records included.
    pub code: Vec<i32>,
    /// Variable declarations. A variable's id is its index here.
    pub vars: Vec<VarDecl>,
    /// Scripts keyed by actor kind.
    pub actors: BTreeMap<i32, ActorScripts>,
    /// Event handler offsets keyed by event id.
    pub events: BTreeMap<i32, usize>,
}

impl Program {
    /// Create a program with a bare instruction stream and no tables.
    pub fn new(code: Vec<i32>) -> Self {
        Self {
            code,
            ..Self::default()
        }
    }

    /// Number of words in the stream.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Returns true if the stream is empty.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn actor(&self, kind: i32) -> Option<&ActorScripts> {
        self.actors.get(&kind)
    }

    pub fn event(&self, id: i32) -> Option<usize> {
        self.events.get(&id).copied()
    }

    /// Id of the variable declared under `name`.
    pub fn var_id(&self, name: &str) -> Option<usize> {
        self.vars.iter().position(|v| v.name == name)
    }

    /// Every offset a host can start a frame at, sorted and deduplicated.
    pub fn entry_points(&self) -> Vec<usize> {
        let mut roots: Vec<usize> = self
            .actors
            .values()
            .flat_map(|a| [a.tick, a.load])
            .flatten()
            .chain(self.events.values().copied())
            .collect();
        roots.sort_unstable();
        roots.dedup();
        roots
    }

    /// Encode the program to a binary image.
    ///
    /// Fails when a name, count or offset does not fit its field, so every
    /// image this returns decodes back to the same program.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::with_capacity(64 + self.code.len() * 4);
        out.extend_from_slice(MAGIC);

        put_count(&mut out, "variable", self.vars.len())?;
        for (index, var) in self.vars.iter().enumerate() {
            out.push(var.scope as u8);
            out.push(var.flags());
            out.extend_from_slice(&var.default.to_le_bytes());
            let name = var.name.as_bytes();
            let len = u16::try_from(name.len()).map_err(|_| EncodeError::NameTooLong {
                index,
                len: name.len(),
            })?;
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(name);
        }

        put_count(&mut out, "actor", self.actors.len())?;
        for (kind, scripts) in &self.actors {
            out.extend_from_slice(&kind.to_le_bytes());
            put_offset(&mut out, scripts.tick)?;
            put_offset(&mut out, scripts.load)?;
        }

        put_count(&mut out, "event", self.events.len())?;
        for (event, offset) in &self.events {
            out.extend_from_slice(&event.to_le_bytes());
            put_offset(&mut out, Some(*offset))?;
        }

        put_count(&mut out, "code", self.code.len())?;
        for word in &self.code {
            out.extend_from_slice(&word.to_le_bytes());
        }

        let digest = blake3::hash(&out);
        out.extend_from_slice(digest.as_bytes());
        Ok(out)
    }

    /// Decode a binary image, verifying its digest.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() >= MAGIC.len() && &bytes[..MAGIC.len()] != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        if bytes.len() < MAGIC.len() + DIGEST_LEN {
            return Err(DecodeError::UnexpectedEof { at: bytes.len() });
        }

        let (body, digest) = bytes.split_at(bytes.len() - DIGEST_LEN);
        if blake3::hash(body).as_bytes() != digest {
            return Err(DecodeError::ChecksumMismatch);
        }

        let mut r = Reader {
            bytes: body,
            pos: MAGIC.len(),
        };

        let var_count = r.u32()?;
        let mut vars = Vec::new();
        for _ in 0..var_count {
            let scope = Scope::try_from(r.u8()?)?;
            let flags = r.u8()?;
            let default = r.i32()?;
            let name_len = r.u16()? as usize;
            let name_at = r.pos;
            let name = std::str::from_utf8(r.take(name_len)?)
                .map_err(|_| DecodeError::InvalidUtf8 { at: name_at })?;
            vars.push(VarDecl::new(name, scope, default).with_flags(flags)?);
        }

        let actor_count = r.u32()?;
        let mut actors = BTreeMap::new();
        for _ in 0..actor_count {
            let kind = r.i32()?;
            let tick = r.offset()?;
            let load = r.offset()?;
            if actors.insert(kind, ActorScripts { tick, load }).is_some() {
                return Err(DecodeError::DuplicateKey {
                    table: "actor",
                    key: kind,
                });
            }
        }

        let event_count = r.u32()?;
        let mut events = BTreeMap::new();
        for _ in 0..event_count {
            let event = r.i32()?;
            let at = r.pos;
            match r.offset()? {
                Some(offset) => {
                    if events.insert(event, offset).is_some() {
                        return Err(DecodeError::DuplicateKey {
                            table: "event",
                            key: event,
                        });
                    }
                }
                None => return Err(DecodeError::InvalidOffset { at, value: -1 }),
            }
        }

        let code_len = r.u32()?;
        let mut code = Vec::new();
        for _ in 0..code_len {
            code.push(r.i32()?);
        }

        if r.pos != body.len() {
            return Err(DecodeError::TrailingBytes {
                count: body.len() - r.pos,
            });
        }

        Ok(Self {
            code,
            vars,
            actors,
            events,
        })
    }

    /// Hex blake3 digest of the encoded image.
    pub fn digest(&self) -> Result<String, EncodeError> {
        Ok(blake3::hash(&self.encode()?).to_hex().to_string())
    }
}

fn put_count(out: &mut Vec<u8>, section: &'static str, len: usize) -> Result<(), EncodeError> {
    let count = u32::try_from(len).map_err(|_| EncodeError::SectionTooLarge { section, len })?;
    out.extend_from_slice(&count.to_le_bytes());
    Ok(())
}

fn put_offset(out: &mut Vec<u8>, offset: Option<usize>) -> Result<(), EncodeError> {
    let word = match offset {
        None => -1,
        Some(offset) => i32::try_from(offset).map_err(|_| EncodeError::OffsetTooLarge { offset })?,
    };
    out.extend_from_slice(&word.to_le_bytes());
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(DecodeError::UnexpectedEof { at: self.pos })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn offset(&mut self) -> Result<Option<usize>, DecodeError> {
        let at = self.pos;
        match self.i32()? {
            -1 => Ok(None),
            value if value < 0 => Err(DecodeError::InvalidOffset { at, value }),
            value => Ok(Some(value as usize)),
        }
    }
}
