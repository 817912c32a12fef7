//! Save files: a complete, byte-exact snapshot of a [`World`].
//!
//! Layout: a 14-byte header (magic, version, CRC32 of the compressed
//! payload, payload length, all little-endian) followed by a zstd-compressed
//! payload. The payload holds the clock, a handler id/name table, a bincode
//! block with story flags, letters, subscriptions and the running cut-scene,
//! then one fixed-layout record per actor.
//!
//! Loading validates everything before a single actor is built, and never
//! delivers START: restored routines carry on at their next TICK.

use crate::actor::{Actor, ActorStatus, Memory, Position};
use crate::error::CorruptSave;
use crate::frame::{Frame, Params};
use crate::registry::HandlerRegistry;
use crate::stack::CallStack;
use crate::world::{Clock, Cutscene, Letter, StoryFlag, Subscription, World};
use couchette_core::{
    ActorId, ContinuationTag, HandlerId, Signal, SimTick, Token, MAX_DEPTH, MEMORY_SLOTS,
    PARAM_SLOTS,
};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Magic number identifying a save ("CCHT").
pub const SAVE_MAGIC: u32 = 0x4343_4854;

/// Current save format version.
pub const SAVE_VERSION: u16 = 1;

const HEADER_LEN: usize = 14;
const ZSTD_LEVEL: i32 = 3;

/// Errors raised while writing or reading save files.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The save is unusable.
    #[error(transparent)]
    Corrupt(#[from] CorruptSave),
    /// The file could not be read or written.
    #[error("save I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The world could not be encoded.
    #[error("failed to encode save: {0}")]
    Encode(String),
}

#[derive(Debug, Clone)]
struct SaveHeader {
    magic: u32,
    version: u16,
    crc32: u32,
    payload_len: u32,
}

impl SaveHeader {
    fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..10].copy_from_slice(&self.crc32.to_le_bytes());
        bytes[10..14].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CorruptSave> {
        let mut reader = Reader::new(bytes);
        let magic = reader.u32("header")?;
        if magic != SAVE_MAGIC {
            return Err(CorruptSave::BadMagic {
                expected: SAVE_MAGIC,
                found: magic,
            });
        }
        let version = reader.u16("header")?;
        if version != SAVE_VERSION {
            return Err(CorruptSave::UnsupportedVersion(version));
        }
        Ok(Self {
            magic,
            version,
            crc32: reader.u32("header")?,
            payload_len: reader.u32("header")?,
        })
    }
}

/// Everything world-level that is not an actor.
#[derive(Debug, Serialize, Deserialize)]
struct WorldRecord {
    story: Vec<(u16, i32)>,
    letters: Vec<LetterRecord>,
    subscriptions: Vec<SubscriptionRecord>,
    cutscene: Option<(u16, u16)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LetterRecord {
    sender: u16,
    recipient: u16,
    signal: u32,
    param: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct SubscriptionRecord {
    recipient: u16,
    signal: u32,
    slot: u8,
}

/// Encode `world` into save bytes.
pub fn to_bytes(world: &World, registry: &HandlerRegistry) -> Result<Vec<u8>, SaveError> {
    let payload = encode_payload(world, registry)?;
    let compressed = zstd::encode_all(&payload[..], ZSTD_LEVEL)?;

    let mut hasher = Hasher::new();
    hasher.update(&compressed);
    let payload_len = u32::try_from(compressed.len())
        .map_err(|_| SaveError::Encode("payload exceeds 4 GiB".into()))?;
    let header = SaveHeader {
        magic: SAVE_MAGIC,
        version: SAVE_VERSION,
        crc32: hasher.finalize(),
        payload_len,
    };

    let mut bytes = Vec::with_capacity(HEADER_LEN + compressed.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(&compressed);
    Ok(bytes)
}

/// Decode save bytes into a fresh world.
pub fn from_bytes(bytes: &[u8], registry: &HandlerRegistry) -> Result<World, CorruptSave> {
    if bytes.len() < HEADER_LEN {
        return Err(CorruptSave::Truncated("header"));
    }
    let header = SaveHeader::from_bytes(&bytes[..HEADER_LEN])?;
    let compressed = &bytes[HEADER_LEN..];
    match compressed.len().cmp(&(header.payload_len as usize)) {
        std::cmp::Ordering::Less => return Err(CorruptSave::Truncated("payload")),
        std::cmp::Ordering::Greater => {
            return Err(CorruptSave::Malformed("trailing bytes after payload".into()))
        }
        std::cmp::Ordering::Equal => {}
    }

    let mut hasher = Hasher::new();
    hasher.update(compressed);
    let found = hasher.finalize();
    if found != header.crc32 {
        return Err(CorruptSave::ChecksumMismatch {
            expected: header.crc32,
            found,
        });
    }

    let payload = zstd::decode_all(compressed)
        .map_err(|err| CorruptSave::Malformed(format!("decompression failed: {err}")))?;
    decode_payload(&payload, registry)
}

/// Replace `world` with the contents of `bytes`. On error `world` is left
/// exactly as it was. The journal setting of `world` is preserved.
pub fn restore_into(world: &mut World, bytes: &[u8], registry: &HandlerRegistry) -> Result<(), CorruptSave> {
    let mut loaded = from_bytes(bytes, registry)?;
    loaded.journal = world.journal.take();
    *world = loaded;
    Ok(())
}

/// Write a save file.
pub fn save_to_path(world: &World, registry: &HandlerRegistry, path: &Path) -> Result<(), SaveError> {
    let bytes = to_bytes(world, registry)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), tick = world.tick().0, "save written");
    Ok(())
}

/// Read a save file.
pub fn load_from_path(path: &Path, registry: &HandlerRegistry) -> Result<World, SaveError> {
    let bytes = fs::read(path)?;
    let world = from_bytes(&bytes, registry)?;
    info!(path = %path.display(), tick = world.tick().0, actors = world.actors.len(), "save loaded");
    Ok(world)
}

fn encode_payload(world: &World, registry: &HandlerRegistry) -> Result<Vec<u8>, SaveError> {
    let mut out = Vec::new();
    out.extend_from_slice(&world.clock.tick.0.to_le_bytes());
    out.extend_from_slice(&world.clock.game_time.to_le_bytes());
    out.extend_from_slice(&world.seed.to_le_bytes());

    let used: BTreeSet<HandlerId> = world
        .actors
        .values()
        .flat_map(|actor| actor.stack().frames().iter().map(|frame| frame.handler))
        .collect();
    put_len_u16(&mut out, used.len(), "handler table")?;
    for handler in used {
        let name = registry
            .name_of(handler)
            .ok_or_else(|| SaveError::Encode(format!("{handler} is not registered")))?;
        let len = u8::try_from(name.len())
            .map_err(|_| SaveError::Encode(format!("routine name `{name}` is too long")))?;
        out.extend_from_slice(&handler.0.to_le_bytes());
        out.push(len);
        out.extend_from_slice(name.as_bytes());
    }

    let record = WorldRecord {
        story: world.story.iter().map(|(flag, value)| (flag.0, *value)).collect(),
        letters: world
            .queue
            .iter()
            .map(|letter| LetterRecord {
                sender: letter.sender.0,
                recipient: letter.recipient.0,
                signal: letter.signal.code(),
                param: letter.param,
            })
            .collect(),
        subscriptions: world
            .subscriptions
            .iter()
            .map(|sub| SubscriptionRecord {
                recipient: sub.recipient.0,
                signal: sub.signal.code(),
                slot: sub.slot,
            })
            .collect(),
        cutscene: world.cutscene.map(|cutscene| (cutscene.id, cutscene.owner.0)),
    };
    let block = bincode::serialize(&record).map_err(|err| SaveError::Encode(err.to_string()))?;
    let block_len = u32::try_from(block.len())
        .map_err(|_| SaveError::Encode("world block exceeds 4 GiB".into()))?;
    out.extend_from_slice(&block_len.to_le_bytes());
    out.extend_from_slice(&block);

    put_len_u16(&mut out, world.actors.len(), "actor table")?;
    for actor in world.actors.values() {
        encode_actor(&mut out, actor);
    }
    Ok(out)
}

fn put_len_u16(out: &mut Vec<u8>, len: usize, what: &str) -> Result<(), SaveError> {
    let len = u16::try_from(len).map_err(|_| SaveError::Encode(format!("{what} too large")))?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

/// Per-actor record:
/// `id u16 | status u8 | car u16 | location u16 | offset u16 | token u8 |
/// memory [i32; 16] | depth u8 | (depth + 1) x { handler u16 | tag i32 | params [i32; 8] }`.
fn encode_actor(out: &mut Vec<u8>, actor: &Actor) {
    out.extend_from_slice(&actor.id().0.to_le_bytes());
    out.push(actor.status.bits());
    out.extend_from_slice(&actor.position.car.to_le_bytes());
    out.extend_from_slice(&actor.position.location.to_le_bytes());
    out.extend_from_slice(&actor.position.offset.to_le_bytes());
    out.push(Token::encode(actor.token));
    for word in actor.memory.words() {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.push(actor.depth());
    for frame in actor.stack().frames() {
        out.extend_from_slice(&frame.handler.0.to_le_bytes());
        out.extend_from_slice(&frame.tag.0.to_le_bytes());
        for word in frame.params.words() {
            out.extend_from_slice(&word.to_le_bytes());
        }
    }
}

fn decode_payload(payload: &[u8], registry: &HandlerRegistry) -> Result<World, CorruptSave> {
    let mut reader = Reader::new(payload);
    let tick = reader.u64("clock")?;
    let game_time = reader.i32("clock")?;
    let seed = reader.u64("clock")?;

    let mut table: BTreeMap<HandlerId, String> = BTreeMap::new();
    for _ in 0..reader.u16("handler table")? {
        let handler = HandlerId(reader.u16("handler table")?);
        let len = reader.u8("handler table")?;
        let name = std::str::from_utf8(reader.take(usize::from(len), "handler table")?)
            .map_err(|_| CorruptSave::Malformed(format!("{handler} name is not UTF-8")))?;
        // Unknown ids are reported against the first frame that uses them.
        if let Some(registered) = registry.name_of(handler) {
            if registered != name {
                return Err(CorruptSave::HandlerRenamed {
                    handler,
                    saved: name.to_owned(),
                    registered: registered.to_owned(),
                });
            }
        }
        table.insert(handler, name.to_owned());
    }

    let block_len = reader.u32("world block")? as usize;
    let record: WorldRecord = bincode::deserialize(reader.take(block_len, "world block")?)
        .map_err(|err| CorruptSave::Malformed(format!("world block: {err}")))?;

    let mut actors = BTreeMap::new();
    for _ in 0..reader.u16("actor table")? {
        let actor = decode_actor(&mut reader, registry, &table)?;
        let id = actor.id();
        if actors.insert(id, actor).is_some() {
            return Err(CorruptSave::DuplicateActor(id));
        }
    }
    if !reader.is_empty() {
        return Err(CorruptSave::Malformed("trailing bytes after actor table".into()));
    }

    let mut world = World::new(seed);
    world.clock = Clock {
        tick: SimTick(tick),
        game_time,
    };
    world.story = record
        .story
        .into_iter()
        .map(|(flag, value)| (StoryFlag(flag), value))
        .collect();
    world.queue = record
        .letters
        .into_iter()
        .map(|letter| {
            Ok(Letter {
                sender: ActorId(letter.sender),
                recipient: ActorId(letter.recipient),
                signal: decode_signal(letter.signal)?,
                param: letter.param,
            })
        })
        .collect::<Result<_, CorruptSave>>()?;
    world.subscriptions = record
        .subscriptions
        .into_iter()
        .map(|sub| {
            if usize::from(sub.slot) >= MEMORY_SLOTS {
                return Err(CorruptSave::Malformed(format!(
                    "subscription slot {} out of range",
                    sub.slot
                )));
            }
            Ok(Subscription {
                recipient: ActorId(sub.recipient),
                signal: decode_signal(sub.signal)?,
                slot: sub.slot,
            })
        })
        .collect::<Result<_, CorruptSave>>()?;
    world.cutscene = record.cutscene.map(|(id, owner)| Cutscene {
        id,
        owner: ActorId(owner),
    });
    world.actors = actors;
    Ok(world)
}

fn decode_signal(code: u32) -> Result<Signal, CorruptSave> {
    Signal::from_code(code).ok_or(CorruptSave::UnknownSignal(code))
}

fn decode_actor(
    reader: &mut Reader<'_>,
    registry: &HandlerRegistry,
    table: &BTreeMap<HandlerId, String>,
) -> Result<Actor, CorruptSave> {
    let id = ActorId(reader.u16("actor")?);
    let status_bits = reader.u8("actor")?;
    let status = ActorStatus::from_bits(status_bits)
        .ok_or_else(|| CorruptSave::Malformed(format!("{id} has unknown status bits {status_bits:#04x}")))?;
    let position = Position::new(reader.u16("actor")?, reader.u16("actor")?, reader.u16("actor")?);
    let token_raw = reader.u8("actor")?;
    let mut memory = [0i32; MEMORY_SLOTS];
    for word in &mut memory {
        *word = reader.i32("actor memory")?;
    }

    let depth = reader.u8("actor")?;
    if depth > MAX_DEPTH {
        return Err(CorruptSave::DepthOutOfRange { actor: id, depth });
    }
    let mut frames = Vec::with_capacity(usize::from(depth) + 1);
    for level in 0..=depth {
        let handler = HandlerId(reader.u16("frame")?);
        let tag = ContinuationTag(reader.i32("frame")?);
        let mut words = [0i32; PARAM_SLOTS];
        for word in &mut words {
            *word = reader.i32("frame params")?;
        }
        if !registry.contains(handler) {
            return Err(CorruptSave::UnknownHandler {
                actor: id,
                depth: level,
                handler,
            });
        }
        if !table.contains_key(&handler) {
            return Err(CorruptSave::Malformed(format!(
                "{id} frame at depth {level} uses {handler}, absent from the handler table"
            )));
        }
        frames.push(Frame {
            handler,
            tag,
            params: Params::from_words(words),
        });
    }
    let stack = CallStack::from_frames(frames).ok_or(CorruptSave::DepthOutOfRange { actor: id, depth })?;

    let mut actor = Actor::with_stack(id, stack);
    actor.status = status;
    actor.position = position;
    actor.token = Token::new(token_raw);
    actor.memory = Memory::from_words(memory);
    Ok(actor)
}

/// Little-endian cursor that reports truncation instead of panicking.
struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], CorruptSave> {
        if self.bytes.len() < len {
            return Err(CorruptSave::Truncated(what));
        }
        let (head, tail) = self.bytes.split_at(len);
        self.bytes = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], CorruptSave> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, CorruptSave> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, CorruptSave> {
        self.array(what).map(u16::from_le_bytes)
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, CorruptSave> {
        self.array(what).map(u32::from_le_bytes)
    }

    fn i32(&mut self, what: &'static str) -> Result<i32, CorruptSave> {
        self.array(what).map(i32::from_le_bytes)
    }

    fn u64(&mut self, what: &'static str) -> Result<u64, CorruptSave> {
        self.array(what).map(u64::from_le_bytes)
    }
}
