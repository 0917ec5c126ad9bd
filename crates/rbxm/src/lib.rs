//! Model decoders
//!
//! [`decode`] expands a binary model file into a generic `{name, class_name, children}`
//! tree. Only instance declarations (`INST`), the `Name` property (`PROP`) and
//! parent links (`PRNT`) are interpreted; every other chunk and property is
//! skipped.
//!
//! Format: a 32 byte header starting with `<roblox!`, followed by chunks of
//! `tag[4] compressed_len:u32 uncompressed_len:u32 reserved[4] payload`.
//! A zero `compressed_len` means the payload is stored raw. Otherwise the
//! payload is zstd when it starts with the zstd frame magic and an LZ4 block
//! of `uncompressed_len` bytes when it does not.
//!
//! [`decode_xml`] produces the same tree from an XML model.

use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;
use tracing::trace;

pub mod builder;
mod reader;
mod xml;

use reader::Reader;

pub use xml::decode_xml;

/// File signature
pub const MAGIC: &[u8; 8] = b"<roblox!";

/// Size of the file header, signature included
pub const HEADER_LEN: usize = 32;

/// zstd frame magic
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Property carrying instance names
const NAME_PROPERTY: &str = "Name";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("truncated model: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("not a binary model (bad signature)")]
    BadMagic,

    #[error("failed to decompress {tag} chunk: {reason}")]
    Decompress { tag: String, reason: String },

    #[error("unknown referent {0}")]
    UnknownReferent(i32),

    #[error("instance {0} is its own ancestor")]
    Cycle(i32),

    #[error("model has no root instance")]
    NoRoot,

    #[error("invalid UTF-8 in {0}")]
    Utf8(&'static str),

    #[error("malformed XML model: {0}")]
    Xml(String),
}

/// Decoded instance tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelNode {
    pub name: String,
    pub class_name: String,
    pub children: Vec<ModelNode>,
}

impl ModelNode {
    /// Count of nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ModelNode::node_count).sum::<usize>()
    }
}

#[derive(Debug)]
struct Instance {
    class_name: String,
    name: String,
    parent: i32,
    children: Vec<i32>,
}

/// Instances collected while walking chunks
#[derive(Debug, Default)]
struct Model {
    /// Referent -> instance (ordered so the root search is deterministic)
    instances: BTreeMap<i32, Instance>,

    /// Class id -> referents in declaration order
    classes: HashMap<u32, Vec<i32>>,
}

/// Decode a binary model into its root instance
pub fn decode(bytes: &[u8]) -> Result<ModelNode, DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            offset: 0,
            needed: HEADER_LEN,
        });
    }
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(DecodeError::BadMagic);
    }

    let mut model = Model::default();
    let mut file = Reader::new(bytes);
    file.skip(HEADER_LEN)?;

    while !file.is_empty() {
        let tag = file.read_bytes(4)?;
        let tag = String::from_utf8_lossy(tag).into_owned();
        let compressed_len = file.read_u32()? as usize;
        let uncompressed_len = file.read_u32()? as usize;
        file.skip(4)?;

        if tag == "END\0" {
            break;
        }

        let payload = if compressed_len == 0 {
            file.read_bytes(uncompressed_len)?.to_vec()
        } else {
            decompress(&tag, file.read_bytes(compressed_len)?, uncompressed_len)?
        };

        trace!("chunk {} ({} bytes)", tag, payload.len());
        let mut chunk = Reader::new(&payload);
        match tag.as_str() {
            "INST" => model.read_inst(&mut chunk)?,
            "PROP" => model.read_prop(&mut chunk)?,
            "PRNT" => model.read_prnt(&mut chunk)?,
            _ => {}
        }
    }

    model.into_tree()
}

fn decompress(tag: &str, data: &[u8], uncompressed_len: usize) -> Result<Vec<u8>, DecodeError> {
    let result = if data.starts_with(&ZSTD_MAGIC) {
        zstd::bulk::decompress(data, uncompressed_len).map_err(|e| e.to_string())
    } else {
        lz4_flex::block::decompress(data, uncompressed_len).map_err(|e| e.to_string())
    };
    result.map_err(|reason| DecodeError::Decompress {
        tag: tag.to_string(),
        reason,
    })
}

impl Model {
    fn read_inst(&mut self, chunk: &mut Reader<'_>) -> Result<(), DecodeError> {
        let class_id = chunk.read_u32()?;
        let class_name = chunk.read_string("class name")?;
        let _format = chunk.read_u8()?;
        let count = chunk.read_u32()? as usize;
        let referents = chunk.read_referents(count)?;

        for &referent in &referents {
            self.instances.insert(
                referent,
                Instance {
                    class_name: class_name.clone(),
                    name: String::new(),
                    parent: -1,
                    children: Vec::new(),
                },
            );
        }
        self.classes.entry(class_id).or_default().extend(referents);
        Ok(())
    }

    fn read_prop(&mut self, chunk: &mut Reader<'_>) -> Result<(), DecodeError> {
        let class_id = chunk.read_u32()?;
        let property = chunk.read_string("property name")?;
        if property != NAME_PROPERTY {
            return Ok(());
        }
        let _type_id = chunk.read_u8()?;

        let Some(referents) = self.classes.get(&class_id) else {
            return Ok(());
        };
        for referent in referents {
            let name = chunk.read_string("instance name")?;
            if let Some(instance) = self.instances.get_mut(referent) {
                instance.name = name;
            }
        }
        Ok(())
    }

    fn read_prnt(&mut self, chunk: &mut Reader<'_>) -> Result<(), DecodeError> {
        let _version = chunk.read_u8()?;
        let count = chunk.read_u32()? as usize;
        let children = chunk.read_referents(count)?;
        let parents = chunk.read_referents(count)?;

        for (child, parent) in children.into_iter().zip(parents) {
            self.instances
                .get_mut(&child)
                .ok_or(DecodeError::UnknownReferent(child))?
                .parent = parent;
            if parent >= 0 {
                self.instances
                    .get_mut(&parent)
                    .ok_or(DecodeError::UnknownReferent(parent))?
                    .children
                    .push(child);
            }
        }
        Ok(())
    }

    fn into_tree(self) -> Result<ModelNode, DecodeError> {
        let root = self
            .instances
            .iter()
            .find(|(_, instance)| instance.parent < 0)
            .map(|(referent, _)| *referent)
            .ok_or(DecodeError::NoRoot)?;

        let mut visiting = HashSet::new();
        self.build(root, &mut visiting)
    }

    fn build(&self, referent: i32, visiting: &mut HashSet<i32>) -> Result<ModelNode, DecodeError> {
        if !visiting.insert(referent) {
            return Err(DecodeError::Cycle(referent));
        }
        let instance = self
            .instances
            .get(&referent)
            .ok_or(DecodeError::UnknownReferent(referent))?;

        let children = instance
            .children
            .iter()
            .map(|child| self.build(*child, visiting))
            .collect::<Result<Vec<_>, _>>()?;

        visiting.remove(&referent);
        Ok(ModelNode {
            name: instance.name.clone(),
            class_name: instance.class_name.clone(),
            children,
        })
    }
}
