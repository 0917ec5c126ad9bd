//! Minimal binary model writer
//!
//! Produces the subset of the format the decoder reads. Used to build
//! fixtures for tests and benchmarks.

use crate::{HEADER_LEN, MAGIC};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    Raw,
    Lz4,
    Zstd,
}

/// Chunk-by-chunk model writer
#[derive(Debug)]
pub struct ModelBuilder {
    bytes: Vec<u8>,
    codec: Codec,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBuilder {
    pub fn new() -> Self {
        let mut bytes = Vec::with_capacity(HEADER_LEN);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&[0x89, 0xff, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00]);
        bytes.resize(HEADER_LEN, 0);
        Self {
            bytes,
            codec: Codec::Raw,
        }
    }

    /// Store subsequent chunks uncompressed
    pub fn raw(mut self) -> Self {
        self.codec = Codec::Raw;
        self
    }

    /// LZ4-compress subsequent chunks
    pub fn lz4(mut self) -> Self {
        self.codec = Codec::Lz4;
        self
    }

    /// zstd-compress subsequent chunks
    pub fn zstd(mut self) -> Self {
        self.codec = Codec::Zstd;
        self
    }

    /// Declare instances of one class
    pub fn inst(self, class_id: u32, class_name: &str, referents: &[i32]) -> Self {
        let mut payload = Vec::new();
        payload.extend_from_slice(&class_id.to_le_bytes());
        write_string(&mut payload, class_name);
        payload.push(0);
        payload.extend_from_slice(&(referents.len() as u32).to_le_bytes());
        write_referents(&mut payload, referents);
        self.chunk(b"INST", &payload)
    }

    /// Assign names to every instance of a class, in declaration order
    pub fn name_prop(self, class_id: u32, names: &[&str]) -> Self {
        let mut values = Vec::new();
        for name in names {
            write_string(&mut values, name);
        }
        self.prop(class_id, "Name", &values)
    }

    /// Arbitrary property chunk; `values` follows the name
    pub fn prop(self, class_id: u32, property: &str, values: &[u8]) -> Self {
        let mut payload = Vec::new();
        payload.extend_from_slice(&class_id.to_le_bytes());
        write_string(&mut payload, property);
        payload.push(0x01);
        payload.extend_from_slice(values);
        self.chunk(b"PROP", &payload)
    }

    /// Parent links as `(child, parent)`; a parent of -1 means top level
    pub fn prnt(self, links: &[(i32, i32)]) -> Self {
        let children: Vec<i32> = links.iter().map(|(child, _)| *child).collect();
        let parents: Vec<i32> = links.iter().map(|(_, parent)| *parent).collect();

        let mut payload = vec![0];
        payload.extend_from_slice(&(links.len() as u32).to_le_bytes());
        write_referents(&mut payload, &children);
        write_referents(&mut payload, &parents);
        self.chunk(b"PRNT", &payload)
    }

    /// Chunk with an arbitrary tag and payload
    pub fn raw_chunk(self, tag: &[u8; 4], payload: &[u8]) -> Self {
        self.chunk(tag, payload)
    }

    /// Append the `END` chunk and return the file bytes
    pub fn finish(self) -> Vec<u8> {
        self.raw().chunk(b"END\0", b"</roblox>").bytes
    }

    fn chunk(mut self, tag: &[u8; 4], payload: &[u8]) -> Self {
        let stored = match self.codec {
            Codec::Raw => None,
            Codec::Lz4 => Some(lz4_flex::block::compress(payload)),
            Codec::Zstd => zstd::bulk::compress(payload, 0).ok(),
        };

        self.bytes.extend_from_slice(tag);
        match &stored {
            Some(compressed) => self.bytes.extend_from_slice(&(compressed.len() as u32).to_le_bytes()),
            None => self.bytes.extend_from_slice(&0u32.to_le_bytes()),
        }
        self.bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(&[0; 4]);
        self.bytes.extend_from_slice(stored.as_deref().unwrap_or(payload));
        self
    }
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

fn write_referents(out: &mut Vec<u8>, referents: &[i32]) {
    let mut previous = 0i32;
    let words: Vec<[u8; 4]> = referents
        .iter()
        .map(|referent| {
            let delta = referent.wrapping_sub(previous);
            previous = *referent;
            (((delta << 1) ^ (delta >> 31)) as u32).to_be_bytes()
        })
        .collect();

    for plane in 0..4 {
        out.extend(words.iter().map(|word| word[plane]));
    }
}
