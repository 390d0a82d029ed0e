//! The async chunk reader.
//!
//! Runs on a worker thread. It parses the region file, decodes the palette
//! and packed block indices into fresh section buffers, computes the height
//! map and publishes the result through the chunk's [`LoadSlot`] with a
//! release store of the atomic flags. Until that store the tick thread never
//! looks at the produced data.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::Ordering;

use ember_registry::REGISTRY;
use ember_utils::WorldChunkPos;
use ember_utils::types::{MIN_WORLD_Y, SECTIONS_PER_CHUNK};
use flate2::read::{GzDecoder, ZlibDecoder};

use crate::chunk::{
    ATOMIC_FINISHED_LOAD, ATOMIC_LOAD_SUCCESS, LoadSlot, LoadedChunkData, recalculate_height_map,
};

/// World data version this server reads.
pub const SERVER_WORLD_VERSION: i32 = 3120;
/// Status value of a fully generated chunk.
const STATUS_FULL: &str = "minecraft:full";

/// Upper bound on the decompressed chunk payload.
const MAX_UNCOMPRESSED_SIZE: u64 = 2 << 20;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ChunkLoadError {
    #[error("unknown world id {0}")]
    UnknownWorld(i32),
    #[error("failed to read region file: {0}")]
    Io(#[from] std::io::Error),
    #[error("chunk not present in region file")]
    Absent,
    #[error("chunk data in header")]
    DataInHeader,
    #[error("chunk data uses 0 sectors")]
    ZeroSectors,
    #[error("chunk data out of bounds")]
    OutOfBounds,
    #[error("chunk data outside of its sectors")]
    SizeMismatch,
    #[error("external chunk storage")]
    ExternalStorage,
    #[error("unknown chunk compression method {0}")]
    UnknownCompression(u8),
    #[error("uncompressed chunk size too large")]
    TooLarge,
    #[error("failed to parse chunk nbt")]
    Nbt,
    #[error("data version {0} != {SERVER_WORLD_VERSION}")]
    DataVersion(i32),
    #[error("chunk not fully generated, status: {0}")]
    NotFullyGenerated(String),
    #[error("invalid section y {0}")]
    InvalidSectionY(i32),
    #[error("duplicate block section for y {0}")]
    DuplicateSection(i32),
    #[error("invalid palette size {0}")]
    PaletteSize(usize),
    #[error("unknown block type {0}")]
    UnknownBlockType(String),
    #[error("expected {expected} data words, got {actual}")]
    WordCount { expected: usize, actual: usize },
    #[error("palette index {index} out of bounds for size {size}")]
    PaletteIndex { index: usize, size: usize },
}

/// Entry point for the background task: populate the slot and publish.
pub fn load_chunk_async(pos: WorldChunkPos, world_root: &Path, slot: &LoadSlot) {
    let mut flags = ATOMIC_FINISHED_LOAD;
    let data = match read_chunk(pos, world_root) {
        Ok(data) => {
            flags |= ATOMIC_LOAD_SUCCESS;
            data
        }
        Err(error) => {
            // Absent chunks are routine on the edge of generated terrain;
            // anything else is worth a log line.
            if matches!(error, ChunkLoadError::Absent) {
                // An absent chunk is generated-empty, which counts as a
                // successful load of empty data.
                flags |= ATOMIC_LOAD_SUCCESS;
            } else {
                log::info!("Chunk {pos} load failed: {error}");
            }
            LoadedChunkData::empty()
        }
    };

    *slot.result.lock() = Some(data);
    slot.flags.fetch_or(flags, Ordering::Release);
}

fn region_file_path(pos: WorldChunkPos, world_root: &Path) -> Result<std::path::PathBuf, ChunkLoadError> {
    // Only the overworld is backed by a region store.
    if pos.world_id != 1 {
        return Err(ChunkLoadError::UnknownWorld(pos.world_id));
    }
    let region_x = pos.x >> 5;
    let region_z = pos.z >> 5;
    Ok(world_root.join("region").join(format!("r.{region_x}.{region_z}.mca")))
}

fn read_chunk(pos: WorldChunkPos, world_root: &Path) -> Result<Box<LoadedChunkData>, ChunkLoadError> {
    let path = region_file_path(pos, world_root)?;
    let mut file = File::open(&path)?;
    let file_size = file.metadata()?.len();

    // The 4 KiB header holds 1024 big-endian location entries of
    // (sector_offset << 8 | sector_count).
    let mut header = [0u8; 4096];
    file.read_exact(&mut header)?;
    let index = (((pos.z & 0x1F) << 5) | (pos.x & 0x1F)) as usize;
    let location = u32::from_be_bytes(header[index * 4..index * 4 + 4].try_into().expect("4 bytes"));
    if location == 0 {
        return Err(ChunkLoadError::Absent);
    }

    let sector_offset = u64::from(location >> 8);
    let sector_count = u64::from(location & 0xFF);
    if sector_offset < 2 {
        return Err(ChunkLoadError::DataInHeader);
    }
    if sector_count == 0 {
        return Err(ChunkLoadError::ZeroSectors);
    }
    if (sector_offset + sector_count) << 12 > file_size {
        return Err(ChunkLoadError::OutOfBounds);
    }

    file.seek(SeekFrom::Start(sector_offset << 12))?;
    let mut sectors = vec![0u8; (sector_count << 12) as usize];
    file.read_exact(&mut sectors)?;

    let payload_size = u32::from_be_bytes(sectors[0..4].try_into().expect("4 bytes")) as usize;
    if payload_size == 0 || payload_size + 4 > sectors.len() {
        return Err(ChunkLoadError::SizeMismatch);
    }
    let storage_type = sectors[4];
    if storage_type & 0x80 != 0 {
        return Err(ChunkLoadError::ExternalStorage);
    }
    // The payload size includes the compression byte.
    let compressed = &sectors[5..4 + payload_size];

    let mut uncompressed = Vec::new();
    let bytes_read = match storage_type {
        1 => GzDecoder::new(compressed)
            .take(MAX_UNCOMPRESSED_SIZE + 1)
            .read_to_end(&mut uncompressed),
        2 => ZlibDecoder::new(compressed)
            .take(MAX_UNCOMPRESSED_SIZE + 1)
            .read_to_end(&mut uncompressed),
        other => return Err(ChunkLoadError::UnknownCompression(other)),
    };
    bytes_read?;
    if uncompressed.len() as u64 > MAX_UNCOMPRESSED_SIZE {
        return Err(ChunkLoadError::TooLarge);
    }

    parse_chunk_nbt(&uncompressed)
}

fn parse_chunk_nbt(payload: &[u8]) -> Result<Box<LoadedChunkData>, ChunkLoadError> {
    let root = match simdnbt::owned::read(&mut Cursor::new(payload)) {
        Ok(simdnbt::owned::Nbt::Some(base)) => base,
        _ => return Err(ChunkLoadError::Nbt),
    };

    let data_version = root.int("DataVersion").ok_or(ChunkLoadError::Nbt)?;
    if data_version != SERVER_WORLD_VERSION {
        return Err(ChunkLoadError::DataVersion(data_version));
    }

    let status = root
        .string("Status")
        .map(|s| s.to_str().into_owned())
        .ok_or(ChunkLoadError::Nbt)?;
    if status != STATUS_FULL {
        return Err(ChunkLoadError::NotFullyGenerated(status));
    }

    // Stored light is parsed by the format but deliberately not used: light
    // is recomputed so stale neighbour updates cannot leak in.
    let _light_is_stored = root.byte("isLightOn").unwrap_or(0) != 0;

    let mut data = LoadedChunkData::empty();
    let mut sections_with_blocks = [false; SECTIONS_PER_CHUNK];

    let min_section = MIN_WORLD_Y >> 4;
    let max_section = (MIN_WORLD_Y >> 4) + SECTIONS_PER_CHUNK as i32 - 1;

    let Some(section_list) = root.list("sections") else {
        // No sections is a valid empty chunk.
        return Ok(data);
    };
    let section_compounds = section_list.compounds().ok_or(ChunkLoadError::Nbt)?;

    for section_nbt in section_compounds {
        let section_y = section_nbt
            .byte("Y")
            .map(i32::from)
            .or_else(|| section_nbt.int("Y"))
            .ok_or(ChunkLoadError::Nbt)?;

        let Some(block_states) = section_nbt.compound("block_states") else {
            continue;
        };
        let Some(palette_list) = block_states.list("palette") else {
            continue;
        };
        let palette_compounds = palette_list.compounds().ok_or(ChunkLoadError::Nbt)?;
        if palette_compounds.is_empty() {
            continue;
        }

        if section_y < min_section || section_y > max_section {
            return Err(ChunkLoadError::InvalidSectionY(section_y));
        }
        let section_index = (section_y - min_section) as usize;
        if sections_with_blocks[section_index] {
            return Err(ChunkLoadError::DuplicateSection(section_y));
        }
        sections_with_blocks[section_index] = true;

        let palette_size = palette_compounds.len();
        if palette_size > 4096 {
            return Err(ChunkLoadError::PaletteSize(palette_size));
        }

        // Resolve each palette entry against the block property specs.
        let mut palette_map = Vec::with_capacity(palette_size);
        for entry in palette_compounds {
            let name = entry
                .string("Name")
                .map(|s| s.to_str().into_owned())
                .ok_or(ChunkLoadError::Nbt)?;
            let properties = entry.compound("Properties");
            let state = REGISTRY
                .state_from_palette(&name, |property_name| {
                    properties
                        .and_then(|props| props.string(property_name))
                        .map(|value| value.to_str().into_owned())
                })
                .ok_or(ChunkLoadError::UnknownBlockType(name))?;
            palette_map.push(state);
        }

        let (blocks, non_air_count) = &mut data.sections[section_index];

        if palette_size == 1 {
            // Single-entry palettes carry no packed data; fill uniformly.
            let state = palette_map[0];
            if !state.is_air() {
                for index in 0..4096 {
                    blocks.set(index, state);
                }
                *non_air_count = 4096;
            }
            continue;
        }

        let bits_per_block = (usize::BITS - (palette_size - 1).leading_zeros()).max(4) as usize;
        let blocks_per_word = 64 / bits_per_block;
        let expected_words = 4096usize.div_ceil(blocks_per_word);
        let mask = (1u64 << bits_per_block) - 1;

        let words = block_states
            .long_array("data")
            .ok_or(ChunkLoadError::Nbt)?;
        if words.len() != expected_words {
            return Err(ChunkLoadError::WordCount {
                expected: expected_words,
                actual: words.len(),
            });
        }

        // Entries never straddle word boundaries.
        let mut word_iter = words.iter();
        let mut word = *word_iter.next().expect("at least one word") as u64;
        let mut bit_offset = 0usize;
        for index in 0..4096usize {
            if bit_offset > 64 - bits_per_block {
                word = *word_iter.next().ok_or(ChunkLoadError::Nbt)? as u64;
                bit_offset = 0;
            }
            let palette_index = ((word >> bit_offset) & mask) as usize;
            bit_offset += bits_per_block;

            if palette_index >= palette_size {
                return Err(ChunkLoadError::PaletteIndex {
                    index: palette_index,
                    size: palette_size,
                });
            }
            let state = palette_map[palette_index];
            blocks.set(index, state);
            // Cave air and void air count as air here, exactly like state 0.
            if !state.is_air() {
                *non_air_count += 1;
            }
        }
    }

    // The chunk struct is not built yet, so run the recompute over a
    // temporary section view.
    let sections: Vec<crate::chunk::ChunkSection> = data
        .sections
        .iter_mut()
        .map(|(blocks, non_air)| crate::chunk::ChunkSection {
            blocks: std::mem::take(blocks),
            non_air_count: *non_air,
            changed_set: None,
        })
        .collect();
    recalculate_height_map(&sections, &mut data.height_map);
    for (slot, section) in data.sections.iter_mut().zip(sections) {
        slot.0 = section.blocks;
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_registry::vanilla_blocks;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use simdnbt::owned::{BaseNbt, Nbt, NbtCompound, NbtList, NbtTag};
    use std::io::Write as _;

    fn chunk_nbt(sections: Vec<NbtCompound>) -> Vec<u8> {
        let mut root = NbtCompound::new();
        root.insert("DataVersion", NbtTag::Int(SERVER_WORLD_VERSION));
        root.insert("Status", NbtTag::String(STATUS_FULL.into()));
        root.insert("sections", NbtTag::List(NbtList::Compound(sections)));
        let mut bytes = Vec::new();
        Nbt::Some(BaseNbt::new("", root)).write(&mut bytes);
        bytes
    }

    fn stone_section(y: i8) -> NbtCompound {
        let mut palette_entry = NbtCompound::new();
        palette_entry.insert("Name", NbtTag::String("minecraft:stone".into()));
        let mut block_states = NbtCompound::new();
        block_states.insert("palette", NbtTag::List(NbtList::Compound(vec![palette_entry])));
        let mut section = NbtCompound::new();
        section.insert("Y", NbtTag::Byte(y));
        section.insert("block_states", NbtTag::Compound(block_states));
        section
    }

    fn write_region_file(dir: &Path, chunk_payload: &[u8]) {
        let region_dir = dir.join("region");
        std::fs::create_dir_all(&region_dir).expect("create region dir");

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(chunk_payload).expect("compress");
        let compressed = encoder.finish().expect("compress");

        let mut file = vec![0u8; 2 * 4096];
        // Slot (0, 0): sectors start at 2.
        let payload_size = compressed.len() + 1;
        let sector_count = (4 + payload_size).div_ceil(4096);
        let location = (2u32 << 8) | sector_count as u32;
        file[0..4].copy_from_slice(&location.to_be_bytes());

        let mut body = vec![0u8; sector_count * 4096];
        body[0..4].copy_from_slice(&(payload_size as u32).to_be_bytes());
        body[4] = 2; // zlib
        body[5..5 + compressed.len()].copy_from_slice(&compressed);
        file.extend_from_slice(&body);

        std::fs::write(region_dir.join("r.0.0.mca"), file).expect("write region");
    }

    #[test]
    fn parses_single_entry_palette() {
        let payload = chunk_nbt(vec![stone_section(0)]);
        let data = parse_chunk_nbt(&payload).expect("parse");
        let section_index = (0 - (MIN_WORLD_Y >> 4)) as usize;
        assert_eq!(data.sections[section_index].1, 4096);
        assert_eq!(
            data.sections[section_index].0.get(0),
            REGISTRY.default_state(vanilla_blocks::STONE)
        );
        // Height above section 0 (y 0..15) is 16 everywhere.
        assert!(data.height_map.iter().all(|&h| h == 16));
    }

    #[test]
    fn rejects_wrong_data_version() {
        let mut root = NbtCompound::new();
        root.insert("DataVersion", NbtTag::Int(SERVER_WORLD_VERSION - 1));
        root.insert("Status", NbtTag::String(STATUS_FULL.into()));
        let mut bytes = Vec::new();
        Nbt::Some(BaseNbt::new("", root)).write(&mut bytes);
        assert!(matches!(
            parse_chunk_nbt(&bytes),
            Err(ChunkLoadError::DataVersion(_))
        ));
    }

    #[test]
    fn rejects_not_fully_generated() {
        let mut root = NbtCompound::new();
        root.insert("DataVersion", NbtTag::Int(SERVER_WORLD_VERSION));
        root.insert("Status", NbtTag::String("minecraft:features".into()));
        let mut bytes = Vec::new();
        Nbt::Some(BaseNbt::new("", root)).write(&mut bytes);
        assert!(matches!(
            parse_chunk_nbt(&bytes),
            Err(ChunkLoadError::NotFullyGenerated(_))
        ));
    }

    #[test]
    fn rejects_unknown_block() {
        let mut palette_entry = NbtCompound::new();
        palette_entry.insert("Name", NbtTag::String("minecraft:not_a_block".into()));
        let mut block_states = NbtCompound::new();
        block_states.insert("palette", NbtTag::List(NbtList::Compound(vec![palette_entry])));
        let mut section = NbtCompound::new();
        section.insert("Y", NbtTag::Byte(0));
        section.insert("block_states", NbtTag::Compound(block_states));
        let payload = chunk_nbt(vec![section]);
        assert!(matches!(
            parse_chunk_nbt(&payload),
            Err(ChunkLoadError::UnknownBlockType(_))
        ));
    }

    #[test]
    fn rejects_duplicate_section() {
        let payload = chunk_nbt(vec![stone_section(3), stone_section(3)]);
        assert!(matches!(
            parse_chunk_nbt(&payload),
            Err(ChunkLoadError::DuplicateSection(3))
        ));
    }

    #[test]
    fn reads_region_file_end_to_end() {
        let dir = std::env::temp_dir().join(format!("ember-region-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        write_region_file(&dir, &chunk_nbt(vec![stone_section(-4)]));

        let data = read_chunk(WorldChunkPos::new(1, 0, 0), &dir).expect("read chunk");
        let section_index = (-4 - (MIN_WORLD_Y >> 4)) as usize;
        assert_eq!(data.sections[section_index].1, 4096);

        // A neighbouring chunk slot is absent.
        assert!(matches!(
            read_chunk(WorldChunkPos::new(1, 1, 0), &dir),
            Err(ChunkLoadError::Absent)
        ));
        // Other worlds are not backed by files.
        assert!(matches!(
            read_chunk(WorldChunkPos::new(2, 0, 0), &dir),
            Err(ChunkLoadError::UnknownWorld(2))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
