//! CINE decoder (Phantom high-speed-camera format): `CINEFILEHEADER`,
//! `BITMAPINFOHEADER`, a setup block, optional tagged blocks (one of which
//! may carry per-frame timestamps), an offset table, then the images
//! themselves, each preceded by a skippable annotation.

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use super::{Movie, MovieFormat};
use crate::error::{io_err, CorrTrackError, Result};
use crate::pixel_buffer::PixelBuffer;

const CINE_MAGIC: u16 = 0x4943; // "CI", little-endian bytes C,I
const CINEFILEHEADER_SIZE: u64 = 44;
const BITMAPINFOHEADER_SIZE: u32 = 40;
const SETUP_MARK: u16 = 0x5453; // "ST"
const TIME_ONLY_BLOCK_TYPE: u16 = 0x3ea;

struct FileHeader {
    image_count: u32,
    off_image_header: u64,
    off_setup: u64,
    off_image_offsets: u64,
}

struct BitmapInfoHeader {
    width: u32,
    height: u32,
    bit_count: u16,
}

fn corrupt(reason: impl Into<String>) -> CorrTrackError {
    CorrTrackError::Corrupt { reason: reason.into() }
}

fn unsupported(reason: impl Into<String>) -> CorrTrackError {
    CorrTrackError::Unsupported { reason: reason.into() }
}

fn read_file_header<R: Read + Seek>(r: &mut R, path: &Path) -> Result<FileHeader> {
    let magic = r.read_u16::<LittleEndian>().map_err(|e| io_err(path, e))?;
    if magic != CINE_MAGIC {
        return Err(corrupt(format!("CINE magic mismatch: expected {CINE_MAGIC:#06x}, found {magic:#06x}")));
    }
    let header_size = r.read_u16::<LittleEndian>().map_err(|e| io_err(path, e))?;
    if header_size as u64 != CINEFILEHEADER_SIZE {
        return Err(corrupt(format!("unexpected CINEFILEHEADER size {header_size}")));
    }
    let compression = r.read_u16::<LittleEndian>().map_err(|e| io_err(path, e))?;
    if compression != 0 {
        return Err(unsupported("compressed CINE files are not supported"));
    }
    let _version = r.read_u16::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let _first_movie_image = r.read_i32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let _total_image_count = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let _first_image_no = r.read_i32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let image_count = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let off_image_header = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))? as u64;
    let off_setup = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))? as u64;
    let off_image_offsets = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))? as u64;
    // TriggerTime (TIME64): unused for decoding, present only to keep the
    // header's byte layout exact.
    let _fractions = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let _seconds = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))?;

    if image_count == 0 {
        return Err(corrupt("CINE file declares zero frames"));
    }

    Ok(FileHeader {
        image_count,
        off_image_header,
        off_setup,
        off_image_offsets,
    })
}

fn read_bitmap_info_header<R: Read + Seek>(r: &mut R, offset: u64, path: &Path) -> Result<BitmapInfoHeader> {
    r.seek(SeekFrom::Start(offset)).map_err(|e| io_err(path, e))?;
    let bi_size = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    if bi_size != BITMAPINFOHEADER_SIZE {
        return Err(corrupt(format!("unexpected BITMAPINFOHEADER size {bi_size}")));
    }
    let bi_width = r.read_i32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let bi_height = r.read_i32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let _bi_planes = r.read_u16::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let bi_bit_count = r.read_u16::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let bi_compression = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let bi_size_image = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let _x_pels = r.read_i32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let _y_pels = r.read_i32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let _clr_used = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let _clr_important = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))?;

    if bi_width <= 0 || bi_height <= 0 {
        return Err(corrupt("non-positive CINE image dimensions"));
    }
    if bi_bit_count != 8 && bi_bit_count != 16 {
        return Err(unsupported(format!("CINE biBitCount {bi_bit_count} is not 8 or 16")));
    }
    if bi_compression != 0 {
        return Err(unsupported("compressed CINE bitmap data is not supported"));
    }
    let width = bi_width as u32;
    let height = bi_height as u32;
    let expected_size = width * height * (bi_bit_count as u32 / 8);
    if bi_size_image != expected_size {
        return Err(corrupt("CINE biSizeImage is inconsistent with width/height/bit count"));
    }

    Ok(BitmapInfoHeader {
        width,
        height,
        bit_count: bi_bit_count,
    })
}

/// Read the setup block's `Mark`/`Length` fields and return the offset just
/// past the block, where tagged information blocks (if any) begin.
fn read_setup_end<R: Read + Seek>(r: &mut R, off_setup: u64, path: &Path) -> Result<u64> {
    r.seek(SeekFrom::Start(off_setup)).map_err(|e| io_err(path, e))?;
    let mark = r.read_u16::<LittleEndian>().map_err(|e| io_err(path, e))?;
    if mark != SETUP_MARK {
        return Err(corrupt("corrupted CINE setup block (bad mark)"));
    }
    let length = r.read_u16::<LittleEndian>().map_err(|e| io_err(path, e))?;
    Ok(off_setup + length as u64)
}

/// Scan the tagged-block region `[setup_end, off_image_offsets)` for the
/// per-frame `TIME64` array block (type `0x3ea`); returns the byte offset of
/// its first entry if found.
fn find_time_only_offset<R: Read + Seek>(
    r: &mut R,
    setup_end: u64,
    off_image_offsets: u64,
    path: &Path,
) -> Result<Option<u64>> {
    if setup_end >= off_image_offsets {
        return Ok(None);
    }
    let mut cursor = setup_end;
    while cursor < off_image_offsets {
        r.seek(SeekFrom::Start(cursor)).map_err(|e| io_err(path, e))?;
        let block_size = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))?;
        let block_type = r.read_u16::<LittleEndian>().map_err(|e| io_err(path, e))?;
        let _reserved = r.read_u16::<LittleEndian>().map_err(|e| io_err(path, e))?;
        if block_type == TIME_ONLY_BLOCK_TYPE {
            return Ok(Some(cursor + 8));
        }
        if block_size == 0 {
            return Err(corrupt("CINE tagged block has zero size"));
        }
        cursor += block_size as u64;
    }
    Ok(None)
}

fn read_time64<R: Read + Seek>(r: &mut R, offset: u64, path: &Path) -> Result<(u32, u32)> {
    r.seek(SeekFrom::Start(offset)).map_err(|e| io_err(path, e))?;
    let fractions = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    let seconds = r.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))?;
    Ok((fractions, seconds))
}

/// Nanoseconds elapsed from `(frac0, sec0)` to `(frac1, sec1)`, per the
/// `(Δseconds + Δfractions/2^32) × 10^9` rule.
fn time64_delta_ns(origin: (u32, u32), sample: (u32, u32)) -> u64 {
    let (frac0, sec0) = origin;
    let (frac1, sec1) = sample;
    let delta_seconds = sec1 as i64 - sec0 as i64;
    let delta_fractions = frac1 as i64 - frac0 as i64;
    let seconds_f = delta_seconds as f64 + delta_fractions as f64 / 4294967296.0;
    (seconds_f * 1.0e9).round().max(0.0) as u64
}

pub fn open(path: &Path) -> Result<Movie> {
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    if (bytes.len() as u64) < CINEFILEHEADER_SIZE + BITMAPINFOHEADER_SIZE as u64 {
        return Err(corrupt("CINE file too short for fixed headers"));
    }
    let mut cursor = Cursor::new(bytes.as_slice());

    let header = read_file_header(&mut cursor, path)?;
    let bitmap = read_bitmap_info_header(&mut cursor, header.off_image_header, path)?;
    let setup_end = read_setup_end(&mut cursor, header.off_setup, path)?;
    let time_only_off = find_time_only_offset(&mut cursor, setup_end, header.off_image_offsets, path)?;

    let bytes_per_sample = (bitmap.bit_count / 8) as usize;
    let pixel_count = (bitmap.width as usize) * (bitmap.height as usize);
    let frame_byte_size = pixel_count * bytes_per_sample;
    let n_frames = header.image_count as usize;

    let mut frames = Vec::with_capacity(n_frames);
    let mut origin_time: Option<(u32, u32)> = None;

    for frame_idx in 0..n_frames {
        cursor
            .seek(SeekFrom::Start(header.off_image_offsets + (frame_idx as u64) * 8))
            .map_err(|e| io_err(path, e))?;
        let image_offset = cursor.read_u64::<LittleEndian>().map_err(|e| io_err(path, e))?;

        cursor.seek(SeekFrom::Start(image_offset)).map_err(|e| io_err(path, e))?;
        let annotation_size = cursor.read_u32::<LittleEndian>().map_err(|e| io_err(path, e))?;
        if (annotation_size as u64) < 4 {
            return Err(corrupt("CINE image annotation size smaller than its own field"));
        }
        cursor
            .seek(SeekFrom::Start(image_offset + annotation_size as u64))
            .map_err(|e| io_err(path, e))?;

        let mut payload = vec![0u8; frame_byte_size];
        cursor.read_exact(&mut payload).map_err(|e| io_err(path, e))?;

        let pixels: Vec<u16> = if bytes_per_sample == 1 {
            payload.iter().map(|&b| b as u16).collect()
        } else {
            payload.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect()
        };

        let timestamp = if let Some(time_only_off) = time_only_off {
            let sample = read_time64(&mut cursor, time_only_off + (frame_idx as u64) * 8, path)?;
            let origin = *origin_time.get_or_insert(sample);
            time64_delta_ns(origin, sample)
        } else {
            0
        };

        frames.push(PixelBuffer::from_pixels(bitmap.width, bitmap.height, bitmap.bit_count as u8, pixels, timestamp));
    }

    Ok(Movie::new(
        MovieFormat::Cine,
        bitmap.bit_count as u8,
        0.0,
        path.to_path_buf(),
        frames,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CineBuilder {
        width: u32,
        height: u32,
        bit_count: u16,
        compression: u16,
        bitmap_compression: u32,
        timestamps: Option<Vec<(u32, u32)>>,
    }

    impl CineBuilder {
        fn new(width: u32, height: u32, bit_count: u16) -> Self {
            Self {
                width,
                height,
                bit_count,
                compression: 0,
                bitmap_compression: 0,
                timestamps: None,
            }
        }

        fn build(&self, frame_payloads: &[Vec<u8>]) -> Vec<u8> {
            let n_frames = frame_payloads.len() as u32;
            let off_image_header = CINEFILEHEADER_SIZE as u32;
            let off_setup = off_image_header + BITMAPINFOHEADER_SIZE;
            let setup_block_len: u16 = 16;
            let tagged_block_len: u32 = 8 + self.timestamps.as_ref().map(|t| t.len() * 8).unwrap_or(0) as usize as u32;
            let off_image_offsets = off_setup as u32
                + setup_block_len as u32
                + if self.timestamps.is_some() { tagged_block_len } else { 0 };

            let mut out = Vec::new();
            // CINEFILEHEADER
            out.extend_from_slice(&CINE_MAGIC.to_le_bytes());
            out.extend_from_slice(&(CINEFILEHEADER_SIZE as u16).to_le_bytes());
            out.extend_from_slice(&self.compression.to_le_bytes());
            out.extend_from_slice(&1u16.to_le_bytes()); // Version
            out.extend_from_slice(&0i32.to_le_bytes()); // FirstMovieImage
            out.extend_from_slice(&n_frames.to_le_bytes()); // TotalImageCount
            out.extend_from_slice(&0i32.to_le_bytes()); // FirstImageNo
            out.extend_from_slice(&n_frames.to_le_bytes()); // ImageCount
            out.extend_from_slice(&off_image_header.to_le_bytes());
            out.extend_from_slice(&off_setup.to_le_bytes());
            out.extend_from_slice(&off_image_offsets.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes()); // TriggerTime.fractions
            out.extend_from_slice(&0u32.to_le_bytes()); // TriggerTime.seconds
            assert_eq!(out.len() as u64, CINEFILEHEADER_SIZE);

            // BITMAPINFOHEADER
            out.extend_from_slice(&BITMAPINFOHEADER_SIZE.to_le_bytes());
            out.extend_from_slice(&(self.width as i32).to_le_bytes());
            out.extend_from_slice(&(self.height as i32).to_le_bytes());
            out.extend_from_slice(&1u16.to_le_bytes()); // biPlanes
            out.extend_from_slice(&self.bit_count.to_le_bytes());
            out.extend_from_slice(&self.bitmap_compression.to_le_bytes());
            let size_image = self.width * self.height * (self.bit_count as u32 / 8);
            out.extend_from_slice(&size_image.to_le_bytes());
            out.extend_from_slice(&0i32.to_le_bytes());
            out.extend_from_slice(&0i32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());

            // Setup block: Mark, Length, padding out to setup_block_len.
            out.extend_from_slice(&SETUP_MARK.to_le_bytes());
            out.extend_from_slice(&setup_block_len.to_le_bytes());
            out.extend(vec![0u8; setup_block_len as usize - 4]);

            if let Some(timestamps) = &self.timestamps {
                out.extend_from_slice(&tagged_block_len.to_le_bytes());
                out.extend_from_slice(&TIME_ONLY_BLOCK_TYPE.to_le_bytes());
                out.extend_from_slice(&0u16.to_le_bytes());
                for (fractions, seconds) in timestamps {
                    out.extend_from_slice(&fractions.to_le_bytes());
                    out.extend_from_slice(&seconds.to_le_bytes());
                }
            }

            assert_eq!(out.len() as u32, off_image_offsets);

            // Image offset table.
            let header_and_table_end = off_image_offsets + n_frames * 8;
            let mut image_offsets = Vec::new();
            let mut cursor = header_and_table_end as u64;
            for payload in frame_payloads {
                image_offsets.push(cursor);
                cursor += 4 + payload.len() as u64; // annotation_size field + payload
            }
            for offset in &image_offsets {
                out.extend_from_slice(&offset.to_le_bytes());
            }

            for payload in frame_payloads {
                out.extend_from_slice(&4u32.to_le_bytes()); // annotation_size (includes itself, no extra annotation)
                out.extend_from_slice(payload);
            }

            out
        }
    }

    #[test]
    fn decodes_mono8_two_frames_without_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.cine");
        let builder = CineBuilder::new(2, 2, 8);
        let bytes = builder.build(&[vec![1, 2, 3, 4], vec![5, 6, 7, 8]]);
        std::fs::write(&path, bytes).unwrap();

        let movie = open(&path).unwrap();
        assert_eq!(movie.n_frames(), 2);
        assert_eq!(movie.bits_per_sample(), 8);
        assert_eq!(movie.timestamps, vec![0, 0]);
        assert_eq!(movie.frame(1).unwrap().sample(1, 1).unwrap(), 8);
    }

    #[test]
    fn decodes_mono16_with_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.cine");
        let mut builder = CineBuilder::new(1, 1, 16);
        builder.timestamps = Some(vec![(0, 100), (1 << 31, 100)]);
        let payloads = vec![0x1234u16.to_le_bytes().to_vec(), 0xBEEFu16.to_le_bytes().to_vec()];
        let bytes = builder.build(&payloads);
        std::fs::write(&path, bytes).unwrap();

        let movie = open(&path).unwrap();
        assert_eq!(movie.timestamps[0], 0);
        assert!(movie.timestamps[1] > 0);
        assert_eq!(movie.frame(0).unwrap().sample(0, 0).unwrap(), 0x1234);
        assert_eq!(movie.frame(1).unwrap().sample(0, 0).unwrap(), 0xBEEF);
    }

    #[test]
    fn unsupported_bit_depth_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.cine");
        let builder = CineBuilder::new(1, 1, 12);
        let bytes = builder.build(&[vec![0, 0]]);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(open(&path), Err(CorrTrackError::Unsupported { .. })));
    }

    #[test]
    fn compressed_cine_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.cine");
        let mut builder = CineBuilder::new(1, 1, 8);
        builder.compression = 1;
        let bytes = builder.build(&[vec![0]]);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(open(&path), Err(CorrTrackError::Unsupported { .. })));
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.cine");
        std::fs::write(&path, vec![0u8; 100]).unwrap();
        assert!(matches!(open(&path), Err(CorrTrackError::Corrupt { .. })));
    }
}
