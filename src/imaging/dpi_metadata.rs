//! Read and write DPI metadata directly in encoded byte streams.
//!
//! Where a container lets us, DPI is changed by touching header bytes only,
//! leaving the compressed pixel data untouched:
//!
//! - **JPEG**: the JFIF APP0 segment carries `units` + X/Y density. An
//!   existing segment is patched in place; otherwise one is inserted right
//!   after SOI. Resolution tags in an EXIF APP1 segment are patched too, so
//!   the two never disagree.
//! - **PNG**: the `pHYs` chunk is replaced, or inserted before the first
//!   `IDAT`, with a fresh CRC.
//! - **TIFF**: XResolution/YResolution/ResolutionUnit (tags 282/283/296) in
//!   IFD0 are overwritten in place. When they are missing, an extended copy
//!   of IFD0 is appended and the header repointed at it.
//! - **WebP**: resolution goes into an EXIF chunk (a tiny little-endian TIFF
//!   IFD). Simple `VP8 `/`VP8L` files are promoted to the extended `VP8X`
//!   layout, which is required for metadata chunks.
//!
//! All readers return `None` on anything unexpected; DPI is informational.

use super::backend::CodecError;
use super::params::Dpi;

/// Read DPI from any supported container, sniffed by magic bytes.
pub fn read_dpi(data: &[u8]) -> Option<Dpi> {
    if data.starts_with(JPEG_SOI) {
        read_jfif_density(data)
    } else if data.starts_with(PNG_SIGNATURE) {
        read_png_phys(data)
    } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        read_tiff_resolution(data)
    } else if is_webp(data) {
        read_webp_exif(data)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// JPEG: JFIF APP0 density
// ---------------------------------------------------------------------------

const JPEG_SOI: &[u8] = &[0xFF, 0xD8];
const JFIF_IDENTIFIER: &[u8] = b"JFIF\0";

/// JFIF APP0 layout, relative to the 0xFF of the marker:
///   +0  FF E0         marker
///   +2  len (BE u16)  includes itself, 16 for a thumbnail-less segment
///   +4  "JFIF\0"
///   +9  version (2 bytes)
///   +11 units         0 = aspect ratio only, 1 = dots/inch, 2 = dots/cm
///   +12 Xdensity (BE u16)
///   +14 Ydensity (BE u16)
///   +16 thumbnail width/height
const JFIF_UNITS: usize = 11;
const JFIF_X_DENSITY: usize = 12;
const JFIF_Y_DENSITY: usize = 14;
const JFIF_MIN_SEGMENT: usize = 16;

/// Offset of the first JFIF APP0 marker before the scan data, if any.
fn find_jfif_app0(data: &[u8]) -> Option<usize> {
    find_app_segment(data, 0xE0, JFIF_IDENTIFIER, JFIF_MIN_SEGMENT).map(|(pos, _)| pos)
}

/// First `marker` segment before the scan data whose payload starts with
/// `identifier` and spans at least `min_span` bytes from the 0xFF.
///
/// Returns the marker offset and the segment length field.
fn find_app_segment(
    data: &[u8],
    marker: u8,
    identifier: &[u8],
    min_span: usize,
) -> Option<(usize, usize)> {
    if !data.starts_with(JPEG_SOI) {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let found = data[pos + 1];
        // Fill bytes before a marker
        if found == 0xFF {
            pos += 1;
            continue;
        }
        // SOS: compressed data follows, no more headers
        if found == 0xDA || found == 0xD9 {
            return None;
        }
        if (0xD0..=0xD7).contains(&found) || found == 0x01 {
            pos += 2;
            continue;
        }
        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if found == marker
            && pos + 2 + seg_len <= data.len()
            && seg_len + 2 >= min_span
            && data[pos + 4..].starts_with(identifier)
        {
            return Some((pos, seg_len));
        }
        pos += 2 + seg_len;
    }
    None
}

fn read_jfif_density(data: &[u8]) -> Option<Dpi> {
    let pos = find_jfif_app0(data)?;
    let x = f64::from(u16::from_be_bytes([
        data[pos + JFIF_X_DENSITY],
        data[pos + JFIF_X_DENSITY + 1],
    ]));
    let y = f64::from(u16::from_be_bytes([
        data[pos + JFIF_Y_DENSITY],
        data[pos + JFIF_Y_DENSITY + 1],
    ]));
    match data[pos + JFIF_UNITS] {
        1 => Some(Dpi {
            x: x as u32,
            y: y as u32,
        }),
        2 => Some(Dpi::from_dots_per_cm(x, y)),
        _ => None,
    }
}

/// Set JPEG DPI without touching the entropy-coded data.
///
/// EXIF resolution tags are overwritten only where they already exist; an
/// EXIF block without them declares no DPI to conflict with JFIF.
pub fn write_jpeg_dpi(data: &[u8], dpi: Dpi) -> Result<Vec<u8>, CodecError> {
    if !data.starts_with(JPEG_SOI) {
        return Err(CodecError::Metadata("not a JPEG stream".into()));
    }
    let (x, y) = dpi.as_u16_pair();

    let mut out = if let Some(pos) = find_jfif_app0(data) {
        let mut out = data.to_vec();
        out[pos + JFIF_UNITS] = 1;
        out[pos + JFIF_X_DENSITY..pos + JFIF_X_DENSITY + 2].copy_from_slice(&x.to_be_bytes());
        out[pos + JFIF_Y_DENSITY..pos + JFIF_Y_DENSITY + 2].copy_from_slice(&y.to_be_bytes());
        out
    } else {
        let mut out = Vec::with_capacity(data.len() + 18);
        out.extend_from_slice(JPEG_SOI);
        out.extend_from_slice(&jfif_segment(x, y));
        out.extend_from_slice(&data[2..]);
        out
    };

    if let Some((pos, seg_len)) = find_exif_app1(&out) {
        let tiff = pos + 4 + EXIF_HEADER.len();
        patch_tiff_resolution(&mut out[tiff..pos + 2 + seg_len], dpi);
    }
    Ok(out)
}

/// EXIF APP1 segment: marker offset and length field.
fn find_exif_app1(data: &[u8]) -> Option<(usize, usize)> {
    find_app_segment(data, 0xE1, EXIF_HEADER, 4 + EXIF_HEADER.len())
}

fn jfif_segment(x: u16, y: u16) -> [u8; 18] {
    let mut seg = [0u8; 18];
    seg[0] = 0xFF;
    seg[1] = 0xE0;
    seg[2..4].copy_from_slice(&16u16.to_be_bytes());
    seg[4..9].copy_from_slice(JFIF_IDENTIFIER);
    seg[9] = 1; // version 1.01
    seg[10] = 1;
    seg[11] = 1;
    seg[12..14].copy_from_slice(&x.to_be_bytes());
    seg[14..16].copy_from_slice(&y.to_be_bytes());
    seg
}

// ---------------------------------------------------------------------------
// PNG: pHYs chunk
// ---------------------------------------------------------------------------

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// Walk chunks until `pHYs`, stopping at the first `IDAT` (pHYs must precede it).
fn read_png_phys(data: &[u8]) -> Option<Dpi> {
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= data.len() {
        let len = u32::from_be_bytes(data[pos..pos + 4].try_into().ok()?) as usize;
        let kind = &data[pos + 4..pos + 8];
        let body = data.get(pos + 8..pos + 8 + len)?;
        match kind {
            b"pHYs" if len == 9 => {
                let x = u32::from_be_bytes(body[0..4].try_into().ok()?);
                let y = u32::from_be_bytes(body[4..8].try_into().ok()?);
                // Unit 1 is metres; 0 means aspect ratio only.
                return (body[8] == 1).then(|| Dpi::from_pixels_per_metre(x, y));
            }
            b"IDAT" | b"IEND" => return None,
            _ => {}
        }
        // length + type + body + CRC
        pos += 12 + len;
    }
    None
}

/// Set PNG DPI by replacing or inserting the `pHYs` chunk.
///
/// Every other chunk, `IDAT` included, is copied byte for byte.
pub fn write_png_dpi(data: &[u8], dpi: Dpi) -> Result<Vec<u8>, CodecError> {
    if !data.starts_with(PNG_SIGNATURE) {
        return Err(CodecError::Metadata("not a PNG stream".into()));
    }
    let phys = phys_chunk(dpi);

    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= data.len() {
        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
        let end = pos
            .checked_add(12 + len as usize)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| CodecError::Metadata("truncated PNG chunk".into()))?;
        match &data[pos + 4..pos + 8] {
            b"pHYs" => return Ok(splice(data, pos..end, &phys)),
            b"IDAT" => return Ok(splice(data, pos..pos, &phys)),
            b"IEND" => break,
            _ => pos = end,
        }
    }
    Err(CodecError::Metadata("PNG has no image data".into()))
}

/// Complete `pHYs` chunk in pixels per metre.
fn phys_chunk(dpi: Dpi) -> [u8; 21] {
    let (x, y) = dpi.as_pixels_per_metre();
    let mut chunk = [0u8; 21];
    chunk[0..4].copy_from_slice(&9u32.to_be_bytes());
    chunk[4..8].copy_from_slice(b"pHYs");
    chunk[8..12].copy_from_slice(&x.to_be_bytes());
    chunk[12..16].copy_from_slice(&y.to_be_bytes());
    chunk[16] = 1;
    // CRC covers type and body, not the length.
    let crc = crc32fast::hash(&chunk[4..17]);
    chunk[17..21].copy_from_slice(&crc.to_be_bytes());
    chunk
}

/// `data` with `range` replaced by `insert`.
fn splice(data: &[u8], range: std::ops::Range<usize>, insert: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() - range.len() + insert.len());
    out.extend_from_slice(&data[..range.start]);
    out.extend_from_slice(insert);
    out.extend_from_slice(&data[range.end..]);
    out
}

// ---------------------------------------------------------------------------
// TIFF / EXIF: resolution tags in IFD0
// ---------------------------------------------------------------------------

const TAG_X_RESOLUTION: u16 = 282;
const TAG_Y_RESOLUTION: u16 = 283;
const TAG_RESOLUTION_UNIT: u16 = 296;

const TIFF_SHORT: u16 = 3;
const TIFF_RATIONAL: u16 = 5;

/// Byte order of a TIFF header, with matching readers and writers.
#[derive(Clone, Copy)]
struct TiffOrder {
    big_endian: bool,
}

impl TiffOrder {
    /// Order from an `II*\0` or `MM\0*` header.
    fn of(data: &[u8]) -> Option<Self> {
        let big_endian = match data.get(0..2)? {
            b"MM" => true,
            b"II" => false,
            _ => return None,
        };
        let order = Self { big_endian };
        (order.u16(data, 2)? == 42).then_some(order)
    }

    fn u16(self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = data.get(offset..offset.checked_add(2)?)?.try_into().ok()?;
        Some(if self.big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    }

    fn u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = data.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
        Some(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    fn rational(self, data: &[u8], offset: usize) -> Option<f64> {
        let numerator = self.u32(data, offset)?;
        let denominator = self.u32(data, offset.checked_add(4)?)?;
        (denominator != 0).then(|| f64::from(numerator) / f64::from(denominator))
    }

    fn u16_bytes(self, value: u16) -> [u8; 2] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    fn u32_bytes(self, value: u32) -> [u8; 4] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }
}

/// One 12-byte IFD entry; `offset` points at its tag.
struct IfdEntry {
    offset: usize,
    tag: u16,
    typ: u16,
    count: u32,
}

impl IfdEntry {
    /// Start of the 4-byte value (or value offset) field.
    fn value_field(&self) -> usize {
        self.offset + 8
    }
}

/// IFD0's offset and entries.
fn ifd0_entries(order: TiffOrder, data: &[u8]) -> Option<(usize, Vec<IfdEntry>)> {
    let ifd = order.u32(data, 4)? as usize;
    let count = order.u16(data, ifd)? as usize;
    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let offset = ifd + 2 + i * 12;
        entries.push(IfdEntry {
            offset,
            tag: order.u16(data, offset)?,
            typ: order.u16(data, offset + 2)?,
            count: order.u32(data, offset + 4)?,
        });
    }
    Some((ifd, entries))
}

/// Read XResolution/YResolution/ResolutionUnit from the first IFD.
///
/// Works on whole TIFF files and on EXIF payloads, which share the layout.
fn read_tiff_resolution(data: &[u8]) -> Option<Dpi> {
    let order = TiffOrder::of(data)?;
    let (_, entries) = ifd0_entries(order, data)?;

    let mut x = None;
    let mut y = None;
    // TIFF default when the tag is absent is inches.
    let mut unit = 2;

    for entry in &entries {
        match (entry.tag, entry.typ) {
            (TAG_X_RESOLUTION, TIFF_RATIONAL) => {
                x = order.rational(data, order.u32(data, entry.value_field())? as usize);
            }
            (TAG_Y_RESOLUTION, TIFF_RATIONAL) => {
                y = order.rational(data, order.u32(data, entry.value_field())? as usize);
            }
            (TAG_RESOLUTION_UNIT, TIFF_SHORT) => {
                unit = order.u16(data, entry.value_field())?;
            }
            _ => {}
        }
    }

    let (x, y) = (x?, y.or(x)?);
    match unit {
        2 => Some(Dpi {
            x: x.round() as u32,
            y: y.round() as u32,
        }),
        3 => Some(Dpi::from_dots_per_cm(x, y)),
        _ => None,
    }
}

/// Overwrite IFD0's resolution values in place, moving no bytes.
///
/// Needs single RATIONAL XResolution and YResolution entries; returns `false`
/// and leaves `tiff` untouched without them. An existing ResolutionUnit is
/// set to inches; a missing one already means inches.
fn patch_tiff_resolution(tiff: &mut [u8], dpi: Dpi) -> bool {
    let Some(order) = TiffOrder::of(tiff) else {
        return false;
    };
    let Some((_, entries)) = ifd0_entries(order, tiff) else {
        return false;
    };

    let data: &[u8] = tiff;
    let rational_at = |tag: u16| {
        let entry = entries
            .iter()
            .find(|e| e.tag == tag && e.typ == TIFF_RATIONAL && e.count == 1)?;
        let at = order.u32(data, entry.value_field())? as usize;
        (at.checked_add(8)? <= data.len()).then_some(at)
    };
    let (Some(x_at), Some(y_at)) = (rational_at(TAG_X_RESOLUTION), rational_at(TAG_Y_RESOLUTION))
    else {
        return false;
    };
    let unit_at = entries
        .iter()
        .find(|e| e.tag == TAG_RESOLUTION_UNIT && e.typ == TIFF_SHORT)
        .map(IfdEntry::value_field)
        .filter(|at| at + 4 <= data.len());

    for (at, value) in [(x_at, dpi.x), (y_at, dpi.y)] {
        tiff[at..at + 4].copy_from_slice(&order.u32_bytes(value));
        tiff[at + 4..at + 8].copy_from_slice(&order.u32_bytes(1));
    }
    if let Some(at) = unit_at {
        // SHORT values sit left-justified in the 4-byte field.
        tiff[at..at + 2].copy_from_slice(&order.u16_bytes(2));
        tiff[at + 2..at + 4].fill(0);
    }
    true
}

/// Set TIFF DPI without re-encoding the strips.
///
/// Existing resolution tags are overwritten in place. Otherwise the two
/// rationals and a copy of IFD0 carrying all three tags are appended, and the
/// header is pointed at the new IFD. Every other entry keeps its value or
/// value offset, so strip data is never moved.
pub fn write_tiff_dpi(data: &[u8], dpi: Dpi) -> Result<Vec<u8>, CodecError> {
    let malformed = || CodecError::Metadata("malformed TIFF header or IFD".into());
    let order = TiffOrder::of(data).ok_or_else(malformed)?;

    let mut out = data.to_vec();
    if patch_tiff_resolution(&mut out, dpi) {
        return Ok(out);
    }

    let (ifd, entries) = ifd0_entries(order, data).ok_or_else(malformed)?;
    let next_ifd = order
        .u32(data, ifd + 2 + entries.len() * 12)
        .ok_or_else(malformed)?;
    let offset = |at: usize| {
        u32::try_from(at).map_err(|_| CodecError::Metadata("TIFF output exceeds 4 GiB".into()))
    };

    // IFDs and rationals start on a word boundary.
    if out.len() % 2 == 1 {
        out.push(0);
    }
    let x_at = offset(out.len())?;
    let y_at = offset(out.len() + 8)?;
    for value in [dpi.x, dpi.y] {
        out.extend_from_slice(&order.u32_bytes(value));
        out.extend_from_slice(&order.u32_bytes(1));
    }

    let field = |tag: u16, typ: u16, value: [u8; 4]| {
        let mut raw = [0u8; 12];
        raw[0..2].copy_from_slice(&order.u16_bytes(tag));
        raw[2..4].copy_from_slice(&order.u16_bytes(typ));
        raw[4..8].copy_from_slice(&order.u32_bytes(1));
        raw[8..12].copy_from_slice(&value);
        (tag, raw)
    };
    let mut unit = [0u8; 4];
    unit[..2].copy_from_slice(&order.u16_bytes(2));

    let mut fields = entries
        .iter()
        .filter(|e| !matches!(e.tag, TAG_X_RESOLUTION | TAG_Y_RESOLUTION | TAG_RESOLUTION_UNIT))
        .map(|e| {
            let raw: [u8; 12] = data
                .get(e.offset..e.offset + 12)
                .and_then(|bytes| bytes.try_into().ok())
                .ok_or_else(malformed)?;
            Ok((e.tag, raw))
        })
        .collect::<Result<Vec<_>, CodecError>>()?;
    fields.push(field(TAG_X_RESOLUTION, TIFF_RATIONAL, order.u32_bytes(x_at)));
    fields.push(field(TAG_Y_RESOLUTION, TIFF_RATIONAL, order.u32_bytes(y_at)));
    fields.push(field(TAG_RESOLUTION_UNIT, TIFF_SHORT, unit));
    // Entries must be in ascending tag order.
    fields.sort_by_key(|(tag, _)| *tag);

    let new_ifd = offset(out.len())?;
    let count = u16::try_from(fields.len()).map_err(|_| malformed())?;
    out.extend_from_slice(&order.u16_bytes(count));
    for (_, raw) in &fields {
        out.extend_from_slice(raw);
    }
    out.extend_from_slice(&order.u32_bytes(next_ifd));
    out[4..8].copy_from_slice(&order.u32_bytes(new_ifd));
    Ok(out)
}

/// Minimal little-endian TIFF block holding only resolution tags.
///
/// Layout:
///   0   "II" 42 IFD0-offset=8
///   8   entry count = 3
///   10  XResolution    RATIONAL -> 50
///   22  YResolution    RATIONAL -> 58
///   34  ResolutionUnit SHORT = 2 (inch)
///   46  next IFD = 0
///   50  X rational, 58 Y rational
fn exif_resolution_block(dpi: Dpi) -> Vec<u8> {
    const X_VALUE: u32 = 50;
    const Y_VALUE: u32 = 58;

    let mut out = Vec::with_capacity(66);
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&3u16.to_le_bytes());

    let mut entry = |tag: u16, typ: u16, value: [u8; 4]| {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&typ.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&value);
    };
    entry(TAG_X_RESOLUTION, TIFF_RATIONAL, X_VALUE.to_le_bytes());
    entry(TAG_Y_RESOLUTION, TIFF_RATIONAL, Y_VALUE.to_le_bytes());
    entry(TAG_RESOLUTION_UNIT, TIFF_SHORT, [2, 0, 0, 0]);

    out.extend_from_slice(&0u32.to_le_bytes());
    for value in [dpi.x, dpi.y] {
        out.extend_from_slice(&value.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
    }
    out
}

// ---------------------------------------------------------------------------
// WebP: RIFF chunks, VP8X + EXIF
// ---------------------------------------------------------------------------

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const VP8X_FLAG_EXIF: u8 = 0x08;
const VP8X_FLAG_ALPHA: u8 = 0x10;

fn is_webp(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

struct Chunk<'a> {
    fourcc: [u8; 4],
    payload: &'a [u8],
}

fn parse_riff_chunks(data: &[u8]) -> Option<Vec<Chunk<'_>>> {
    if !is_webp(data) {
        return None;
    }
    let mut chunks = Vec::new();
    let mut pos = 12;
    while pos + 8 <= data.len() {
        let fourcc: [u8; 4] = data[pos..pos + 4].try_into().ok()?;
        let len = u32::from_le_bytes(data[pos + 4..pos + 8].try_into().ok()?) as usize;
        let payload = data.get(pos + 8..pos + 8 + len)?;
        chunks.push(Chunk { fourcc, payload });
        // Payloads are padded to even length.
        pos += 8 + len + (len % 2);
    }
    Some(chunks)
}

fn read_webp_exif(data: &[u8]) -> Option<Dpi> {
    let chunks = parse_riff_chunks(data)?;
    let exif = chunks.iter().find(|c| &c.fourcc == b"EXIF")?.payload;
    read_tiff_resolution(exif.strip_prefix(EXIF_HEADER).unwrap_or(exif))
}

/// Canvas size and alpha hint from the bitstream headers.
fn webp_frame_info(chunks: &[Chunk<'_>]) -> Option<(u32, u32, bool)> {
    let has_alph = chunks.iter().any(|c| &c.fourcc == b"ALPH");
    for chunk in chunks {
        match &chunk.fourcc {
            // Lossy: 3-byte frame tag, start code 9D 01 2A, then 14-bit dimensions.
            b"VP8 " => {
                let p = chunk.payload;
                if p.len() < 10 || p[3..6] != [0x9D, 0x01, 0x2A] {
                    return None;
                }
                let width = u32::from(u16::from_le_bytes([p[6], p[7]]) & 0x3FFF);
                let height = u32::from(u16::from_le_bytes([p[8], p[9]]) & 0x3FFF);
                if width == 0 || height == 0 {
                    return None;
                }
                return Some((width, height, has_alph));
            }
            // Lossless: signature 0x2F, then packed (w-1):14 (h-1):14 alpha:1 version:3.
            b"VP8L" => {
                let p = chunk.payload;
                if p.len() < 5 || p[0] != 0x2F {
                    return None;
                }
                let bits = u32::from_le_bytes([p[1], p[2], p[3], p[4]]);
                let width = (bits & 0x3FFF) + 1;
                let height = ((bits >> 14) & 0x3FFF) + 1;
                let alpha = (bits >> 28) & 1 == 1;
                return Some((width, height, alpha));
            }
            _ => {}
        }
    }
    None
}

/// VP8X header for a canvas; `None` for an empty one.
fn vp8x_payload(width: u32, height: u32, alpha: bool) -> Option<[u8; 10]> {
    let mut payload = [0u8; 10];
    payload[0] = VP8X_FLAG_EXIF | if alpha { VP8X_FLAG_ALPHA } else { 0 };
    payload[4..7].copy_from_slice(&width.checked_sub(1)?.to_le_bytes()[..3]);
    payload[7..10].copy_from_slice(&height.checked_sub(1)?.to_le_bytes()[..3]);
    Some(payload)
}

/// Set WebP DPI by (re)writing its EXIF chunk.
///
/// Any existing EXIF chunk is replaced, so rewriting twice with the same DPI
/// yields identical bytes.
pub fn write_webp_dpi(data: &[u8], dpi: Dpi) -> Result<Vec<u8>, CodecError> {
    let chunks = parse_riff_chunks(data)
        .ok_or_else(|| CodecError::Metadata("not a well-formed WebP RIFF container".into()))?;

    let vp8x: Vec<u8> = match chunks.first() {
        Some(first) if &first.fourcc == b"VP8X" && first.payload.len() >= 10 => {
            let mut payload = first.payload.to_vec();
            payload[0] |= VP8X_FLAG_EXIF;
            payload
        }
        _ => {
            webp_frame_info(&chunks)
                .and_then(|(width, height, alpha)| vp8x_payload(width, height, alpha))
                .ok_or_else(|| CodecError::Metadata("WebP bitstream header not recognised".into()))?
                .to_vec()
        }
    };
    let exif = exif_resolution_block(dpi);

    let mut body: Vec<([u8; 4], &[u8])> = vec![(*b"VP8X", vp8x.as_slice())];
    let mut exif_placed = false;
    for chunk in &chunks {
        match &chunk.fourcc {
            b"VP8X" | b"EXIF" => continue,
            b"XMP " if !exif_placed => {
                body.push((*b"EXIF", exif.as_slice()));
                exif_placed = true;
            }
            _ => {}
        }
        body.push((chunk.fourcc, chunk.payload));
    }
    if !exif_placed {
        body.push((*b"EXIF", exif.as_slice()));
    }

    let riff_len: usize = 4 + body
        .iter()
        .map(|(_, payload)| 8 + payload.len() + payload.len() % 2)
        .sum::<usize>();
    let riff_len = u32::try_from(riff_len)
        .map_err(|_| CodecError::Metadata("WebP output exceeds RIFF size limit".into()))?;

    let mut out = Vec::with_capacity(riff_len as usize + 8);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_len.to_le_bytes());
    out.extend_from_slice(b"WEBP");
    for (fourcc, payload) in body {
        out.extend_from_slice(&fourcc);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
    }
    Ok(out)
}
