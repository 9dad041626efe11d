use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use ndarray::Array2;
use tracing::debug;

use crate::error::{DriftscanError, Result};
use crate::field::{lattice_position, DisplacementField, DisplacementNode};
use crate::pipeline::types::{Product, ScenePair};
use crate::raster::{GeoTransform, RasterGrid, SceneMeta};

pub const PRODUCT_MAGIC: &[u8; 8] = b"DSPROD1\0";
// magic + kind + bands + extent + lattice spacing + geotransform
// + two timestamp slots + two scene-id fields.
pub const PRODUCT_HEADER_SIZE: usize = 8 + 1 + 1 + 4 + 4 + 4 + 4 + 48 + 2 * 9 + 2 * 64;

const NAME_FIELD_LEN: usize = 32;
const ID_FIELD_LEN: usize = 64;

const KIND_SCENE: u8 = 0;
const KIND_STACK: u8 = 1;
const KIND_FIELD: u8 = 2;

const BAND_MASTER: &str = "master";
const BAND_SLAVE: &str = "slave";
const BAND_OFFSET_AZ: &str = "offset_az";
const BAND_OFFSET_RG: &str = "offset_rg";
const BAND_VELOCITY: &str = "velocity";
const BAND_QUALITY: &str = "quality";

/// Reads and writes `.dsp` product containers: a fixed little-endian
/// header followed by named f32 bands, each with an optional validity
/// bitmap.
pub struct ProductStore;

impl ProductStore {
    pub fn new() -> Self {
        Self
    }

    pub fn write(&self, product: &Product, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut w = BufWriter::new(file);
        match product {
            Product::Scene(scene) => write_scene(&mut w, scene)?,
            Product::Stack(pair) => write_stack(&mut w, pair)?,
            Product::Field(field) => write_field(&mut w, field)?,
        }
        w.flush()?;
        debug!(path = %path.display(), kind = product.kind_name(), "product written");
        Ok(())
    }

    pub fn read(&self, path: &Path) -> Result<Product> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < PRODUCT_HEADER_SIZE {
            return Err(DriftscanError::InvalidProduct(format!(
                "{}: file too small for a product header",
                path.display()
            )));
        }
        if &mmap[0..8] != PRODUCT_MAGIC {
            return Err(DriftscanError::InvalidProduct(format!(
                "{}: missing DSPROD magic",
                path.display()
            )));
        }

        let header = parse_header(&mmap[..PRODUCT_HEADER_SIZE])?;
        let body = &mmap[PRODUCT_HEADER_SIZE..];
        let bands = parse_bands(body, &header, path)?;

        match header.kind {
            KIND_SCENE => decode_scene(&header, &bands, path),
            KIND_STACK => decode_stack(&header, &bands, path),
            KIND_FIELD => decode_field(&header, &bands, path),
            other => Err(DriftscanError::InvalidProduct(format!(
                "{}: unknown product kind {}",
                path.display(),
                other
            ))),
        }
    }

    /// Read a product that must be a single scene.
    pub fn read_scene(&self, path: &Path) -> Result<RasterGrid> {
        match self.read(path)? {
            Product::Scene(scene) => Ok(scene),
            other => Err(DriftscanError::InvalidProduct(format!(
                "{}: expected a scene product, found {}",
                path.display(),
                other.kind_name()
            ))),
        }
    }

    /// Read a product that must be a coregistered stack.
    pub fn read_stack(&self, path: &Path) -> Result<ScenePair> {
        match self.read(path)? {
            Product::Stack(pair) => Ok(pair),
            other => Err(DriftscanError::InvalidProduct(format!(
                "{}: expected a stack product, found {}",
                path.display(),
                other.kind_name()
            ))),
        }
    }
}

impl Default for ProductStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoded fixed header.
#[derive(Clone, Debug)]
pub struct ProductHeader {
    pub kind: u8,
    pub band_count: u8,
    pub width: u32,
    pub height: u32,
    pub az_spacing: u32,
    pub rg_spacing: u32,
    pub geo: GeoTransform,
    pub timestamps: [Option<u64>; 2],
    pub scene_ids: [String; 2],
}

impl ProductHeader {
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            KIND_SCENE => "scene",
            KIND_STACK => "stack",
            KIND_FIELD => "field",
            _ => "unknown",
        }
    }
}

/// Parse just the header of a product file, for inspection tools.
pub fn peek_header(path: &Path) -> Result<ProductHeader> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    if mmap.len() < PRODUCT_HEADER_SIZE || &mmap[0..8] != PRODUCT_MAGIC {
        return Err(DriftscanError::InvalidProduct(format!(
            "{}: not a driftscan product",
            path.display()
        )));
    }
    parse_header(&mmap[..PRODUCT_HEADER_SIZE])
}

fn write_header(w: &mut impl Write, header: &ProductHeader) -> Result<()> {
    w.write_all(PRODUCT_MAGIC)?;
    w.write_u8(header.kind)?;
    w.write_u8(header.band_count)?;
    w.write_u32::<LittleEndian>(header.width)?;
    w.write_u32::<LittleEndian>(header.height)?;
    w.write_u32::<LittleEndian>(header.az_spacing)?;
    w.write_u32::<LittleEndian>(header.rg_spacing)?;
    let geo = &header.geo;
    for value in [
        geo.origin_x,
        geo.pixel_width,
        geo.rotation_x,
        geo.origin_y,
        geo.rotation_y,
        geo.pixel_height,
    ] {
        w.write_f64::<LittleEndian>(value)?;
    }
    for slot in header.timestamps {
        w.write_u8(slot.is_some() as u8)?;
        w.write_u64::<LittleEndian>(slot.unwrap_or(0))?;
    }
    for id in &header.scene_ids {
        write_fixed_string(w, id, ID_FIELD_LEN)?;
    }
    Ok(())
}

fn parse_header(bytes: &[u8]) -> Result<ProductHeader> {
    let mut r = &bytes[8..];
    let kind = r.read_u8()?;
    let band_count = r.read_u8()?;
    let width = r.read_u32::<LittleEndian>()?;
    let height = r.read_u32::<LittleEndian>()?;
    let az_spacing = r.read_u32::<LittleEndian>()?;
    let rg_spacing = r.read_u32::<LittleEndian>()?;

    let mut coeffs = [0.0f64; 6];
    for coeff in &mut coeffs {
        *coeff = r.read_f64::<LittleEndian>()?;
    }
    let geo = GeoTransform {
        origin_x: coeffs[0],
        pixel_width: coeffs[1],
        rotation_x: coeffs[2],
        origin_y: coeffs[3],
        rotation_y: coeffs[4],
        pixel_height: coeffs[5],
    };

    let mut timestamps = [None; 2];
    for slot in &mut timestamps {
        let present = r.read_u8()? != 0;
        let value = r.read_u64::<LittleEndian>()?;
        *slot = present.then_some(value);
    }

    let mut scene_ids: [String; 2] = Default::default();
    for id in &mut scene_ids {
        *id = read_fixed_string(&mut r, ID_FIELD_LEN)?;
    }

    if width == 0 || height == 0 {
        return Err(DriftscanError::InvalidProduct(format!(
            "empty product extent {}x{}",
            width, height
        )));
    }

    Ok(ProductHeader {
        kind,
        band_count,
        width,
        height,
        az_spacing,
        rg_spacing,
        geo,
        timestamps,
        scene_ids,
    })
}

struct Band {
    name: String,
    samples: Array2<f32>,
    mask: Option<Array2<bool>>,
}

fn write_band(
    w: &mut impl Write,
    name: &str,
    samples: &Array2<f32>,
    mask: Option<&Array2<bool>>,
) -> Result<()> {
    write_fixed_string(w, name, NAME_FIELD_LEN)?;
    w.write_u8(mask.is_some() as u8)?;
    for &v in samples.iter() {
        w.write_f32::<LittleEndian>(v)?;
    }
    if let Some(mask) = mask {
        let mut byte = 0u8;
        let mut bit = 0u8;
        for &valid in mask.iter() {
            if valid {
                byte |= 1 << bit;
            }
            bit += 1;
            if bit == 8 {
                w.write_u8(byte)?;
                byte = 0;
                bit = 0;
            }
        }
        if bit > 0 {
            w.write_u8(byte)?;
        }
    }
    Ok(())
}

fn parse_bands(mut body: &[u8], header: &ProductHeader, path: &Path) -> Result<Vec<Band>> {
    let h = header.height as usize;
    let w = header.width as usize;
    let samples = h * w;
    let mut bands = Vec::with_capacity(header.band_count as usize);

    for _ in 0..header.band_count {
        let needed = NAME_FIELD_LEN + 1 + samples * 4;
        if body.len() < needed {
            return Err(DriftscanError::InvalidProduct(format!(
                "{}: truncated band data",
                path.display()
            )));
        }
        let name = read_fixed_string(&mut body, NAME_FIELD_LEN)?;
        let has_mask = body.read_u8()? != 0;

        let mut data = Vec::with_capacity(samples);
        for _ in 0..samples {
            data.push(body.read_f32::<LittleEndian>()?);
        }
        let samples_arr = Array2::from_shape_vec((h, w), data).map_err(|e| {
            DriftscanError::InvalidProduct(format!("{}: {}", path.display(), e))
        })?;

        let mask = if has_mask {
            let mask_bytes = samples.div_ceil(8);
            if body.len() < mask_bytes {
                return Err(DriftscanError::InvalidProduct(format!(
                    "{}: truncated validity bitmap",
                    path.display()
                )));
            }
            let mut flags = Vec::with_capacity(samples);
            for i in 0..samples {
                let byte = body[i / 8];
                flags.push(byte & (1 << (i % 8)) != 0);
            }
            body = &body[mask_bytes..];
            Some(Array2::from_shape_vec((h, w), flags).map_err(|e| {
                DriftscanError::InvalidProduct(format!("{}: {}", path.display(), e))
            })?)
        } else {
            None
        };

        bands.push(Band {
            name,
            samples: samples_arr,
            mask,
        });
    }
    Ok(bands)
}

fn write_scene(w: &mut impl Write, scene: &RasterGrid) -> Result<()> {
    let header = ProductHeader {
        kind: KIND_SCENE,
        band_count: 1,
        width: scene.width() as u32,
        height: scene.height() as u32,
        az_spacing: 0,
        rg_spacing: 0,
        geo: scene.geo,
        timestamps: [scene.meta.timestamp_us, None],
        scene_ids: [scene.meta.scene_id.clone(), String::new()],
    };
    write_header(w, &header)?;
    write_band(w, "amplitude", &scene.data, scene.mask.as_ref())
}

fn write_stack(w: &mut impl Write, pair: &ScenePair) -> Result<()> {
    let header = ProductHeader {
        kind: KIND_STACK,
        band_count: 2,
        width: pair.master.width() as u32,
        height: pair.master.height() as u32,
        az_spacing: 0,
        rg_spacing: 0,
        geo: pair.master.geo,
        timestamps: [pair.master.meta.timestamp_us, pair.slave.meta.timestamp_us],
        scene_ids: [
            pair.master.meta.scene_id.clone(),
            pair.slave.meta.scene_id.clone(),
        ],
    };
    write_header(w, &header)?;
    write_band(w, BAND_MASTER, &pair.master.data, pair.master.mask.as_ref())?;
    write_band(w, BAND_SLAVE, &pair.slave.data, pair.slave.mask.as_ref())
}

fn write_field(w: &mut impl Write, field: &DisplacementField) -> Result<()> {
    let rows = field.rows();
    let cols = field.cols();
    let header = ProductHeader {
        kind: KIND_FIELD,
        band_count: 4,
        width: cols as u32,
        height: rows as u32,
        az_spacing: field.az_spacing as u32,
        rg_spacing: field.rg_spacing as u32,
        geo: field.geo,
        timestamps: [None, None],
        scene_ids: ["velocity".to_string(), String::new()],
    };
    write_header(w, &header)?;

    let mut offset_az = Array2::<f32>::zeros((rows, cols));
    let mut offset_rg = Array2::<f32>::zeros((rows, cols));
    let mut velocity = Array2::<f32>::zeros((rows, cols));
    let mut quality = Array2::<f32>::zeros((rows, cols));
    let mut valid = Array2::<bool>::from_elem((rows, cols), false);
    for node in field.nodes() {
        let at = [node.az_index, node.rg_index];
        offset_az[at] = node.offset.0 as f32;
        offset_rg[at] = node.offset.1 as f32;
        velocity[at] = node.velocity as f32;
        quality[at] = node.quality as f32;
        valid[at] = node.valid;
    }

    write_band(w, BAND_OFFSET_AZ, &offset_az, Some(&valid))?;
    write_band(w, BAND_OFFSET_RG, &offset_rg, None)?;
    write_band(w, BAND_VELOCITY, &velocity, None)?;
    write_band(w, BAND_QUALITY, &quality, None)
}

fn decode_scene(header: &ProductHeader, bands: &[Band], path: &Path) -> Result<Product> {
    let band = bands.first().ok_or_else(|| {
        DriftscanError::InvalidProduct(format!("{}: scene product has no band", path.display()))
    })?;
    let mut scene = RasterGrid::new(
        band.samples.clone(),
        header.geo,
        SceneMeta {
            scene_id: header.scene_ids[0].clone(),
            timestamp_us: header.timestamps[0],
        },
    )?;
    scene.mask = band.mask.clone();
    Ok(Product::Scene(scene))
}

fn decode_stack(header: &ProductHeader, bands: &[Band], path: &Path) -> Result<Product> {
    let master = find_band(bands, BAND_MASTER, path)?;
    let slave = find_band(bands, BAND_SLAVE, path)?;

    let mut master_scene = RasterGrid::new(
        master.samples.clone(),
        header.geo,
        SceneMeta {
            scene_id: header.scene_ids[0].clone(),
            timestamp_us: header.timestamps[0],
        },
    )?;
    master_scene.mask = master.mask.clone();

    let mut slave_scene = RasterGrid::new(
        slave.samples.clone(),
        header.geo,
        SceneMeta {
            scene_id: header.scene_ids[1].clone(),
            timestamp_us: header.timestamps[1],
        },
    )?;
    slave_scene.mask = slave.mask.clone();

    Ok(Product::Stack(ScenePair::new(master_scene, slave_scene)))
}

fn decode_field(header: &ProductHeader, bands: &[Band], path: &Path) -> Result<Product> {
    if header.az_spacing == 0 || header.rg_spacing == 0 {
        return Err(DriftscanError::InvalidProduct(format!(
            "{}: field product missing lattice spacing",
            path.display()
        )));
    }
    let offset_az = find_band(bands, BAND_OFFSET_AZ, path)?;
    let offset_rg = find_band(bands, BAND_OFFSET_RG, path)?;
    let velocity = find_band(bands, BAND_VELOCITY, path)?;
    let quality = find_band(bands, BAND_QUALITY, path)?;
    let valid = offset_az.mask.as_ref().ok_or_else(|| {
        DriftscanError::InvalidProduct(format!(
            "{}: field product missing validity bitmap",
            path.display()
        ))
    })?;

    let rows = header.height as usize;
    let cols = header.width as usize;
    let az_spacing = header.az_spacing as usize;
    let rg_spacing = header.rg_spacing as usize;

    let mut nodes = Vec::with_capacity(rows * cols);
    for az_index in 0..rows {
        for rg_index in 0..cols {
            let at = [az_index, rg_index];
            nodes.push(DisplacementNode {
                az_index,
                rg_index,
                position: (
                    lattice_position(az_index, az_spacing),
                    lattice_position(rg_index, rg_spacing),
                ),
                offset: (offset_az.samples[at] as f64, offset_rg.samples[at] as f64),
                velocity: velocity.samples[at] as f64,
                quality: quality.samples[at] as f64,
                valid: valid[at],
            });
        }
    }

    Ok(Product::Field(DisplacementField::new(
        nodes, rows, cols, az_spacing, rg_spacing, header.geo,
    )))
}

fn find_band<'a>(bands: &'a [Band], name: &str, path: &Path) -> Result<&'a Band> {
    bands.iter().find(|b| b.name == name).ok_or_else(|| {
        DriftscanError::InvalidProduct(format!("{}: missing band '{}'", path.display(), name))
    })
}

fn write_fixed_string(w: &mut impl Write, s: &str, len: usize) -> Result<()> {
    let bytes = s.as_bytes();
    let to_write = bytes.len().min(len);
    w.write_all(&bytes[..to_write])?;
    for _ in to_write..len {
        w.write_all(&[0u8])?;
    }
    Ok(())
}

fn read_fixed_string(r: &mut &[u8], len: usize) -> Result<String> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(len);
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}
