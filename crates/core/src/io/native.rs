//! Native tile reading/writing
//!
//! TIFF tiles are decoded with the `tiff` crate, PNG and JPEG tiles with the
//! `image` crate. Every tile is reduced to a single gray band of `f64`
//! intensities; the original sample type is kept alongside for reporting.

use crate::error::{Error, Result};
use crate::raster::{Raster, RasterElement, SampleType};
use image::{DynamicImage, ImageFormat};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::ColorType;

/// File extensions accepted as raster tiles (matched case-insensitively)
pub const TILE_EXTENSIONS: [&str; 5] = ["tif", "tiff", "png", "jpg", "jpeg"];

/// Luma weights applied to color pixels (R, G, B)
const LUMA_WEIGHTS: [f64; 3] = [0.2125, 0.7154, 0.0721];

/// Container format of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
    Tiff,
    Png,
    Jpeg,
}

impl TileFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "tif" | "tiff" => Some(TileFormat::Tiff),
            "png" => Some(TileFormat::Png),
            "jpg" | "jpeg" => Some(TileFormat::Jpeg),
            _ => None,
        }
    }
}

/// Whether `path` carries one of the accepted tile extensions
pub fn is_supported_tile(path: &Path) -> bool {
    TileFormat::from_path(path).is_some()
}

/// A single-band tile read from disk
#[derive(Debug, Clone)]
pub struct RasterTile {
    /// Gray intensities
    pub raster: Raster<f64>,
    /// Sample type as stored in the file
    pub sample_type: SampleType,
}

impl RasterTile {
    pub fn width(&self) -> usize {
        self.raster.cols()
    }

    pub fn height(&self) -> usize {
        self.raster.rows()
    }

    /// Observed (min, max) over finite cells, `None` if there are none
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let stats = self.raster.statistics();
        stats.min.zip(stats.max)
    }
}

/// Read a tile into a gray `f64` raster.
///
/// Zero-byte files, unknown extensions and undecodable content all fail
/// with [`Error::ImageRead`].
pub fn read_tile<P: AsRef<Path>>(path: P) -> Result<RasterTile> {
    let path = path.as_ref();
    let format = TileFormat::from_path(path)
        .ok_or_else(|| Error::image_read(path, "unsupported file extension"))?;

    let meta = std::fs::metadata(path).map_err(|e| Error::image_read(path, e))?;
    if meta.len() == 0 {
        return Err(Error::image_read(path, "file is empty"));
    }

    let file = File::open(path).map_err(|e| Error::image_read(path, e))?;
    let reader = BufReader::new(file);
    let tile = match format {
        TileFormat::Tiff => decode_tiff(reader),
        TileFormat::Png | TileFormat::Jpeg => {
            image::ImageReader::with_format(reader, image_format(format))
                .decode()
                .map_err(|e| Error::Other(e.to_string()))
                .and_then(gray_from_image)
        }
    };
    tile.map_err(|e| Error::image_read(path, e))
}

/// Read a tile from an in-memory buffer
pub fn read_tile_from_buffer(data: &[u8], format: TileFormat) -> Result<RasterTile> {
    if data.is_empty() {
        return Err(Error::ImageRead {
            path: "<buffer>".into(),
            reason: "buffer is empty".into(),
        });
    }
    match format {
        TileFormat::Tiff => decode_tiff(Cursor::new(data)),
        TileFormat::Png | TileFormat::Jpeg => {
            image::load_from_memory_with_format(data, image_format(format))
                .map_err(|e| Error::Other(e.to_string()))
                .and_then(gray_from_image)
        }
    }
}

fn image_format(format: TileFormat) -> ImageFormat {
    match format {
        TileFormat::Tiff => ImageFormat::Tiff,
        TileFormat::Png => ImageFormat::Png,
        TileFormat::Jpeg => ImageFormat::Jpeg,
    }
}

fn gray_from_image(img: DynamicImage) -> Result<RasterTile> {
    let rows = img.height() as usize;
    let cols = img.width() as usize;

    let (data, sample_type): (Vec<f64>, SampleType) = match img {
        DynamicImage::ImageLuma8(buf) => {
            (buf.into_raw().into_iter().map(f64::from).collect(), SampleType::U8)
        }
        DynamicImage::ImageLuma16(buf) => {
            (buf.into_raw().into_iter().map(f64::from).collect(), SampleType::U16)
        }
        other => {
            let color = other.color();
            let bits = color.bits_per_pixel() / color.channel_count() as u16;
            let sample_type = match bits {
                8 => SampleType::U8,
                16 => SampleType::U16,
                _ => SampleType::F32,
            };
            // float luma in [0, 1], no rounding before quantization
            let luma = other
                .to_rgb32f()
                .pixels()
                .map(|px| {
                    let [r, g, b] = px.0.map(f64::from);
                    LUMA_WEIGHTS[0] * r + LUMA_WEIGHTS[1] * g + LUMA_WEIGHTS[2] * b
                })
                .collect();
            (luma, sample_type)
        }
    };

    Ok(RasterTile {
        raster: Raster::from_vec(data, rows, cols)?,
        sample_type,
    })
}

/// Decode a TIFF from any `Read + Seek` source, collapsing samples to gray
fn decode_tiff<R>(reader: R) -> Result<RasterTile>
where
    R: std::io::Read + std::io::Seek,
{
    let mut decoder = Decoder::new(reader)
        .map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;

    let samples = match decoder
        .colortype()
        .map_err(|e| Error::Other(format!("Cannot read color type: {}", e)))?
    {
        ColorType::Gray(_) => 1,
        ColorType::GrayA(_) => 2,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) => 4,
        other => {
            return Err(Error::UnsupportedDataType(format!(
                "TIFF color type {:?}",
                other
            )))
        }
    };

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let (values, sample_type) = match result {
        DecodingResult::U8(buf) => (cast_all(&buf), SampleType::U8),
        DecodingResult::U16(buf) => (cast_all(&buf), SampleType::U16),
        DecodingResult::U32(buf) => (cast_all(&buf), SampleType::U32),
        DecodingResult::U64(buf) => (cast_all(&buf), SampleType::U64),
        DecodingResult::I8(buf) => (cast_all(&buf), SampleType::I8),
        DecodingResult::I16(buf) => (cast_all(&buf), SampleType::I16),
        DecodingResult::I32(buf) => (cast_all(&buf), SampleType::I32),
        DecodingResult::I64(buf) => (cast_all(&buf), SampleType::I64),
        DecodingResult::F32(buf) => (cast_all(&buf), SampleType::F32),
        DecodingResult::F64(buf) => (cast_all(&buf), SampleType::F64),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if values.len() != rows * cols * samples {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let data: Vec<f64> = match samples {
        1 => values,
        2 => values.chunks_exact(2).map(|px| px[0]).collect(),
        _ => values
            .chunks_exact(samples)
            .map(|px| {
                LUMA_WEIGHTS[0] * px[0] + LUMA_WEIGHTS[1] * px[1] + LUMA_WEIGHTS[2] * px[2]
            })
            .collect(),
    };

    Ok(RasterTile {
        raster: Raster::from_vec(data, rows, cols)?,
        sample_type,
    })
}

fn cast_all<S: num_traits::NumCast + Copy>(buf: &[S]) -> Vec<f64> {
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f64::NAN))
        .collect()
}

/// Write a raster to a single-band 32-bit float TIFF
pub fn write_tiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_tiff(raster, file)
}

/// Write a raster to an in-memory TIFF buffer
pub fn write_tiff_to_buffer<T: RasterElement>(raster: &Raster<T>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_tiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_tiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    encoder
        .write_image::<Gray32Float>(cols as u32, rows as u32, &data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}
