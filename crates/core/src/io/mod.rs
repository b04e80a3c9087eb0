//! Reading raster tiles and writing feature maps

mod native;

pub use native::{
    is_supported_tile, read_tile, read_tile_from_buffer, write_tiff, write_tiff_to_buffer,
    RasterTile, TileFormat, TILE_EXTENSIONS,
};
