use crate::error::{Result, SlidecubeError};

/// Number of tile columns and rows covering an image extent.
///
/// `ceil(size / tile)` in both axes; the last column/row may be partial.
pub fn tile_grid(
    size_x: usize,
    size_y: usize,
    tile_size_x: usize,
    tile_size_y: usize,
) -> Result<(usize, usize)> {
    if size_x == 0 || size_y == 0 {
        return Err(SlidecubeError::InvalidDimensions {
            width: size_x,
            height: size_y,
        });
    }
    if tile_size_x == 0 || tile_size_y == 0 {
        return Err(SlidecubeError::InvalidDimensions {
            width: tile_size_x,
            height: tile_size_y,
        });
    }
    let n_x = size_x.div_ceil(tile_size_x);
    let n_y = size_y.div_ceil(tile_size_y);
    Ok((n_x, n_y))
}

/// Pixel origin of the tile at `grid_index` along one axis.
pub fn tile_origin(grid_index: usize, tile_size: usize) -> usize {
    grid_index * tile_size
}

/// Effective size of the tile at `grid_index` along one axis.
///
/// Boundary tiles shrink to `extent - origin`; interior tiles keep the
/// nominal size. Never larger than nominal, never zero for a valid index.
pub fn effective_size(grid_index: usize, tile_size: usize, extent: usize) -> usize {
    let origin = tile_origin(grid_index, tile_size);
    if origin + tile_size >= extent {
        extent.saturating_sub(origin)
    } else {
        tile_size
    }
}
