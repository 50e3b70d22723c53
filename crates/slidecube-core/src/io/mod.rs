pub mod codec;
pub mod ome;
pub mod pyramid;
pub mod tiff;
