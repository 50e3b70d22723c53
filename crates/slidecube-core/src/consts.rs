/// Substring marking a series that opens a new acquisition (slide scanner
/// naming convention, e.g. `"sample.vsi #2"`).
pub const SCAN_MARKER: &str = " #";

/// Name markers for auxiliary (non-pyramid) images: thumbnails, slide labels
/// and overview shots. Matching series get acquisition group 0.
pub const AUX_MARKERS: [&str; 3] = ["label", "overview", "macro image"];

/// Layer-name prefixes recognised by the modality filter, in the order
/// (ppl, xpl, reflected).
pub const MODALITY_PREFIXES: [&str; 3] = ["ppl", "xpl", "RL BF"];

/// Nominal tile edge used when the caller does not choose one.
pub const DEFAULT_TILE_SIZE: usize = 512;

/// Channel count for optical microscopy sources (interleaved RGB).
pub const COLOR_CHANNEL_COUNT: usize = 3;

/// Working width of the thumbnail used for percentile threshold estimation.
pub const RESCALE_TARGET_WIDTH: usize = 5000;

/// Quantisation depth for percentile histograms (16-bit domain).
pub const RESCALE_BIT_PRECISION: u32 = 16;

/// Dimension order written into every assembled output.
pub const OUTPUT_DIMENSION_ORDER: &str = "XYCZT";

/// Per-worker decode budget when the caller does not size one (bytes).
pub const DEFAULT_WORKER_MEMORY_BYTES: usize = 512 * 1024 * 1024;
