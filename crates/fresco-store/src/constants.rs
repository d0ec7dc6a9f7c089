/// Side length of one tile in world pixels
pub const TILE_SIZE: i64 = 1024;

/// Minimum brush width in world units
pub const MIN_BRUSH_SIZE: f64 = 1.0;

/// Maximum brush width in world units
pub const MAX_BRUSH_SIZE: f64 = 128.0;

/// Brush width applied when a stroke carries none
pub const DEFAULT_BRUSH_SIZE: f64 = 12.0;

/// Opacity applied when a stroke carries none
pub const DEFAULT_OPACITY: f64 = 1.0;

/// Upper bound on total store size before eviction kicks in (1 GiB)
pub const DEFAULT_MAX_STORE_BYTES: u64 = 1024 * 1024 * 1024;

/// Fraction of rows removed per eviction pass
pub const EVICT_FRACTION: f64 = 0.1;

/// Gzip level for persisted stroke payloads
pub const DEFAULT_GZIP_LEVEL: u32 = 9;

/// Maximum tiles per HTTP batch request
pub const MAX_BATCH_HTTP: usize = 500;

/// Maximum tiles per streamed channel request
pub const MAX_BATCH_WS: usize = 1000;

/// Maximum peer display name length in characters
pub const MAX_NAME_LEN: usize = 24;
