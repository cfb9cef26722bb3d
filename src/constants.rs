// Constants module - centralized default values for configuration
//
// Defaults used by the config layer, the upload parser and the converter.
// Keeping them here avoids magic numbers scattered across modules.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address (all interfaces)
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 3008;

/// Environment variable that overrides the listen port
pub const PORT_ENV_VAR: &str = "PORT";

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

/// Default directory holding the client page
pub const DEFAULT_STATIC_DIR: &str = "public";

// =============================================================================
// Upload defaults
// =============================================================================

/// Default maximum uploaded file size (50 MB)
pub const DEFAULT_MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Extra bytes allowed on top of the file limit for multipart framing and
/// the small text fields sent alongside the image
pub const MULTIPART_OVERHEAD_ALLOWANCE: usize = 64 * 1024;

/// File extensions accepted by the upload layer (lowercase, no dot)
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "avif"];

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

// =============================================================================
// Conversion defaults
// =============================================================================

/// Quality used when the request carries no usable value
pub const DEFAULT_QUALITY: u8 = 80;

/// Largest accepted `maxWidth` value
pub const DEFAULT_MAX_WIDTH_LIMIT: u32 = 8000;

/// Sizes embedded in generated icons, largest first
pub const DEFAULT_ICON_SIZES: &[u32] = &[256, 128, 64, 48, 32, 24, 16];

/// Largest edge an ICO directory entry can describe
pub const MAX_ICON_SIZE: u32 = 256;

/// Largest AVIF frame decoded, in pixels (100 megapixels)
pub const MAX_DECODE_PIXELS: u64 = 100_000_000;

/// ravif speed preset (1 = slowest, 10 = fastest)
pub const AVIF_SPEED: u8 = 6;

/// PNG compression levels at or above this value get an extra oxipng pass
pub const PNG_OXIPNG_THRESHOLD: u8 = 7;

// =============================================================================
// Routes
// =============================================================================

/// Conversion endpoint
pub const CONVERT_PATH: &str = "/api/convert";

/// Liveness endpoint
pub const HEALTH_PATH: &str = "/health";

/// Prometheus metrics endpoint
pub const METRICS_PATH: &str = "/metrics";
