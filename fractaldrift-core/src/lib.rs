pub mod angle;
pub mod clock;
pub mod config;
pub mod error;
pub mod half_float;
pub mod host_surface;
pub mod pixel_rect;
pub mod surface;
pub mod tiles;
pub mod view;

pub use angle::{shortest_angle_delta, unwrap_angle, wrap_angle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AnimationConfig, ComputeConfig, EscapeConfig, GovernorConfig, OverscanMode, PipelineConfig,
    PreviewConfig, StreakPolicy, SwapConfig, ZoomSafetyConfig,
};
pub use error::{ConfigError, SurfaceError};
pub use half_float::{decode_f16, encode_f16, HALF_INFINITY, HALF_NAN};
pub use host_surface::{HostSurface, HostSurfaceAllocator};
pub use pixel_rect::PixelRect;
pub use surface::{
    EscapeSample, EscapeSurface, PresentSurface, SurfaceAllocator, SurfaceFormat, SurfacePair,
    INSIDE_SET, UNCOMPUTED, UNCOMPUTED_THRESHOLD,
};
pub use tiles::{spiral_tile_order, TileGrid, TileScheduler, DEFAULT_SPIRAL_TIGHTNESS};
pub use view::{PlaneMapping, View};
