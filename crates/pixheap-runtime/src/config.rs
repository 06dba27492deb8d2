#![forbid(unsafe_code)]

//! Context configuration.
//!
//! [`HeapConfig`] is a plain value with `with_*` builders. Defaults describe
//! an 800x600 software-or-better surface refreshed at 60 Hz with a
//! 256-slot table, a header, and no integrity trailer.
//!
//! # Environment overrides
//!
//! [`HeapConfig::from_env`] starts from the defaults and applies:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `PIXHEAP_WIDTH` / `PIXHEAP_HEIGHT` | surface size |
//! | `PIXHEAP_MODE` | `software`, `hardware`, or `auto` |
//! | `PIXHEAP_REFRESH_HZ` | presenter rate (`0` disables the thread) |
//! | `PIXHEAP_INTEGRITY` | `1`/`true` enables trailers |
//! | `PIXHEAP_TABLE_CAPACITY` | allocation table slots |
//! | `PIXHEAP_SHUTDOWN_TIMEOUT_MS` | presenter join timeout |
//!
//! A value that does not parse is a [`HeapError::Configuration`], not a
//! silent fallback.

use std::str::FromStr;
use std::time::Duration;

use pixheap_core::capabilities::CapabilitySet;
use pixheap_core::color::Palette;
use pixheap_core::error::{HeapError, Result};
use pixheap_core::geometry::{CellGrid, CellLayout, SurfaceSize};
use pixheap_render::header::HEADER_CELLS;

use crate::allocator::DEFAULT_TABLE_CAPACITY;

/// Default presenter rate.
pub const DEFAULT_REFRESH_HZ: u32 = 60;

/// Highest accepted presenter rate.
pub const MAX_REFRESH_HZ: u32 = 1000;

/// Default bound on waiting for the presenter to exit.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Which backends a context may open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SurfaceMode {
    /// Only the in-memory software surface.
    Software,
    /// Only hardware-backed surfaces; never falls back to software.
    Hardware,
    /// Most capable available surface, software as the last resort.
    #[default]
    Auto,
}

impl SurfaceMode {
    /// Restrict a probed capability set to what this mode allows.
    pub fn restrict(self, caps: CapabilitySet) -> CapabilitySet {
        match self {
            Self::Software => caps & CapabilitySet::SOFTWARE,
            Self::Hardware => caps - CapabilitySet::SOFTWARE,
            Self::Auto => caps,
        }
    }
}

impl FromStr for SurfaceMode {
    type Err = HeapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "software" | "soft" => Ok(Self::Software),
            "hardware" | "hw" => Ok(Self::Hardware),
            "auto" => Ok(Self::Auto),
            other => Err(HeapError::Configuration(format!(
                "unknown surface mode {other:?}"
            ))),
        }
    }
}

/// Configuration for [`Context::init`](crate::Context::init).
#[derive(Debug, Clone, PartialEq)]
pub struct HeapConfig {
    /// Backend policy.
    pub mode: SurfaceMode,
    /// Surface size in pixels.
    pub size: SurfaceSize,
    /// Cell spacing.
    pub layout: CellLayout,
    /// Reference colors.
    pub palette: Palette,
    /// Presenter rate in Hz; `0` disables the presenter thread.
    pub refresh_hz: u32,
    /// Seal every allocation with an integrity trailer.
    pub integrity: bool,
    /// Reserve and write the self-describing header at cell 0.
    pub header: bool,
    /// Allocation table slots.
    pub table_capacity: u16,
    /// How long `cleanup` waits for the presenter to exit.
    pub shutdown_timeout: Duration,
    /// Capability set to use instead of probing the environment.
    pub capabilities: Option<CapabilitySet>,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            mode: SurfaceMode::Auto,
            size: SurfaceSize::new(800, 600),
            layout: CellLayout::DEFAULT,
            palette: Palette::DEFAULT,
            refresh_hz: DEFAULT_REFRESH_HZ,
            integrity: false,
            header: true,
            table_capacity: DEFAULT_TABLE_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            capabilities: None,
        }
    }
}

impl HeapConfig {
    /// Default configuration for a `width x height` surface.
    pub fn new(width: u16, height: u16) -> Self {
        Self::default().with_size(width, height)
    }

    /// Set the backend policy.
    #[must_use]
    pub fn with_mode(mut self, mode: SurfaceMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the surface size.
    #[must_use]
    pub fn with_size(mut self, width: u16, height: u16) -> Self {
        self.size = SurfaceSize::new(width, height);
        self
    }

    /// Set the cell layout.
    #[must_use]
    pub fn with_layout(mut self, layout: CellLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Set the palette.
    #[must_use]
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Set the presenter rate; `0` disables the presenter thread.
    #[must_use]
    pub fn with_refresh_hz(mut self, hz: u32) -> Self {
        self.refresh_hz = hz;
        self
    }

    /// Enable or disable integrity trailers.
    #[must_use]
    pub fn with_integrity(mut self, integrity: bool) -> Self {
        self.integrity = integrity;
        self
    }

    /// Enable or disable the header region.
    #[must_use]
    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    /// Set the number of allocation table slots.
    #[must_use]
    pub fn with_table_capacity(mut self, slots: u16) -> Self {
        self.table_capacity = slots;
        self
    }

    /// Set the presenter join timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Use `caps` instead of probing the environment.
    #[must_use]
    pub fn with_capabilities(mut self, caps: CapabilitySet) -> Self {
        self.capabilities = Some(caps);
        self
    }

    /// Cells reserved ahead of the first allocation.
    #[inline]
    pub const fn reserved_cells(&self) -> u32 {
        if self.header { HEADER_CELLS as u32 } else { 0 }
    }

    /// Interval between presenter frames, or `None` when disabled.
    pub fn frame_interval(&self) -> Option<Duration> {
        (self.refresh_hz > 0).then(|| Duration::from_secs(1) / self.refresh_hz)
    }

    /// Check every field and resolve the cell grid.
    pub fn validate(&self) -> Result<CellGrid> {
        self.size.validate()?;
        let grid = CellGrid::new(self.size, self.layout)?;
        if !self.palette.is_unambiguous() {
            return Err(HeapError::Configuration("palette is ambiguous".into()));
        }
        if self.refresh_hz > MAX_REFRESH_HZ {
            return Err(HeapError::Configuration(format!(
                "refresh rate {} Hz above {MAX_REFRESH_HZ} Hz",
                self.refresh_hz
            )));
        }
        if self.table_capacity == 0 {
            return Err(HeapError::Configuration(
                "allocation table capacity must be >= 1".into(),
            ));
        }
        if self.reserved_cells() >= grid.capacity() {
            return Err(HeapError::Configuration(format!(
                "surface holds {} cells, too few for the {}-cell header",
                grid.capacity(),
                self.reserved_cells()
            )));
        }
        Ok(grid)
    }

    /// Defaults with overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(w) = parse_var::<u16>(&lookup, "PIXHEAP_WIDTH")? {
            self.size.width = w;
        }
        if let Some(h) = parse_var::<u16>(&lookup, "PIXHEAP_HEIGHT")? {
            self.size.height = h;
        }
        if let Some(mode) = lookup("PIXHEAP_MODE") {
            self.mode = mode.parse()?;
        }
        if let Some(hz) = parse_var::<u32>(&lookup, "PIXHEAP_REFRESH_HZ")? {
            self.refresh_hz = hz;
        }
        if let Some(flag) = lookup("PIXHEAP_INTEGRITY") {
            self.integrity = parse_flag("PIXHEAP_INTEGRITY", &flag)?;
        }
        if let Some(slots) = parse_var::<u16>(&lookup, "PIXHEAP_TABLE_CAPACITY")? {
            self.table_capacity = slots;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "PIXHEAP_SHUTDOWN_TIMEOUT_MS")? {
            self.shutdown_timeout = Duration::from_millis(ms);
        }
        Ok(self)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| {
                HeapError::Configuration(format!("{key}={raw:?} is not a valid number"))
            })
        })
        .transpose()
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HeapError::Configuration(format!(
            "{key}={raw:?} is not a boolean"
        ))),
    }
}
