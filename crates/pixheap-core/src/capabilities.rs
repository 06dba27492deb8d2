#![forbid(unsafe_code)]

//! Surface capability probing.
//!
//! Probing answers one question: which kinds of pixel surface could be
//! opened right now? The answer is a [`CapabilitySet`] that backend
//! selection uses to skip candidates that cannot possibly work.
//!
//! # Detection Strategy
//!
//! | Signal | Capability |
//! |--------|------------|
//! | always | `SOFTWARE` |
//! | `WAYLAND_DISPLAY` or `DISPLAY` set, or a desktop OS | `WINDOWED` |
//! | `/dev/fb0` present | `RAW_DEVICE` |
//! | `PIXHEAP_GPU` set to `1`/`true` | `GPU_ACCELERATED` |
//! | `PIXHEAP_BACKEND=gpu,device,...` | replaces everything above |
//!
//! # Invariants
//!
//! 1. **Software is always usable** unless an explicit override omits it.
//! 2. **Detection determinism**: the same [`ProbeInputs`] always produce the
//!    same set. All environment access happens in [`ProbeInputs::from_env`].
//! 3. **Probing never opens a surface**; a capability is a hint, and
//!    selection still falls back if opening fails.

use std::env;
use std::path::Path;

use crate::backend::BackendKind;

/// Default raw framebuffer device node.
const FRAMEBUFFER_DEVICE: &str = "/dev/fb0";

bitflags::bitflags! {
    /// Surface kinds that are usable in the current environment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CapabilitySet: u8 {
        /// In-memory software surface.
        const SOFTWARE        = 0b0001;
        /// A window on a desktop compositor.
        const WINDOWED        = 0b0010;
        /// A raw framebuffer device.
        const RAW_DEVICE      = 0b0100;
        /// A GPU-accelerated surface.
        const GPU_ACCELERATED = 0b1000;
    }
}

impl CapabilitySet {
    /// Capability flag that a backend kind requires.
    #[inline]
    pub const fn for_kind(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Software => Self::SOFTWARE,
            BackendKind::Windowed => Self::WINDOWED,
            BackendKind::Device => Self::RAW_DEVICE,
            BackendKind::Gpu => Self::GPU_ACCELERATED,
        }
    }

    /// Whether a backend of `kind` may be attempted.
    #[inline]
    pub const fn supports(&self, kind: BackendKind) -> bool {
        self.contains(Self::for_kind(kind))
    }

    /// Parse an override list such as `"gpu,software"`.
    ///
    /// Unknown names are ignored. Returns `None` if nothing recognizable was
    /// listed.
    pub fn parse_override(list: &str) -> Option<Self> {
        let set = list
            .split(',')
            .filter_map(|name| name.trim().parse::<BackendKind>().ok())
            .fold(Self::empty(), |acc, kind| acc | Self::for_kind(kind));
        (!set.is_empty()).then_some(set)
    }
}

/// Raw signals gathered from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeInputs {
    /// `WAYLAND_DISPLAY` is set.
    pub wayland_display: bool,
    /// `DISPLAY` is set.
    pub x11_display: bool,
    /// Running on an OS that always has a compositor (macOS, Windows).
    pub desktop_os: bool,
    /// The framebuffer device node exists.
    pub framebuffer_device: bool,
    /// `PIXHEAP_GPU` requests a GPU surface.
    pub gpu_requested: bool,
    /// Contents of `PIXHEAP_BACKEND`, if set.
    pub backend_override: Option<String>,
}

impl ProbeInputs {
    /// Gather inputs from the environment and filesystem.
    pub fn from_env() -> Self {
        Self {
            wayland_display: env::var_os("WAYLAND_DISPLAY").is_some(),
            x11_display: env::var_os("DISPLAY").is_some(),
            desktop_os: cfg!(any(target_os = "macos", target_os = "windows")),
            framebuffer_device: Path::new(FRAMEBUFFER_DEVICE).exists(),
            gpu_requested: env::var("PIXHEAP_GPU")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            backend_override: env::var("PIXHEAP_BACKEND").ok(),
        }
    }

    /// Inputs describing a headless machine with nothing but software.
    pub fn headless() -> Self {
        Self::default()
    }
}

/// Probe the current environment.
pub fn probe_capabilities() -> CapabilitySet {
    detect_from_inputs(&ProbeInputs::from_env())
}

/// Derive the capability set from already-gathered inputs.
pub fn detect_from_inputs(inputs: &ProbeInputs) -> CapabilitySet {
    if let Some(set) = inputs
        .backend_override
        .as_deref()
        .and_then(CapabilitySet::parse_override)
    {
        #[cfg(feature = "tracing")]
        tracing::debug!(?set, "capability probe overridden by PIXHEAP_BACKEND");
        return set;
    }

    let mut set = CapabilitySet::SOFTWARE;
    if inputs.wayland_display || inputs.x11_display || inputs.desktop_os {
        set |= CapabilitySet::WINDOWED;
    }
    if inputs.framebuffer_device {
        set |= CapabilitySet::RAW_DEVICE;
    }
    if inputs.gpu_requested {
        set |= CapabilitySet::GPU_ACCELERATED;
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(?set, "surface capabilities probed");
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_is_software_only() {
        assert_eq!(
            detect_from_inputs(&ProbeInputs::headless()),
            CapabilitySet::SOFTWARE
        );
    }

    #[test]
    fn display_enables_windowed() {
        let inputs = ProbeInputs {
            wayland_display: true,
            ..ProbeInputs::default()
        };
        let caps = detect_from_inputs(&inputs);
        assert!(caps.supports(BackendKind::Windowed));
        assert!(caps.supports(BackendKind::Software));
        assert!(!caps.supports(BackendKind::Gpu));
    }

    #[test]
    fn framebuffer_and_gpu_flags() {
        let inputs = ProbeInputs {
            framebuffer_device: true,
            gpu_requested: true,
            ..ProbeInputs::default()
        };
        let caps = detect_from_inputs(&inputs);
        assert!(caps.supports(BackendKind::Device));
        assert!(caps.supports(BackendKind::Gpu));
        assert!(!caps.supports(BackendKind::Windowed));
    }

    #[test]
    fn override_replaces_probe() {
        let inputs = ProbeInputs {
            x11_display: true,
            framebuffer_device: true,
            backend_override: Some("gpu, bogus".into()),
            ..ProbeInputs::default()
        };
        assert_eq!(
            detect_from_inputs(&inputs),
            CapabilitySet::GPU_ACCELERATED
        );
    }

    #[test]
    fn unrecognized_override_is_ignored() {
        let inputs = ProbeInputs {
            backend_override: Some("nonsense".into()),
            ..ProbeInputs::default()
        };
        assert_eq!(detect_from_inputs(&inputs), CapabilitySet::SOFTWARE);
    }

    #[test]
    fn detection_is_deterministic() {
        let inputs = ProbeInputs {
            x11_display: true,
            gpu_requested: true,
            ..ProbeInputs::default()
        };
        assert_eq!(detect_from_inputs(&inputs), detect_from_inputs(&inputs));
    }

    #[test]
    fn probe_does_not_panic() {
        let caps = probe_capabilities();
        assert!(!caps.is_empty());
    }
}
