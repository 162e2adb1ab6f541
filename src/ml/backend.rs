// ============================================================
// Layer 5 — Compute Device Selection
// ============================================================
// The device is a configuration value, never a global. Use
// cases match on DeviceKind once and call a function generic
// over the backend:
//
//   cpu → NdArray   (pure Rust, always available)
//   gpu → Wgpu      (Vulkan / Metal / DX12 via wgpu)

use serde::{Deserialize, Serialize};

pub type CpuBackend = burn::backend::NdArray;
pub type GpuBackend = burn::backend::Wgpu;

pub type CpuAutodiff = burn::backend::Autodiff<CpuBackend>;
pub type GpuAutodiff = burn::backend::Autodiff<GpuBackend>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Cpu,
    Gpu,
}

pub fn cpu_device() -> burn::backend::ndarray::NdArrayDevice {
    burn::backend::ndarray::NdArrayDevice::Cpu
}

pub fn gpu_device() -> burn::backend::wgpu::WgpuDevice {
    burn::backend::wgpu::WgpuDevice::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_lowercase() {
        let kind: DeviceKind = serde_json::from_str("\"gpu\"").unwrap();
        assert_eq!(kind, DeviceKind::Gpu);
        assert_eq!(DeviceKind::default(), DeviceKind::Cpu);
    }
}
