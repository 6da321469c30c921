use candle_core::Device;
use tracing::info;

pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(dev) => {
                info!("Embedding device: Metal (MPS)");
                return dev;
            }
            Err(e) => tracing::warn!("Metal unavailable, falling back to CPU: {e}"),
        }
    }
    info!("Embedding device: CPU");
    Device::Cpu
}
