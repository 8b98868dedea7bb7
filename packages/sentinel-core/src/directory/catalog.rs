//! Static fallback catalog used while the camera directory is unreachable.

use super::CameraRecord;
use crate::protocol_constants::{DEFAULT_INDUSTRY, DEFAULT_STREAM_LOCATOR, DEFAULT_ZONE};

/// Cameras known without asking the directory.
#[derive(Debug, Clone)]
pub struct FallbackCatalog {
    cameras: Vec<CameraRecord>,
}

impl FallbackCatalog {
    pub fn new(cameras: Vec<CameraRecord>) -> Self {
        Self { cameras }
    }

    /// A small fixed site layout covering every industry.
    pub fn builtin() -> Self {
        let entries = [
            ("CAM-0001", "Rig Platform A Cam 1", "Rig Platform A", "oil_gas", 101),
            ("CAM-0002", "Pipeline Sector 7 Cam 2", "Pipeline Sector 7", "oil_gas", 102),
            ("CAM-0003", "Tank Farm Cam 3", "Tank Farm", "oil_gas", 103),
            ("CAM-0004", "Loading Dock A Cam 4", "Loading Dock A", "warehouse", 104),
            ("CAM-0005", "Storage Bay 1 Cam 5", "Storage Bay 1", "warehouse", 105),
            ("CAM-0006", "Cold Storage Cam 6", "Cold Storage", "warehouse", 106),
            ("CAM-0007", "Transit Hub Cam 7", "Transit Hub", "smart_city", 107),
            ("CAM-0008", "Downtown Core Cam 8", "Downtown Core", "smart_city", 108),
        ];
        let cameras = entries
            .into_iter()
            .enumerate()
            .map(|(i, (id, name, zone, industry, host))| {
                CameraRecord::new(
                    id,
                    name,
                    zone,
                    industry,
                    format!("rtsp://192.168.10.{host}:554/stream{}", i + 1),
                )
            })
            .collect();
        Self { cameras }
    }

    pub fn get(&self, camera_id: &str) -> Option<&CameraRecord> {
        self.cameras.iter().find(|c| c.id == camera_id)
    }

    pub fn cameras(&self) -> &[CameraRecord] {
        &self.cameras
    }

    /// Catalog entry for the id, or a synthesized placeholder record.
    pub fn resolve(&self, camera_id: &str) -> CameraRecord {
        self.get(camera_id)
            .cloned()
            .unwrap_or_else(|| Self::placeholder(camera_id))
    }

    /// Record for a camera known to neither the directory nor the catalog.
    pub fn placeholder(camera_id: &str) -> CameraRecord {
        CameraRecord::new(
            camera_id,
            format!("Camera {camera_id}"),
            DEFAULT_ZONE,
            DEFAULT_INDUSTRY,
            DEFAULT_STREAM_LOCATOR,
        )
    }
}

impl Default for FallbackCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_covers_all_industries() {
        let catalog = FallbackCatalog::builtin();
        for industry in ["oil_gas", "warehouse", "smart_city"] {
            assert!(catalog.cameras().iter().any(|c| c.industry == industry));
        }
    }

    #[test]
    fn resolve_prefers_catalog_entry() {
        let record = FallbackCatalog::builtin().resolve("CAM-0004");
        assert_eq!(record.zone, "Loading Dock A");
        assert_eq!(record.stream_url, "rtsp://192.168.10.104:554/stream4");
    }

    #[test]
    fn resolve_unknown_id_synthesizes_placeholder() {
        let record = FallbackCatalog::new(vec![]).resolve("CAM-0500");
        assert_eq!(record.id, "CAM-0500");
        assert_eq!(record.name, "Camera CAM-0500");
        assert_eq!(record.zone, "Default Zone");
        assert_eq!(record.industry, "Security");
        assert_eq!(record.stream_url, DEFAULT_STREAM_LOCATOR);
    }
}
