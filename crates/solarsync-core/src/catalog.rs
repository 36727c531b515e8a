//! Resolution of configured sites to their active sub-meters.

use std::collections::BTreeMap;

use tracing::{debug, info};

use solarsync_types::Device;

use crate::api::{AccessToken, MeteringApi};
use crate::config::ApiConfig;
use crate::error::Result;

/// Resolves which sensors take part in sync and what they are called.
///
/// Nothing is cached: every call authenticates once and lists every
/// configured site again.
pub struct DeviceCatalog<'a, A: ?Sized> {
    api: &'a A,
    config: &'a ApiConfig,
}

impl<'a, A: MeteringApi + ?Sized> DeviceCatalog<'a, A> {
    /// Create a catalog over `api` for the sites in `config`.
    pub fn new(api: &'a A, config: &'a ApiConfig) -> Self {
        Self { api, config }
    }

    /// Map every active sub-meter id to its display name.
    ///
    /// Ids are assumed unique across sites; if one repeats, the site listed
    /// last in the configuration wins.
    pub async fn resolve_active_devices(&self) -> Result<BTreeMap<String, String>> {
        let (_, devices) = self.sub_meters().await?;
        Ok(devices
            .into_iter()
            .map(|d| (d.device_id, d.display_name))
            .collect())
    }

    /// Authenticate and return the token with every sub-meter of every site.
    ///
    /// Devices are returned in site order, then in the order the upstream
    /// listed them. A repeated id keeps only its last occurrence.
    pub async fn sub_meters(&self) -> Result<(AccessToken, Vec<Device>)> {
        let token = self.api.login().await?;

        let mut devices: Vec<Device> = Vec::new();
        for site_id in &self.config.site_ids {
            let sensors = self.api.list_sensors(&token, site_id).await?;
            let total = sensors.len();

            let mut kept = 0;
            for device in sensors.into_iter().filter(Device::is_sub_meter) {
                devices.retain(|d| d.device_id != device.device_id);
                devices.push(device);
                kept += 1;
            }
            debug!("Site {}: {} of {} sensors are sub-meters", site_id, kept, total);
        }

        info!(
            "Resolved {} sub-meter(s) across {} site(s)",
            devices.len(),
            self.config.site_ids.len()
        );
        Ok((token, devices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockApi;
    use solarsync_types::DeviceKind;

    fn config(sites: &[&str]) -> ApiConfig {
        ApiConfig {
            site_ids: sites.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_keeps_only_sub_meters() {
        let api = MockApi::new();
        api.add_sensor("site-1", "a", "Heat pump", DeviceKind::SubMeter);
        api.add_sensor("site-1", "grid", "Grid", DeviceKind::PrimaryMeter);
        api.add_sensor("site-1", "inv", "Inverter", DeviceKind::Other);
        api.add_sensor("site-2", "b", "Garage", DeviceKind::SubMeter);

        let config = config(&["site-1", "site-2"]);
        let names = DeviceCatalog::new(&api, &config)
            .resolve_active_devices()
            .await
            .unwrap();

        assert_eq!(names.len(), 2);
        assert_eq!(names["a"], "Heat pump");
        assert_eq!(names["b"], "Garage");
        assert_eq!(api.login_count(), 1);
        assert_eq!(api.list_sensor_calls(), vec!["site-1", "site-2"]);
    }

    #[tokio::test]
    async fn test_duplicate_id_last_site_wins() {
        let api = MockApi::new();
        api.add_sensor("site-1", "dup", "First", DeviceKind::SubMeter);
        api.add_sensor("site-2", "dup", "Second", DeviceKind::SubMeter);

        let config = config(&["site-1", "site-2"]);
        let (_, devices) = DeviceCatalog::new(&api, &config).sub_meters().await.unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].display_name, "Second");
        assert_eq!(devices[0].site_id, "site-2");
    }

    #[tokio::test]
    async fn test_no_caching_between_calls() {
        let api = MockApi::new();
        api.add_sensor("site-1", "a", "A", DeviceKind::SubMeter);
        let config = config(&["site-1"]);
        let catalog = DeviceCatalog::new(&api, &config);

        catalog.resolve_active_devices().await.unwrap();
        catalog.resolve_active_devices().await.unwrap();

        assert_eq!(api.login_count(), 2);
        assert_eq!(api.list_sensor_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_stops_before_listing() {
        let api = MockApi::new();
        api.add_sensor("site-1", "a", "A", DeviceKind::SubMeter);
        api.fail_login("bad credentials");

        let config = config(&["site-1"]);
        let err = DeviceCatalog::new(&api, &config)
            .resolve_active_devices()
            .await
            .unwrap_err();

        assert!(err.is_auth());
        assert!(api.list_sensor_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_site_yields_no_devices() {
        let api = MockApi::new();
        let config = config(&["nowhere"]);
        let names = DeviceCatalog::new(&api, &config)
            .resolve_active_devices()
            .await
            .unwrap();
        assert!(names.is_empty());
    }
}
