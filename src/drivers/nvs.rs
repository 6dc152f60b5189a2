// PostureBand - NVS Settings Store

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

use postureband::hal::SettingsStore;
use postureband::{PostureSettings, StoreError};

const NAMESPACE: &str = "posture";
const KEY_SETTINGS: &str = "settings";

pub struct NvsSettingsStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsSettingsStore {
    pub fn new(partition: EspDefaultNvsPartition) -> anyhow::Result<Self> {
        Ok(Self {
            nvs: EspNvs::new(partition, NAMESPACE, true)?,
        })
    }
}

impl SettingsStore for NvsSettingsStore {
    fn load(&mut self) -> Result<Option<PostureSettings>, StoreError> {
        let mut buf = [0u8; PostureSettings::SIZE];
        match self
            .nvs
            .get_raw(KEY_SETTINGS, &mut buf)
            .map_err(anyhow::Error::from)?
        {
            Some(bytes) => PostureSettings::from_bytes(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn save(&mut self, settings: &PostureSettings) -> Result<(), StoreError> {
        self.nvs
            .set_raw(KEY_SETTINGS, &settings.to_bytes())
            .map_err(anyhow::Error::from)?;
        log::debug!("Settings saved");
        Ok(())
    }
}
