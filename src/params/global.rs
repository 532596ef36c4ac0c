use std::collections::BTreeMap;

use super::keys::GlobalParamKey;
use super::value::ParamValue;
use super::ParamError;

/// Dataset-wide acquisition settings. Exactly one per file.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalParams {
    /// Name of the acquiring instrument
    pub instrument_name: String,
    /// Acquisition start timestamp, as recorded by the instrument
    pub date_started: String,
    /// Number of LC frames in the dataset
    pub num_frames: i32,
    /// TOF bin offset applied when scans were encoded
    pub time_offset: i32,
    /// TOF bin width in nanoseconds
    pub bin_width_ns: f64,
    /// Number of TOF bins per scan
    pub bins: i32,
    /// TOF correction time
    pub tof_correction_time: f64,
    /// Frame data BLOB layout version
    pub frame_data_blob_version: f64,
    /// Scan data BLOB layout version
    pub scan_data_blob_version: f64,
    /// Data type name of the accumulated intensities (e.g. `ADC`)
    pub tof_intensity_type: String,
    /// Dataset type label
    pub dataset_type: String,
    /// TOF pulses per prescan
    pub prescan_tof_pulses: i32,
    /// Accumulations per prescan
    pub prescan_accumulations: i32,
    /// Prescan TIC threshold
    pub prescan_tic_threshold: i32,
    /// Whether the prescan ran in continuous mode
    pub prescan_continuous: bool,
    /// Prescan profile file name
    pub prescan_profile: String,
    /// Parameters without a dedicated field, keyed by id; preserved on
    /// rewrite
    pub extra: BTreeMap<i32, ParamValue>,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalParams {
    /// Empty global parameters; the writer requires at least `bins`,
    /// `bin_width_ns`, and `num_frames` to be meaningful.
    pub fn new() -> Self {
        Self {
            instrument_name: String::new(),
            date_started: String::new(),
            num_frames: 0,
            time_offset: 0,
            bin_width_ns: 0.0,
            bins: 0,
            tof_correction_time: 0.0,
            frame_data_blob_version: 0.1,
            scan_data_blob_version: 0.1,
            tof_intensity_type: "ADC".to_string(),
            dataset_type: String::new(),
            prescan_tof_pulses: 0,
            prescan_accumulations: 0,
            prescan_tic_threshold: 0,
            prescan_continuous: false,
            prescan_profile: String::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Value of one parameter, if set.
    pub fn get(&self, key: GlobalParamKey) -> Option<ParamValue> {
        self.to_entries()
            .into_iter()
            .find(|(id, _)| *id == key.id())
            .map(|(_, value)| value)
    }

    /// Value of one parameter, or `default` when unset.
    pub fn get_or(&self, key: GlobalParamKey, default: ParamValue) -> ParamValue {
        self.get(key).unwrap_or(default)
    }

    /// True when the dataset carries a value for `key`.
    pub fn has(&self, key: GlobalParamKey) -> bool {
        self.get(key).is_some()
    }

    /// Set one parameter by key, updating the typed field it backs.
    pub fn set(&mut self, key: GlobalParamKey, value: ParamValue) -> Result<(), ParamError> {
        let entries = self.to_entries().into_iter().chain([(key.id(), value)]);
        *self = GlobalParams::from_entries(entries)?;
        Ok(())
    }

    /// Flatten to `(param_id, value)` pairs for storage, id-ordered.
    pub fn to_entries(&self) -> Vec<(i32, ParamValue)> {
        use GlobalParamKey as K;
        let mut entries: BTreeMap<i32, ParamValue> = self.extra.clone();

        let mut put = |key: K, value: ParamValue| {
            entries.insert(key.id(), value);
        };

        put(K::InstrumentName, ParamValue::Text(self.instrument_name.clone()));
        put(K::DateStarted, ParamValue::Text(self.date_started.clone()));
        put(K::NumFrames, ParamValue::I32(self.num_frames));
        put(K::TimeOffset, ParamValue::I32(self.time_offset));
        put(K::BinWidth, ParamValue::F64(self.bin_width_ns));
        put(K::Bins, ParamValue::I32(self.bins));
        put(K::TofCorrectionTime, ParamValue::F64(self.tof_correction_time));
        put(K::FrameDataBlobVersion, ParamValue::F64(self.frame_data_blob_version));
        put(K::ScanDataBlobVersion, ParamValue::F64(self.scan_data_blob_version));
        put(K::TofIntensityType, ParamValue::Text(self.tof_intensity_type.clone()));
        put(K::DatasetType, ParamValue::Text(self.dataset_type.clone()));
        put(K::PrescanTofPulses, ParamValue::I32(self.prescan_tof_pulses));
        put(K::PrescanAccumulations, ParamValue::I32(self.prescan_accumulations));
        put(K::PrescanTicThreshold, ParamValue::I32(self.prescan_tic_threshold));
        put(K::PrescanContinuous, ParamValue::I32(self.prescan_continuous as i32));
        put(K::PrescanProfile, ParamValue::Text(self.prescan_profile.clone()));

        entries.into_iter().collect()
    }

    /// Rebuild the typed view from stored `(param_id, value)` pairs.
    pub fn from_entries<I>(entries: I) -> Result<Self, ParamError>
    where
        I: IntoIterator<Item = (i32, ParamValue)>,
    {
        use GlobalParamKey as K;
        let mut params = GlobalParams::new();

        for (id, value) in entries {
            let Some(key) = K::from_id(id) else {
                params.extra.insert(id, value);
                continue;
            };

            let bad_value = |v: &ParamValue| ParamError::ValueParse {
                name: key.name().to_string(),
                value: v.to_stored_text(),
                expected: key.data_type(),
            };

            match key {
                K::InstrumentName => params.instrument_name = value.to_stored_text(),
                K::DateStarted => params.date_started = value.to_stored_text(),
                K::NumFrames => {
                    params.num_frames = value.to_i32().ok_or_else(|| bad_value(&value))?
                }
                K::TimeOffset => {
                    params.time_offset = value.to_i32().ok_or_else(|| bad_value(&value))?
                }
                K::BinWidth => {
                    params.bin_width_ns = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::Bins => params.bins = value.to_i32().ok_or_else(|| bad_value(&value))?,
                K::TofCorrectionTime => {
                    params.tof_correction_time = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::FrameDataBlobVersion => {
                    params.frame_data_blob_version =
                        value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::ScanDataBlobVersion => {
                    params.scan_data_blob_version =
                        value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::TofIntensityType => params.tof_intensity_type = value.to_stored_text(),
                K::DatasetType => params.dataset_type = value.to_stored_text(),
                K::PrescanTofPulses => {
                    params.prescan_tof_pulses = value.to_i32().ok_or_else(|| bad_value(&value))?
                }
                K::PrescanAccumulations => {
                    params.prescan_accumulations =
                        value.to_i32().ok_or_else(|| bad_value(&value))?
                }
                K::PrescanTicThreshold => {
                    params.prescan_tic_threshold =
                        value.to_i32().ok_or_else(|| bad_value(&value))?
                }
                K::PrescanContinuous => {
                    params.prescan_continuous =
                        value.to_i32().ok_or_else(|| bad_value(&value))? != 0
                }
                K::PrescanProfile => params.prescan_profile = value.to_stored_text(),
            }
        }

        Ok(params)
    }
}
