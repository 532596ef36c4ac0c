use std::collections::BTreeMap;

use super::keys::FrameParamKey;
use super::value::ParamValue;
use super::ParamError;

/// Label of a frame's acquisition mode.
///
/// MS1 is always written as `1`. Very old files stored MS1 as `0`; readers
/// accept that label when the file uses it consistently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FrameType {
    /// Survey (MS1) frame
    Ms1 = 1,
    /// Fragmentation (MS2) frame
    Ms2 = 2,
    /// Calibration frame
    Calibration = 3,
    /// Prescan frame
    Prescan = 4,
}

impl FrameType {
    /// Value written to the file. MS1 is always stored as `1`.
    pub fn stored_value(self) -> i32 {
        self as i32
    }

    /// Map a stored frame type to its label.
    ///
    /// Both `0` and `1` map to MS1; files mixing the two labels are
    /// rejected when opened, so the ambiguity never reaches this point.
    pub fn from_stored(value: i32) -> Result<Self, ParamError> {
        match value {
            0 | 1 => Ok(FrameType::Ms1),
            2 => Ok(FrameType::Ms2),
            3 => Ok(FrameType::Calibration),
            4 => Ok(FrameType::Prescan),
            other => Err(ParamError::UndefinedFrameType(other)),
        }
    }
}

/// Unit of the pressure parameters carried by a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureUnits {
    /// Pressures are in torr
    Torr,
    /// Pressures are in millitorr
    MilliTorr,
}

impl PressureUnits {
    /// Text stored in the `PressureUnits` parameter
    pub fn stored_name(self) -> &'static str {
        match self {
            PressureUnits::Torr => "Torr",
            PressureUnits::MilliTorr => "MilliTorr",
        }
    }

    /// Parse the stored text, tolerating historical spellings.
    pub fn from_stored_name(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "torr" => Some(PressureUnits::Torr),
            "millitorr" | "mtorr" | "milli-torr" => Some(PressureUnits::MilliTorr),
            _ => None,
        }
    }
}

/// Per-frame acquisition settings.
///
/// The commonly used parameters are plain fields; everything else a file
/// carries (instrument voltages, ids from newer revisions) lives in
/// [`extra`](Self::extra) keyed by parameter id and is written back
/// verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameParams {
    /// Frame start time relative to run start, in minutes
    pub start_time_minutes: f64,
    /// Frame duration in seconds
    pub duration_seconds: f64,
    /// Accumulated TOF pulses per IMS scan
    pub accumulations: i32,
    /// Acquisition mode of the frame
    pub frame_type: FrameType,
    /// Non-zero when a multiplexing decode was applied
    pub decoded: i32,
    /// Non-zero when mass calibration has been applied
    pub calibration_done: i32,
    /// Number of IMS scans in the frame
    pub scans: i32,
    /// Multiplexing encoding sequence name
    pub multiplexing_encoding_sequence: String,
    /// Multiplexing bit order
    pub mp_bit_order: i32,
    /// TOF pulses lost to overlap
    pub tof_losses: f64,
    /// Average TOF cycle length in nanoseconds
    pub average_tof_length: f64,
    /// Mass calibration slope; must be strictly positive for bin/m-z
    /// conversion to be defined
    pub calibration_slope: f64,
    /// Mass calibration intercept
    pub calibration_intercept: f64,
    /// Mass error polynomial coefficient for t
    pub mass_error_a2: f64,
    /// Mass error polynomial coefficient for t^3
    pub mass_error_b2: f64,
    /// Mass error polynomial coefficient for t^5
    pub mass_error_c2: f64,
    /// Mass error polynomial coefficient for t^7
    pub mass_error_d2: f64,
    /// Mass error polynomial coefficient for t^9
    pub mass_error_e2: f64,
    /// Mass error polynomial coefficient for t^11
    pub mass_error_f2: f64,
    /// Ambient temperature in Celsius
    pub ambient_temperature: f64,
    /// Drift tube front pressure
    pub pressure_front: f64,
    /// Drift tube back pressure
    pub pressure_back: f64,
    /// High-pressure funnel pressure
    pub high_pressure_funnel_pressure: f64,
    /// Ion funnel trap pressure
    pub ion_funnel_trap_pressure: f64,
    /// Rear ion funnel pressure
    pub rear_ion_funnel_pressure: f64,
    /// Quadrupole pressure
    pub quadrupole_pressure: f64,
    /// Electrospray voltage
    pub esi_voltage: f64,
    /// Float voltage
    pub float_voltage: f64,
    /// Declared unit of the pressure parameters, when recorded
    pub pressure_units: Option<PressureUnits>,
    /// Drift tube temperature in Celsius
    pub drift_tube_temperature: f64,
    /// Parameters without a dedicated field, keyed by id; preserved on
    /// rewrite
    pub extra: BTreeMap<i32, ParamValue>,
}

impl FrameParams {
    /// A frame of the given type with every other parameter zeroed.
    pub fn new(frame_type: FrameType) -> Self {
        Self {
            start_time_minutes: 0.0,
            duration_seconds: 0.0,
            accumulations: 0,
            frame_type,
            decoded: 0,
            calibration_done: 0,
            scans: 0,
            multiplexing_encoding_sequence: String::new(),
            mp_bit_order: 0,
            tof_losses: 0.0,
            average_tof_length: 0.0,
            calibration_slope: 0.0,
            calibration_intercept: 0.0,
            mass_error_a2: 0.0,
            mass_error_b2: 0.0,
            mass_error_c2: 0.0,
            mass_error_d2: 0.0,
            mass_error_e2: 0.0,
            mass_error_f2: 0.0,
            ambient_temperature: 0.0,
            pressure_front: 0.0,
            pressure_back: 0.0,
            high_pressure_funnel_pressure: 0.0,
            ion_funnel_trap_pressure: 0.0,
            rear_ion_funnel_pressure: 0.0,
            quadrupole_pressure: 0.0,
            esi_voltage: 0.0,
            float_voltage: 0.0,
            pressure_units: None,
            drift_tube_temperature: 0.0,
            extra: BTreeMap::new(),
        }
    }

    /// Value of one parameter, if the frame carries it.
    pub fn get(&self, key: FrameParamKey) -> Option<ParamValue> {
        self.to_entries()
            .into_iter()
            .find(|(id, _)| *id == key.id())
            .map(|(_, value)| value)
    }

    /// Value of one parameter, or `default` when the frame does not carry
    /// it.
    pub fn get_or(&self, key: FrameParamKey, default: ParamValue) -> ParamValue {
        self.get(key).unwrap_or(default)
    }

    /// True when the frame carries a value for `key`.
    pub fn has(&self, key: FrameParamKey) -> bool {
        self.get(key).is_some()
    }

    /// Set one parameter by key, updating the typed field it backs.
    pub fn set(&mut self, key: FrameParamKey, value: ParamValue) -> Result<(), ParamError> {
        let entries = self.to_entries().into_iter().chain([(key.id(), value)]);
        *self = FrameParams::from_entries(entries)?;
        Ok(())
    }

    /// The six mass error polynomial coefficients `[a2, b2, c2, d2, e2, f2]`
    pub fn mass_error_coefficients(&self) -> [f64; 6] {
        [
            self.mass_error_a2,
            self.mass_error_b2,
            self.mass_error_c2,
            self.mass_error_d2,
            self.mass_error_e2,
            self.mass_error_f2,
        ]
    }

    /// Flatten to `(param_id, value)` pairs for storage, id-ordered.
    pub fn to_entries(&self) -> Vec<(i32, ParamValue)> {
        use FrameParamKey as K;
        let mut entries: BTreeMap<i32, ParamValue> = self.extra.clone();

        let mut put = |key: K, value: ParamValue| {
            entries.insert(key.id(), value);
        };

        put(K::StartTimeMinutes, ParamValue::F64(self.start_time_minutes));
        put(K::DurationSeconds, ParamValue::F64(self.duration_seconds));
        put(K::Accumulations, ParamValue::I32(self.accumulations));
        put(K::FrameType, ParamValue::I32(self.frame_type.stored_value()));
        put(K::Decoded, ParamValue::I32(self.decoded));
        put(K::CalibrationDone, ParamValue::I32(self.calibration_done));
        put(K::Scans, ParamValue::I32(self.scans));
        put(
            K::MultiplexingEncodingSequence,
            ParamValue::Text(self.multiplexing_encoding_sequence.clone()),
        );
        put(K::MpBitOrder, ParamValue::I32(self.mp_bit_order));
        put(K::TofLosses, ParamValue::F64(self.tof_losses));
        put(K::AverageTofLength, ParamValue::F64(self.average_tof_length));
        put(K::CalibrationSlope, ParamValue::F64(self.calibration_slope));
        put(K::CalibrationIntercept, ParamValue::F64(self.calibration_intercept));
        put(K::MassErrorCoefficientA2, ParamValue::F64(self.mass_error_a2));
        put(K::MassErrorCoefficientB2, ParamValue::F64(self.mass_error_b2));
        put(K::MassErrorCoefficientC2, ParamValue::F64(self.mass_error_c2));
        put(K::MassErrorCoefficientD2, ParamValue::F64(self.mass_error_d2));
        put(K::MassErrorCoefficientE2, ParamValue::F64(self.mass_error_e2));
        put(K::MassErrorCoefficientF2, ParamValue::F64(self.mass_error_f2));
        put(K::AmbientTemperature, ParamValue::F64(self.ambient_temperature));
        put(K::PressureFront, ParamValue::F64(self.pressure_front));
        put(K::PressureBack, ParamValue::F64(self.pressure_back));
        put(
            K::HighPressureFunnelPressure,
            ParamValue::F64(self.high_pressure_funnel_pressure),
        );
        put(K::IonFunnelTrapPressure, ParamValue::F64(self.ion_funnel_trap_pressure));
        put(K::RearIonFunnelPressure, ParamValue::F64(self.rear_ion_funnel_pressure));
        put(K::QuadrupolePressure, ParamValue::F64(self.quadrupole_pressure));
        put(K::EsiVoltage, ParamValue::F64(self.esi_voltage));
        put(K::FloatVoltage, ParamValue::F64(self.float_voltage));
        if let Some(units) = self.pressure_units {
            put(K::PressureUnits, ParamValue::Text(units.stored_name().to_string()));
        }
        put(K::DriftTubeTemperature, ParamValue::F64(self.drift_tube_temperature));

        entries.into_iter().collect()
    }

    /// Rebuild the typed view from stored `(param_id, value)` pairs.
    ///
    /// Ids without a dedicated field land in `extra` untouched; the caller
    /// decides whether any of them deserve an unknown-id warning.
    pub fn from_entries<I>(entries: I) -> Result<Self, ParamError>
    where
        I: IntoIterator<Item = (i32, ParamValue)>,
    {
        use FrameParamKey as K;
        let mut params = FrameParams::new(FrameType::Ms1);

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
                K::StartTimeMinutes => {
                    params.start_time_minutes = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::DurationSeconds => {
                    params.duration_seconds = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::Accumulations => {
                    params.accumulations = value.to_i32().ok_or_else(|| bad_value(&value))?
                }
                K::FrameType => {
                    let stored = value.to_i32().ok_or_else(|| bad_value(&value))?;
                    params.frame_type = FrameType::from_stored(stored)?;
                }
                K::Decoded => params.decoded = value.to_i32().ok_or_else(|| bad_value(&value))?,
                K::CalibrationDone => {
                    params.calibration_done = value.to_i32().ok_or_else(|| bad_value(&value))?
                }
                K::Scans => params.scans = value.to_i32().ok_or_else(|| bad_value(&value))?,
                K::MultiplexingEncodingSequence => {
                    params.multiplexing_encoding_sequence = value.to_stored_text()
                }
                K::MpBitOrder => {
                    params.mp_bit_order = value.to_i32().ok_or_else(|| bad_value(&value))?
                }
                K::TofLosses => {
                    params.tof_losses = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::AverageTofLength => {
                    params.average_tof_length = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::CalibrationSlope => {
                    params.calibration_slope = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::CalibrationIntercept => {
                    params.calibration_intercept = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::MassErrorCoefficientA2 => {
                    params.mass_error_a2 = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::MassErrorCoefficientB2 => {
                    params.mass_error_b2 = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::MassErrorCoefficientC2 => {
                    params.mass_error_c2 = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::MassErrorCoefficientD2 => {
                    params.mass_error_d2 = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::MassErrorCoefficientE2 => {
                    params.mass_error_e2 = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::MassErrorCoefficientF2 => {
                    params.mass_error_f2 = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::AmbientTemperature => {
                    params.ambient_temperature = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::PressureFront => {
                    params.pressure_front = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::PressureBack => {
                    params.pressure_back = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::HighPressureFunnelPressure => {
                    params.high_pressure_funnel_pressure =
                        value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::IonFunnelTrapPressure => {
                    params.ion_funnel_trap_pressure =
                        value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::RearIonFunnelPressure => {
                    params.rear_ion_funnel_pressure =
                        value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::QuadrupolePressure => {
                    params.quadrupole_pressure = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::EsiVoltage => {
                    params.esi_voltage = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::FloatVoltage => {
                    params.float_voltage = value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                K::PressureUnits => {
                    let text = value.to_stored_text();
                    params.pressure_units = PressureUnits::from_stored_name(&text);
                    if params.pressure_units.is_none() {
                        log::warn!("unrecognized PressureUnits value {text:?}; keeping raw text");
                        params.extra.insert(id, value);
                    }
                }
                K::DriftTubeTemperature => {
                    params.drift_tube_temperature =
                        value.to_f64().ok_or_else(|| bad_value(&value))?
                }
                // No dedicated field; keep for rewrite.
                _ => {
                    params.extra.insert(id, value);
                }
            }
        }

        Ok(params)
    }
}
