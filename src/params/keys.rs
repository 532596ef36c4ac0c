//! Closed enums of known parameter keys.
//!
//! Ids are stable across file format versions and are never reused; a new
//! parameter gets a new id. Readers that encounter ids outside these enums
//! keep the values verbatim and log each unknown id once.

use super::value::ParamDataType;

/// Per-frame parameter keys with their stable numeric ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
#[allow(missing_docs)] // variant names mirror the stored parameter names
pub enum FrameParamKey {
    StartTimeMinutes = 1,
    DurationSeconds = 2,
    Accumulations = 3,
    FrameType = 4,
    Decoded = 5,
    CalibrationDone = 6,
    Scans = 7,
    MultiplexingEncodingSequence = 8,
    MpBitOrder = 9,
    TofLosses = 10,
    AverageTofLength = 11,
    CalibrationSlope = 12,
    CalibrationIntercept = 13,
    MassErrorCoefficientA2 = 14,
    MassErrorCoefficientB2 = 15,
    MassErrorCoefficientC2 = 16,
    MassErrorCoefficientD2 = 17,
    MassErrorCoefficientE2 = 18,
    MassErrorCoefficientF2 = 19,
    AmbientTemperature = 20,
    VoltHvRack1 = 21,
    VoltHvRack2 = 22,
    VoltHvRack3 = 23,
    VoltHvRack4 = 24,
    VoltCapInlet = 25,
    VoltEntranceHpfIn = 26,
    VoltEntranceHpfOut = 27,
    VoltEntranceCondLimit = 28,
    VoltTrapOut = 29,
    VoltTrapIn = 30,
    VoltJetDist = 31,
    VoltQuad1 = 32,
    VoltCond1 = 33,
    VoltQuad2 = 34,
    VoltCond2 = 35,
    VoltImsOut = 36,
    VoltExitHpfIn = 37,
    VoltExitHpfOut = 38,
    VoltExitCondLimit = 39,
    PressureFront = 40,
    PressureBack = 41,
    HighPressureFunnelPressure = 42,
    IonFunnelTrapPressure = 43,
    RearIonFunnelPressure = 44,
    QuadrupolePressure = 45,
    EsiVoltage = 46,
    FloatVoltage = 47,
    FragmentationProfile = 48,
    ScanNumFirst = 49,
    ScanNumLast = 50,
    PressureUnits = 51,
    DriftTubeTemperature = 52,
}

impl FrameParamKey {
    /// Every known frame parameter key, in id order
    pub const ALL: [FrameParamKey; 52] = [
        FrameParamKey::StartTimeMinutes,
        FrameParamKey::DurationSeconds,
        FrameParamKey::Accumulations,
        FrameParamKey::FrameType,
        FrameParamKey::Decoded,
        FrameParamKey::CalibrationDone,
        FrameParamKey::Scans,
        FrameParamKey::MultiplexingEncodingSequence,
        FrameParamKey::MpBitOrder,
        FrameParamKey::TofLosses,
        FrameParamKey::AverageTofLength,
        FrameParamKey::CalibrationSlope,
        FrameParamKey::CalibrationIntercept,
        FrameParamKey::MassErrorCoefficientA2,
        FrameParamKey::MassErrorCoefficientB2,
        FrameParamKey::MassErrorCoefficientC2,
        FrameParamKey::MassErrorCoefficientD2,
        FrameParamKey::MassErrorCoefficientE2,
        FrameParamKey::MassErrorCoefficientF2,
        FrameParamKey::AmbientTemperature,
        FrameParamKey::VoltHvRack1,
        FrameParamKey::VoltHvRack2,
        FrameParamKey::VoltHvRack3,
        FrameParamKey::VoltHvRack4,
        FrameParamKey::VoltCapInlet,
        FrameParamKey::VoltEntranceHpfIn,
        FrameParamKey::VoltEntranceHpfOut,
        FrameParamKey::VoltEntranceCondLimit,
        FrameParamKey::VoltTrapOut,
        FrameParamKey::VoltTrapIn,
        FrameParamKey::VoltJetDist,
        FrameParamKey::VoltQuad1,
        FrameParamKey::VoltCond1,
        FrameParamKey::VoltQuad2,
        FrameParamKey::VoltCond2,
        FrameParamKey::VoltImsOut,
        FrameParamKey::VoltExitHpfIn,
        FrameParamKey::VoltExitHpfOut,
        FrameParamKey::VoltExitCondLimit,
        FrameParamKey::PressureFront,
        FrameParamKey::PressureBack,
        FrameParamKey::HighPressureFunnelPressure,
        FrameParamKey::IonFunnelTrapPressure,
        FrameParamKey::RearIonFunnelPressure,
        FrameParamKey::QuadrupolePressure,
        FrameParamKey::EsiVoltage,
        FrameParamKey::FloatVoltage,
        FrameParamKey::FragmentationProfile,
        FrameParamKey::ScanNumFirst,
        FrameParamKey::ScanNumLast,
        FrameParamKey::PressureUnits,
        FrameParamKey::DriftTubeTemperature,
    ];

    /// Stable numeric id
    pub fn id(self) -> i32 {
        self as i32
    }

    /// Look up a key by id
    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.id() == id)
    }

    /// Parameter name as stored in `Frame_Param_Keys`
    pub fn name(self) -> &'static str {
        self.info().0
    }

    /// Declared scalar type of the parameter's values
    pub fn data_type(self) -> ParamDataType {
        self.info().1
    }

    /// Human-readable description stored with the key definition
    pub fn description(self) -> &'static str {
        self.info().2
    }

    fn info(self) -> (&'static str, ParamDataType, &'static str) {
        use ParamDataType::{Bytes, Float64, Int32, Text};
        match self {
            FrameParamKey::StartTimeMinutes => (
                "StartTimeMinutes",
                Float64,
                "Frame start time relative to the start of the run, in minutes",
            ),
            FrameParamKey::DurationSeconds => {
                ("DurationSeconds", Float64, "Frame acquisition duration in seconds")
            }
            FrameParamKey::Accumulations => {
                ("Accumulations", Int32, "Accumulated TOF pulses per IMS scan")
            }
            FrameParamKey::FrameType => {
                ("FrameType", Int32, "1=MS1, 2=MS2, 3=Calibration, 4=Prescan")
            }
            FrameParamKey::Decoded => {
                ("Decoded", Int32, "1 when a multiplexing decode was applied")
            }
            FrameParamKey::CalibrationDone => {
                ("CalibrationDone", Int32, "1 when mass calibration has been applied")
            }
            FrameParamKey::Scans => ("Scans", Int32, "Number of IMS scans in the frame"),
            FrameParamKey::MultiplexingEncodingSequence => (
                "MultiplexingEncodingSequence",
                Text,
                "Name of the multiplexing encoding sequence",
            ),
            FrameParamKey::MpBitOrder => {
                ("MPBitOrder", Int32, "Multiplexing bit order")
            }
            FrameParamKey::TofLosses => {
                ("TOFLosses", Float64, "Number of TOF pulses lost to overlap")
            }
            FrameParamKey::AverageTofLength => (
                "AverageTOFLength",
                Float64,
                "Average TOF cycle length in nanoseconds",
            ),
            FrameParamKey::CalibrationSlope => {
                ("CalibrationSlope", Float64, "Mass calibration slope")
            }
            FrameParamKey::CalibrationIntercept => {
                ("CalibrationIntercept", Float64, "Mass calibration intercept")
            }
            FrameParamKey::MassErrorCoefficientA2 => {
                ("MassErrorCoefficientA2", Float64, "Mass error polynomial coefficient for t")
            }
            FrameParamKey::MassErrorCoefficientB2 => {
                ("MassErrorCoefficientB2", Float64, "Mass error polynomial coefficient for t^3")
            }
            FrameParamKey::MassErrorCoefficientC2 => {
                ("MassErrorCoefficientC2", Float64, "Mass error polynomial coefficient for t^5")
            }
            FrameParamKey::MassErrorCoefficientD2 => {
                ("MassErrorCoefficientD2", Float64, "Mass error polynomial coefficient for t^7")
            }
            FrameParamKey::MassErrorCoefficientE2 => {
                ("MassErrorCoefficientE2", Float64, "Mass error polynomial coefficient for t^9")
            }
            FrameParamKey::MassErrorCoefficientF2 => {
                ("MassErrorCoefficientF2", Float64, "Mass error polynomial coefficient for t^11")
            }
            FrameParamKey::AmbientTemperature => {
                ("AmbientTemperature", Float64, "Ambient temperature in Celsius")
            }
            FrameParamKey::VoltHvRack1 => ("VoltHVRack1", Float64, "HV rack voltage 1"),
            FrameParamKey::VoltHvRack2 => ("VoltHVRack2", Float64, "HV rack voltage 2"),
            FrameParamKey::VoltHvRack3 => ("VoltHVRack3", Float64, "HV rack voltage 3"),
            FrameParamKey::VoltHvRack4 => ("VoltHVRack4", Float64, "HV rack voltage 4"),
            FrameParamKey::VoltCapInlet => {
                ("VoltCapInlet", Float64, "Capillary inlet voltage")
            }
            FrameParamKey::VoltEntranceHpfIn => {
                ("VoltEntranceHPFIn", Float64, "Entrance high-pressure funnel in voltage")
            }
            FrameParamKey::VoltEntranceHpfOut => {
                ("VoltEntranceHPFOut", Float64, "Entrance high-pressure funnel out voltage")
            }
            FrameParamKey::VoltEntranceCondLimit => {
                ("VoltEntranceCondLmt", Float64, "Entrance conductance limit voltage")
            }
            FrameParamKey::VoltTrapOut => ("VoltTrapOut", Float64, "Trap out voltage"),
            FrameParamKey::VoltTrapIn => ("VoltTrapIn", Float64, "Trap in voltage"),
            FrameParamKey::VoltJetDist => ("VoltJetDist", Float64, "Jet disruptor voltage"),
            FrameParamKey::VoltQuad1 => ("VoltQuad1", Float64, "Quadrupole 1 voltage"),
            FrameParamKey::VoltCond1 => {
                ("VoltCond1", Float64, "Quadrupole 1 conductance limit voltage")
            }
            FrameParamKey::VoltQuad2 => ("VoltQuad2", Float64, "Quadrupole 2 voltage"),
            FrameParamKey::VoltCond2 => {
                ("VoltCond2", Float64, "Quadrupole 2 conductance limit voltage")
            }
            FrameParamKey::VoltImsOut => ("VoltIMSOut", Float64, "IMS out voltage"),
            FrameParamKey::VoltExitHpfIn => {
                ("VoltExitHPFIn", Float64, "Exit high-pressure funnel in voltage")
            }
            FrameParamKey::VoltExitHpfOut => {
                ("VoltExitHPFOut", Float64, "Exit high-pressure funnel out voltage")
            }
            FrameParamKey::VoltExitCondLimit => {
                ("VoltExitCondLmt", Float64, "Exit conductance limit voltage")
            }
            FrameParamKey::PressureFront => {
                ("PressureFront", Float64, "Drift tube front pressure")
            }
            FrameParamKey::PressureBack => {
                ("PressureBack", Float64, "Drift tube back pressure")
            }
            FrameParamKey::HighPressureFunnelPressure => {
                ("HighPressureFunnelPressure", Float64, "High-pressure funnel pressure")
            }
            FrameParamKey::IonFunnelTrapPressure => {
                ("IonFunnelTrapPressure", Float64, "Ion funnel trap pressure")
            }
            FrameParamKey::RearIonFunnelPressure => {
                ("RearIonFunnelPressure", Float64, "Rear ion funnel pressure")
            }
            FrameParamKey::QuadrupolePressure => {
                ("QuadrupolePressure", Float64, "Quadrupole pressure")
            }
            FrameParamKey::EsiVoltage => ("ESIVoltage", Float64, "Electrospray voltage"),
            FrameParamKey::FloatVoltage => ("FloatVoltage", Float64, "Float voltage"),
            FrameParamKey::FragmentationProfile => {
                ("FragmentationProfile", Bytes, "Fragmentation amplitude profile")
            }
            FrameParamKey::ScanNumFirst => {
                ("ScanNumFirst", Int32, "First scan number acquired")
            }
            FrameParamKey::ScanNumLast => {
                ("ScanNumLast", Int32, "Last scan number acquired")
            }
            FrameParamKey::PressureUnits => {
                ("PressureUnits", Text, "Unit of the pressure parameters: Torr or MilliTorr")
            }
            FrameParamKey::DriftTubeTemperature => {
                ("DriftTubeTemperature", Float64, "Drift tube temperature in Celsius")
            }
        }
    }
}

/// Dataset-wide parameter keys with their stable numeric ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
#[allow(missing_docs)] // variant names mirror the stored parameter names
pub enum GlobalParamKey {
    InstrumentName = 1,
    DateStarted = 2,
    NumFrames = 3,
    TimeOffset = 4,
    BinWidth = 5,
    Bins = 6,
    TofCorrectionTime = 7,
    FrameDataBlobVersion = 8,
    ScanDataBlobVersion = 9,
    TofIntensityType = 10,
    DatasetType = 11,
    PrescanTofPulses = 12,
    PrescanAccumulations = 13,
    PrescanTicThreshold = 14,
    PrescanContinuous = 15,
    PrescanProfile = 16,
}

impl GlobalParamKey {
    /// Every known global parameter key, in id order
    pub const ALL: [GlobalParamKey; 16] = [
        GlobalParamKey::InstrumentName,
        GlobalParamKey::DateStarted,
        GlobalParamKey::NumFrames,
        GlobalParamKey::TimeOffset,
        GlobalParamKey::BinWidth,
        GlobalParamKey::Bins,
        GlobalParamKey::TofCorrectionTime,
        GlobalParamKey::FrameDataBlobVersion,
        GlobalParamKey::ScanDataBlobVersion,
        GlobalParamKey::TofIntensityType,
        GlobalParamKey::DatasetType,
        GlobalParamKey::PrescanTofPulses,
        GlobalParamKey::PrescanAccumulations,
        GlobalParamKey::PrescanTicThreshold,
        GlobalParamKey::PrescanContinuous,
        GlobalParamKey::PrescanProfile,
    ];

    /// Stable numeric id
    pub fn id(self) -> i32 {
        self as i32
    }

    /// Look up a key by id
    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.id() == id)
    }

    /// Parameter name as stored in `Global_Params`
    pub fn name(self) -> &'static str {
        self.info().0
    }

    /// Declared scalar type of the parameter's values
    pub fn data_type(self) -> ParamDataType {
        self.info().1
    }

    /// Human-readable description stored with the parameter
    pub fn description(self) -> &'static str {
        self.info().2
    }

    fn info(self) -> (&'static str, ParamDataType, &'static str) {
        use ParamDataType::{Float64, Int32, Text};
        match self {
            GlobalParamKey::InstrumentName => {
                ("InstrumentName", Text, "Name of the acquiring instrument")
            }
            GlobalParamKey::DateStarted => {
                ("DateStarted", Text, "Acquisition start timestamp")
            }
            GlobalParamKey::NumFrames => ("NumFrames", Int32, "Number of LC frames in the dataset"),
            GlobalParamKey::TimeOffset => {
                ("TimeOffset", Int32, "TOF bin offset applied when scans were encoded")
            }
            GlobalParamKey::BinWidth => ("BinWidth", Float64, "TOF bin width in nanoseconds"),
            GlobalParamKey::Bins => ("Bins", Int32, "Number of TOF bins per scan"),
            GlobalParamKey::TofCorrectionTime => {
                ("TOFCorrectionTime", Float64, "TOF correction time")
            }
            GlobalParamKey::FrameDataBlobVersion => {
                ("FrameDataBlobVersion", Float64, "Frame data BLOB layout version")
            }
            GlobalParamKey::ScanDataBlobVersion => {
                ("ScanDataBlobVersion", Float64, "Scan data BLOB layout version")
            }
            GlobalParamKey::TofIntensityType => {
                ("TOFIntensityType", Text, "Data type name of the accumulated intensities")
            }
            GlobalParamKey::DatasetType => ("DatasetType", Text, "Dataset type label"),
            GlobalParamKey::PrescanTofPulses => {
                ("PrescanTOFPulses", Int32, "TOF pulses per prescan")
            }
            GlobalParamKey::PrescanAccumulations => {
                ("PrescanAccumulations", Int32, "Accumulations per prescan")
            }
            GlobalParamKey::PrescanTicThreshold => {
                ("PrescanTICThreshold", Int32, "Prescan TIC threshold")
            }
            GlobalParamKey::PrescanContinuous => {
                ("PrescanContinuous", Int32, "1 when prescan ran in continuous mode")
            }
            GlobalParamKey::PrescanProfile => {
                ("PrescanProfile", Text, "Prescan profile file name")
            }
        }
    }
}
