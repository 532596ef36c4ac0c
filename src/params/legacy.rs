//! Adapter for the legacy wide-table metadata layout.
//!
//! Old files store one row per frame in `Frame_Parameters` and a single row
//! in `Global_Parameters`, with one column per setting. This module owns the
//! static mapping from those column names to parameter keys, plus the
//! correction heuristic for `StartTime` values that were written as Windows
//! filetime ticks instead of minutes.
//!
//! Columns added in later legacy revisions may be absent from a given file;
//! schema introspection tolerates that, logging each missing column once.

use chrono::NaiveDateTime;

use super::keys::{FrameParamKey, GlobalParamKey};

/// Map a legacy `Frame_Parameters` column to its parameter key.
///
/// `FrameNum` is the row key, not a parameter, and returns `None`.
pub fn frame_column_key(column: &str) -> Option<FrameParamKey> {
    use FrameParamKey as K;
    let key = match column {
        "StartTime" => K::StartTimeMinutes,
        "Duration" => K::DurationSeconds,
        "Accumulations" => K::Accumulations,
        "FrameType" => K::FrameType,
        "Decoded" => K::Decoded,
        "CalibrationDone" => K::CalibrationDone,
        "Scans" => K::Scans,
        "IMFProfile" => K::MultiplexingEncodingSequence,
        "MPBitOrder" => K::MpBitOrder,
        "TOFLosses" => K::TofLosses,
        "AverageTOFLength" => K::AverageTofLength,
        "CalibrationSlope" => K::CalibrationSlope,
        "CalibrationIntercept" => K::CalibrationIntercept,
        "a2" => K::MassErrorCoefficientA2,
        "b2" => K::MassErrorCoefficientB2,
        "c2" => K::MassErrorCoefficientC2,
        "d2" => K::MassErrorCoefficientD2,
        "e2" => K::MassErrorCoefficientE2,
        "f2" => K::MassErrorCoefficientF2,
        "Temperature" => K::AmbientTemperature,
        "voltHVRack1" => K::VoltHvRack1,
        "voltHVRack2" => K::VoltHvRack2,
        "voltHVRack3" => K::VoltHvRack3,
        "voltHVRack4" => K::VoltHvRack4,
        "voltCapInlet" => K::VoltCapInlet,
        "voltEntranceHPFIn" => K::VoltEntranceHpfIn,
        "voltEntranceHPFOut" => K::VoltEntranceHpfOut,
        "voltEntranceCondLmt" => K::VoltEntranceCondLimit,
        "voltTrapOut" => K::VoltTrapOut,
        "voltTrapIn" => K::VoltTrapIn,
        "voltJetDist" => K::VoltJetDist,
        "voltQuad1" => K::VoltQuad1,
        "voltCond1" => K::VoltCond1,
        "voltQuad2" => K::VoltQuad2,
        "voltCond2" => K::VoltCond2,
        "voltIMSOut" => K::VoltImsOut,
        "voltExitHPFIn" => K::VoltExitHpfIn,
        "voltExitHPFOut" => K::VoltExitHpfOut,
        "voltExitCondLmt" => K::VoltExitCondLimit,
        "PressureFront" => K::PressureFront,
        "PressureBack" => K::PressureBack,
        "HighPressureFunnelPressure" => K::HighPressureFunnelPressure,
        "IonFunnelTrapPressure" => K::IonFunnelTrapPressure,
        "RearIonFunnelPressure" => K::RearIonFunnelPressure,
        "QuadrupolePressure" => K::QuadrupolePressure,
        "ESIVoltage" => K::EsiVoltage,
        "FloatVoltage" => K::FloatVoltage,
        "FragmentationProfile" => K::FragmentationProfile,
        "PressureUnits" => K::PressureUnits,
        _ => return None,
    };
    Some(key)
}

/// Map a legacy `Global_Parameters` column to its parameter key.
pub fn global_column_key(column: &str) -> Option<GlobalParamKey> {
    use GlobalParamKey as K;
    let key = match column {
        "Instrument_Name" => K::InstrumentName,
        "DateStarted" => K::DateStarted,
        "NumFrames" => K::NumFrames,
        "TimeOffset" => K::TimeOffset,
        "BinWidth" => K::BinWidth,
        "Bins" => K::Bins,
        "TOFCorrectionTime" => K::TofCorrectionTime,
        "FrameDataBlobVersion" => K::FrameDataBlobVersion,
        "ScanDataBlobVersion" => K::ScanDataBlobVersion,
        "TOFIntensityType" => K::TofIntensityType,
        "DatasetType" => K::DatasetType,
        "Prescan_TOFPulses" => K::PrescanTofPulses,
        "Prescan_Accumulations" => K::PrescanAccumulations,
        "Prescan_TICThreshold" => K::PrescanTicThreshold,
        "Prescan_Continuous" => K::PrescanContinuous,
        "Prescan_Profile" => K::PrescanProfile,
        _ => return None,
    };
    Some(key)
}

/// .NET ticks (100 ns since 0001-01-01) at 0450-01-01.
///
/// Frame start times below this are already minutes; anything at or above
/// it was written as a raw tick count. Real acquisition dates are all far
/// above, and real start times in minutes far below, so the threshold sits
/// in an eleven-order-of-magnitude gap.
pub const TICKS_YEAR_450: f64 = 1.416_908_16e17;

const TICKS_PER_MINUTE: f64 = 600_000_000.0;
const DOTNET_EPOCH_TO_UNIX_SECONDS: i64 = 62_135_596_800;

/// Correct a legacy `StartTime` into minutes since run start.
///
/// Tick-encoded values are normalized against the `DateStarted` global
/// parameter. When that timestamp is missing or unparseable the tick value
/// cannot be anchored and 0.0 is returned with a warning.
pub fn normalize_start_time(raw: f64, date_started: &str) -> f64 {
    if raw < TICKS_YEAR_450 {
        return raw;
    }
    match parse_date_started(date_started) {
        Some(started) => {
            let started_ticks =
                (started.and_utc().timestamp() + DOTNET_EPOCH_TO_UNIX_SECONDS) as f64 * 1e7;
            (raw - started_ticks) / TICKS_PER_MINUTE
        }
        None => {
            log::warn!(
                "StartTime {raw} is tick-encoded but DateStarted {date_started:?} is unparseable"
            );
            0.0
        }
    }
}

/// Parse the `DateStarted` timestamp, tolerating the formats acquisition
/// software has used over the years.
pub fn parse_date_started(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 5] = [
        "%m/%d/%Y %I:%M:%S %p",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    let trimmed = text.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}
