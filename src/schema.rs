//! # Schema Manager
//!
//! Creates and upgrades the tables and indexes of a UIMF file and tracks
//! the file format version.
//!
//! ## Tables
//!
//! | Table | Purpose |
//! |-------|---------|
//! | `Global_Params` | dataset-wide key/value parameters |
//! | `Frame_Param_Keys` | parameter key definitions (id, name, type) |
//! | `Frame_Params` | per-frame key/value parameters |
//! | `Frame_Scans` | one row per IMS scan with the encoded intensity BLOB |
//! | `Bin_Intensities` | optional bin-centric secondary index |
//! | `Version_Info` | append-only log of writing sessions |
//!
//! Legacy files carry the wide `Frame_Parameters` / `Global_Parameters`
//! tables instead. Those are accepted read-only as-is; opening one for
//! write up-converts it into the key/value layout, leaving the legacy
//! tables in place so old readers keep working.

use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};

use crate::error::UimfError;
use crate::params::{
    legacy, FrameParamKey, GlobalParams, ParamDataType, ParamValue,
};

/// Version string written to `Version_Info` by this library
pub const FILE_FORMAT_VERSION: &str = "3.0";

/// Stored frame-type value treated as MS1 for the open file.
///
/// Modern files label MS1 frames `1`; very old files used `0`. The label is
/// fixed at open time by [`determine_ms1_label`] and MS1 is always written
/// back as `1`.
pub type Ms1Label = i32;

/// True when `name` exists as a table in the open database.
pub fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get::<_, i64>(0),
    )
    .map(|count| count > 0)
}

/// True when the file carries the bin-centric secondary index.
pub fn has_bin_centric_tables(conn: &Connection) -> rusqlite::Result<bool> {
    table_exists(conn, "Bin_Intensities")
}

/// Create the current-layout tables and indexes that are missing.
pub fn create_core_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS Global_Params (
             param_id INTEGER NOT NULL,
             param_name TEXT NOT NULL,
             param_value TEXT,
             param_data_type TEXT NOT NULL,
             param_description TEXT);
         CREATE UNIQUE INDEX IF NOT EXISTS ix_GlobalParams
             ON Global_Params (param_id);

         CREATE TABLE IF NOT EXISTS Frame_Param_Keys (
             param_id INTEGER NOT NULL PRIMARY KEY,
             param_name TEXT NOT NULL,
             param_data_type TEXT NOT NULL,
             param_description TEXT);

         CREATE TABLE IF NOT EXISTS Frame_Params (
             frame_num INTEGER NOT NULL,
             param_id INTEGER NOT NULL,
             param_value TEXT);
         CREATE UNIQUE INDEX IF NOT EXISTS pk_FrameParams
             ON Frame_Params (frame_num, param_id);
         CREATE INDEX IF NOT EXISTS ix_FrameParams_ByType
             ON Frame_Params (param_id, frame_num);

         CREATE TABLE IF NOT EXISTS Frame_Scans (
             frame_num INTEGER NOT NULL,
             scan_num INTEGER NOT NULL,
             non_zero_count INTEGER NOT NULL,
             bpi NUMERIC NOT NULL,
             bpi_mz DOUBLE NOT NULL,
             tic NUMERIC NOT NULL,
             intensities BLOB);
         CREATE UNIQUE INDEX IF NOT EXISTS pk_FrameScans
             ON Frame_Scans (frame_num, scan_num);

         CREATE TABLE IF NOT EXISTS Version_Info (
             version_id INTEGER PRIMARY KEY AUTOINCREMENT,
             file_version TEXT,
             calling_assembly_name TEXT,
             calling_assembly_version TEXT,
             entered TEXT NOT NULL DEFAULT current_timestamp);",
    )
}

/// Append a `Version_Info` row for this mutation session.
pub fn write_version_info(conn: &Connection) -> rusqlite::Result<()> {
    let entered = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    conn.execute(
        "INSERT INTO Version_Info
             (file_version, calling_assembly_name, calling_assembly_version, entered)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            FILE_FORMAT_VERSION,
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            entered
        ],
    )?;
    Ok(())
}

/// Inspect every stored frame type and fix the MS1 label for this file.
///
/// Returns `0` only when the file consistently uses the ancient label; a
/// file carrying both `0` and `1` is rejected as
/// [`UimfError::InconsistentFrameTypes`].
pub fn determine_ms1_label(conn: &Connection) -> Result<Ms1Label, UimfError> {
    let mut stored = Vec::new();

    if table_exists(conn, "Frame_Params")? {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT param_value FROM Frame_Params WHERE param_id = ?1",
        )?;
        let rows = stmt.query_map([FrameParamKey::FrameType.id()], |row| {
            row.get::<_, String>(0)
        })?;
        for text in rows {
            if let Ok(value) = text?.trim().parse::<i32>() {
                stored.push(value);
            }
        }
    }
    if stored.is_empty() && table_exists(conn, "Frame_Parameters")? {
        let mut stmt = conn.prepare("SELECT DISTINCT FrameType FROM Frame_Parameters")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        for value in rows {
            stored.push(value? as i32);
        }
    }

    let has_zero = stored.contains(&0);
    let has_one = stored.contains(&1);
    if has_zero && has_one {
        return Err(UimfError::InconsistentFrameTypes);
    }
    Ok(if has_zero { 0 } else { 1 })
}

// ---------------------------------------------------------------------------
// Key/value parameter I/O
// ---------------------------------------------------------------------------

/// Upsert one global parameter.
pub fn put_global_param(
    conn: &Connection,
    id: i32,
    name: &str,
    data_type: ParamDataType,
    description: &str,
    value: &ParamValue,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO Global_Params
             (param_id, param_name, param_value, param_data_type, param_description)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (param_id) DO UPDATE SET param_value = excluded.param_value",
        rusqlite::params![
            id,
            name,
            value.to_stored_text(),
            data_type.stored_name(),
            description
        ],
    )?;
    Ok(())
}

/// Register a frame parameter key definition if it is not present yet.
pub fn ensure_frame_param_key(
    conn: &Connection,
    id: i32,
    name: &str,
    data_type: ParamDataType,
    description: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO Frame_Param_Keys
             (param_id, param_name, param_data_type, param_description)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, name, data_type.stored_name(), description],
    )?;
    Ok(())
}

/// Upsert one per-frame parameter.
pub fn put_frame_param(
    conn: &Connection,
    frame: i32,
    id: i32,
    value: &ParamValue,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO Frame_Params (frame_num, param_id, param_value)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (frame_num, param_id) DO UPDATE
             SET param_value = excluded.param_value",
        rusqlite::params![frame, id, value.to_stored_text()],
    )?;
    Ok(())
}

/// Load the id-to-type map from `Frame_Param_Keys`.
///
/// Ids missing from the table (or carrying a tag from a newer revision)
/// default to text, which coerces losslessly.
pub fn load_frame_key_types(
    conn: &Connection,
) -> Result<HashMap<i32, ParamDataType>, UimfError> {
    let mut types = HashMap::new();
    if !table_exists(conn, "Frame_Param_Keys")? {
        return Ok(types);
    }
    let mut stmt = conn.prepare("SELECT param_id, param_data_type FROM Frame_Param_Keys")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i32>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (id, tag) = row?;
        match ParamDataType::from_stored_name(&tag) {
            Some(data_type) => {
                types.insert(id, data_type);
            }
            None => {
                log::warn!("parameter {id} declares unknown data type {tag:?}; treating as text");
                types.insert(id, ParamDataType::Text);
            }
        }
    }
    Ok(types)
}

/// Read the global parameter entries from the key/value layout.
pub fn read_global_entries(conn: &Connection) -> Result<Vec<(i32, ParamValue)>, UimfError> {
    let mut stmt = conn.prepare(
        "SELECT param_id, param_name, param_value, param_data_type
         FROM Global_Params ORDER BY param_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i32>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, name, text, tag) = row?;
        let Some(text) = text else { continue };
        let data_type = ParamDataType::from_stored_name(&tag).unwrap_or(ParamDataType::Text);
        entries.push((id, ParamValue::from_stored_text(&name, &text, data_type)?));
    }
    Ok(entries)
}

/// Read one frame's parameter entries from the key/value layout.
pub fn read_frame_entries(
    conn: &Connection,
    frame: i32,
    key_types: &HashMap<i32, ParamDataType>,
) -> Result<Vec<(i32, ParamValue)>, UimfError> {
    let mut stmt = conn.prepare(
        "SELECT param_id, param_value FROM Frame_Params
         WHERE frame_num = ?1 ORDER BY param_id",
    )?;
    let rows = stmt.query_map([frame], |row| {
        Ok((row.get::<_, i32>(0)?, row.get::<_, Option<String>>(1)?))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, text) = row?;
        let Some(text) = text else { continue };
        let data_type = key_types
            .get(&id)
            .copied()
            .or_else(|| FrameParamKey::from_id(id).map(|k| k.data_type()))
            .unwrap_or(ParamDataType::Text);
        let name = FrameParamKey::from_id(id)
            .map(|k| k.name().to_string())
            .unwrap_or_else(|| format!("Param{id}"));
        entries.push((id, ParamValue::from_stored_text(&name, &text, data_type)?));
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Legacy wide-table access
// ---------------------------------------------------------------------------

/// Columns of a legacy `Frame_Parameters` table that are actually present
/// in the open file, resolved to parameter keys.
///
/// Probing logs each absent mapped column and each unmapped column once,
/// then row reads stay quiet.
#[derive(Debug, Clone)]
pub struct LegacyFrameSchema {
    columns: Vec<(String, FrameParamKey)>,
}

impl LegacyFrameSchema {
    /// Introspect the legacy frame table. `None` when the table is absent.
    pub fn probe(conn: &Connection) -> Result<Option<Self>, UimfError> {
        if !table_exists(conn, "Frame_Parameters")? {
            return Ok(None);
        }

        let mut stmt = conn.prepare("PRAGMA table_info(Frame_Parameters)")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        let mut present = Vec::new();
        for name in names {
            let name = name?;
            if name == "FrameNum" {
                continue;
            }
            match legacy::frame_column_key(&name) {
                Some(key) => present.push((name, key)),
                None => log::warn!("legacy frame column {name:?} has no parameter mapping"),
            }
        }

        for key in FrameParamKey::ALL {
            // Keys added after the wide layout was frozen never had a column.
            if matches!(
                key,
                FrameParamKey::DriftTubeTemperature
                    | FrameParamKey::ScanNumFirst
                    | FrameParamKey::ScanNumLast
            ) {
                continue;
            }
            if !present.iter().any(|(_, k)| *k == key) {
                log::debug!(
                    "legacy frame table is missing column for {}; using default",
                    key.name()
                );
            }
        }

        Ok(Some(Self { columns: present }))
    }

    /// Read one frame's parameters out of the wide table.
    ///
    /// `date_started` anchors the tick-encoded `StartTime` correction.
    pub fn read_frame(
        &self,
        conn: &Connection,
        frame: i32,
        date_started: &str,
    ) -> Result<Option<Vec<(i32, ParamValue)>>, UimfError> {
        if self.columns.is_empty() {
            return Ok(None);
        }
        let column_list = self
            .columns
            .iter()
            .map(|(name, _)| format!("\"{name}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let sql =
            format!("SELECT {column_list} FROM Frame_Parameters WHERE FrameNum = ?1");

        let mut stmt = conn.prepare(&sql)?;
        let row: Option<Vec<Value>> = stmt
            .query_row([frame], |row| {
                (0..self.columns.len())
                    .map(|i| row.get::<_, Value>(i))
                    .collect()
            })
            .optional()?;
        let Some(values) = row else {
            return Ok(None);
        };

        let mut entries = Vec::with_capacity(values.len());
        for ((_, key), value) in self.columns.iter().zip(values) {
            let Some(mut value) = sql_value_to_param(value, key.data_type(), key.name())? else {
                continue;
            };
            if *key == FrameParamKey::StartTimeMinutes {
                if let Some(raw) = value.to_f64() {
                    value = ParamValue::F64(legacy::normalize_start_time(raw, date_started));
                }
            }
            entries.push((key.id(), value));
        }
        Ok(Some(entries))
    }

    /// Frame numbers present in the legacy table, ascending.
    pub fn frame_numbers(&self, conn: &Connection) -> Result<Vec<i32>, UimfError> {
        let mut stmt =
            conn.prepare("SELECT FrameNum FROM Frame_Parameters ORDER BY FrameNum")?;
        let rows = stmt.query_map([], |row| row.get::<_, i32>(0))?;
        let mut frames = Vec::new();
        for frame in rows {
            frames.push(frame?);
        }
        Ok(frames)
    }
}

/// Read the legacy `Global_Parameters` row as parameter entries.
pub fn read_legacy_global_entries(
    conn: &Connection,
) -> Result<Vec<(i32, ParamValue)>, UimfError> {
    let mut stmt = conn.prepare("PRAGMA table_info(Global_Parameters)")?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut columns = Vec::new();
    for name in names {
        let name = name?;
        match legacy::global_column_key(&name) {
            Some(key) => columns.push((name, key)),
            None => log::warn!("legacy global column {name:?} has no parameter mapping"),
        }
    }

    if columns.is_empty() {
        return Ok(Vec::new());
    }
    let column_list = columns
        .iter()
        .map(|(name, _)| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("SELECT {column_list} FROM Global_Parameters LIMIT 1");

    let mut stmt = conn.prepare(&sql)?;
    let row: Option<Vec<Value>> = stmt
        .query_row([], |row| {
            (0..columns.len()).map(|i| row.get::<_, Value>(i)).collect()
        })
        .optional()?;
    let Some(values) = row else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::with_capacity(values.len());
    for ((_, key), value) in columns.iter().zip(values) {
        if let Some(value) = sql_value_to_param(value, key.data_type(), key.name())? {
            entries.push((key.id(), value));
        }
    }
    Ok(entries)
}

fn sql_value_to_param(
    value: Value,
    data_type: ParamDataType,
    name: &str,
) -> Result<Option<ParamValue>, UimfError> {
    let param = match value {
        Value::Null => return Ok(None),
        Value::Integer(v) => match data_type {
            ParamDataType::Int32 => ParamValue::I32(v as i32),
            ParamDataType::Int64 => ParamValue::I64(v),
            ParamDataType::Float64 => ParamValue::F64(v as f64),
            ParamDataType::Text => ParamValue::Text(v.to_string()),
            ParamDataType::Bytes => ParamValue::Bytes(v.to_le_bytes().to_vec()),
        },
        Value::Real(v) => match data_type {
            ParamDataType::Int32 => ParamValue::I32(v as i32),
            ParamDataType::Int64 => ParamValue::I64(v as i64),
            ParamDataType::Text => ParamValue::Text(v.to_string()),
            _ => ParamValue::F64(v),
        },
        Value::Text(text) => ParamValue::from_stored_text(name, &text, data_type)?,
        Value::Blob(bytes) => ParamValue::Bytes(bytes),
    };
    Ok(Some(param))
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

/// Populate the key/value tables from the legacy wide tables.
///
/// Runs when a legacy-only file is opened for write. Legacy tables are left
/// in place; readers may rely on either layout afterwards.
pub fn upconvert_legacy(conn: &Connection) -> Result<(), UimfError> {
    create_core_tables(conn)?;

    let already_converted = conn
        .query_row("SELECT COUNT(*) FROM Frame_Params", [], |row| {
            row.get::<_, i64>(0)
        })?
        > 0;

    if table_exists(conn, "Global_Parameters")? {
        let has_globals = conn
            .query_row("SELECT COUNT(*) FROM Global_Params", [], |row| {
                row.get::<_, i64>(0)
            })?
            > 0;
        if !has_globals {
            let entries = read_legacy_global_entries(conn)?;
            let global = GlobalParams::from_entries(entries)?;
            write_global_params(conn, &global)?;
        }
    }

    if already_converted {
        return Ok(());
    }
    let Some(legacy_schema) = LegacyFrameSchema::probe(conn)? else {
        return Ok(());
    };

    let date_started = read_global_entries(conn)
        .ok()
        .and_then(|entries| GlobalParams::from_entries(entries).ok())
        .map(|g| g.date_started)
        .unwrap_or_default();

    for frame in legacy_schema.frame_numbers(conn)? {
        if let Some(entries) = legacy_schema.read_frame(conn, frame, &date_started)? {
            for (id, value) in entries {
                if let Some(key) = FrameParamKey::from_id(id) {
                    ensure_frame_param_key(
                        conn,
                        key.id(),
                        key.name(),
                        key.data_type(),
                        key.description(),
                    )?;
                }
                put_frame_param(conn, frame, id, &value)?;
            }
        }
    }
    log::debug!("up-converted legacy parameter tables to the key/value layout");
    Ok(())
}

/// Write every entry of `global` into `Global_Params`.
pub fn write_global_params(conn: &Connection, global: &GlobalParams) -> Result<(), UimfError> {
    use crate::params::GlobalParamKey;
    for (id, value) in global.to_entries() {
        match GlobalParamKey::from_id(id) {
            Some(key) => put_global_param(
                conn,
                key.id(),
                key.name(),
                key.data_type(),
                key.description(),
                &value,
            )?,
            None => put_global_param(
                conn,
                id,
                &format!("Param{id}"),
                value.data_type(),
                "",
                &value,
            )?,
        }
    }
    Ok(())
}
