use super::ParamError;

/// Scalar data type attached to a parameter key.
///
/// The closed set of types a parameter value may carry. On disk every value
/// is text; the tag drives coercion in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamDataType {
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit float
    Float64,
    /// UTF-8 text
    Text,
    /// Raw bytes, stored hex-encoded
    Bytes,
}

impl ParamDataType {
    /// Tag stored in the `param_data_type` column.
    pub fn stored_name(&self) -> &'static str {
        match self {
            ParamDataType::Int32 => "int32",
            ParamDataType::Int64 => "int64",
            ParamDataType::Float64 => "float64",
            ParamDataType::Text => "text",
            ParamDataType::Bytes => "bytes",
        }
    }

    /// Inverse of [`stored_name`](Self::stored_name); `None` for tags from
    /// a newer file format revision.
    pub fn from_stored_name(name: &str) -> Option<Self> {
        match name {
            "int32" => Some(ParamDataType::Int32),
            "int64" => Some(ParamDataType::Int64),
            "float64" => Some(ParamDataType::Float64),
            "text" => Some(ParamDataType::Text),
            "bytes" => Some(ParamDataType::Bytes),
            _ => None,
        }
    }
}

/// A parameter value, tagged with its scalar type
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// 32-bit signed integer
    I32(i32),
    /// 64-bit signed integer
    I64(i64),
    /// 64-bit float
    F64(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl ParamValue {
    /// The data type tag of this value
    pub fn data_type(&self) -> ParamDataType {
        match self {
            ParamValue::I32(_) => ParamDataType::Int32,
            ParamValue::I64(_) => ParamDataType::Int64,
            ParamValue::F64(_) => ParamDataType::Float64,
            ParamValue::Text(_) => ParamDataType::Text,
            ParamValue::Bytes(_) => ParamDataType::Bytes,
        }
    }

    /// Render the database text representation.
    pub fn to_stored_text(&self) -> String {
        match self {
            ParamValue::I32(v) => v.to_string(),
            ParamValue::I64(v) => v.to_string(),
            ParamValue::F64(v) => {
                // Shortest round-trippable float form
                format!("{v}")
            }
            ParamValue::Text(v) => v.clone(),
            ParamValue::Bytes(v) => v.iter().map(|b| format!("{b:02x}")).collect(),
        }
    }

    /// Coerce stored text back into a typed value.
    pub fn from_stored_text(
        name: &str,
        text: &str,
        data_type: ParamDataType,
    ) -> Result<Self, ParamError> {
        let parse_error = || ParamError::ValueParse {
            name: name.to_string(),
            value: text.to_string(),
            expected: data_type,
        };

        match data_type {
            ParamDataType::Int32 => parse_integer(text)
                .and_then(|v| i32::try_from(v).ok())
                .map(ParamValue::I32)
                .ok_or_else(parse_error),
            ParamDataType::Int64 => parse_integer(text)
                .map(ParamValue::I64)
                .ok_or_else(parse_error),
            ParamDataType::Float64 => {
                text.trim().parse().map(ParamValue::F64).map_err(|_| parse_error())
            }
            ParamDataType::Text => Ok(ParamValue::Text(text.to_string())),
            ParamDataType::Bytes => decode_hex(text).map(ParamValue::Bytes).ok_or_else(parse_error),
        }
    }

    /// Numeric view of the value, if it has one.
    ///
    /// Text is parsed leniently, which tolerates legacy files that stored
    /// numbers under a text tag.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            ParamValue::I32(v) => Some(*v as f64),
            ParamValue::I64(v) => Some(*v as f64),
            ParamValue::F64(v) => Some(*v),
            ParamValue::Text(v) => v.trim().parse().ok(),
            ParamValue::Bytes(_) => None,
        }
    }

    /// Integer view of the value, truncating floats.
    pub fn to_i32(&self) -> Option<i32> {
        match self {
            ParamValue::I32(v) => Some(*v),
            ParamValue::I64(v) => i32::try_from(*v).ok(),
            ParamValue::F64(v) => Some(*v as i32),
            ParamValue::Text(v) => parse_integer(v).and_then(|n| i32::try_from(n).ok()),
            ParamValue::Bytes(_) => None,
        }
    }

    /// Text view of the value, when it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

// Integer columns in legacy files sometimes carry "3.0"; accept a float
// form when it is integral.
fn parse_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < 9.2e18 => Some(v as i64),
        _ => None,
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let trimmed = text.trim();
    if trimmed.len() % 2 != 0 {
        return None;
    }
    (0..trimmed.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(trimmed.get(i..i + 2)?, 16).ok())
        .collect()
}
