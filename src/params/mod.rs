//! # Parameter Model
//!
//! Typed key/value metadata for frames and for the dataset as a whole.
//!
//! A parameter is `(id, name, data type, value)`. Ids come from the closed
//! enums in [`keys`] and are stable across file format versions: new
//! parameters get new ids, and ids are never reused. Values are stored as
//! text in the database and coerced through [`ParamValue`] on either side.
//!
//! [`FrameParams`] and [`GlobalParams`] are the typed views the rest of the
//! library works with. Parameters carried by a file but not modeled as a
//! struct field (including ids this build does not know at all) are kept in
//! an overflow map and written back verbatim, so round-tripping a file never
//! drops metadata. Unknown ids are additionally logged once each.
//!
//! The [`legacy`] module maps the wide `Frame_Parameters` /
//! `Global_Parameters` tables of old files onto these keys.

pub mod legacy;

mod frame;
mod global;
mod keys;
mod value;


pub use frame::{FrameParams, FrameType, PressureUnits};
pub use global::GlobalParams;
pub use keys::{FrameParamKey, GlobalParamKey};
pub use value::{ParamDataType, ParamValue};

/// Errors from the parameter model
#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    /// A parameter id in the file is not in the closed key enum.
    ///
    /// Recoverable: the value is preserved untyped and the id is logged
    /// once. This variant is only surfaced when a caller asks for a typed
    /// view of such a parameter.
    #[error("unknown parameter id {id} ({name})")]
    UnknownParameter {
        /// The unrecognized id
        id: i32,
        /// Name recorded in the file's key-definition table, if any
        name: String,
    },

    /// A stored text value failed to coerce to its declared data type
    #[error("cannot parse {value:?} for parameter {name} as {expected:?}")]
    ValueParse {
        /// Parameter name
        name: String,
        /// The stored text
        value: String,
        /// The declared data type
        expected: ParamDataType,
    },

    /// A stored frame type is not one of the defined labels
    #[error("undefined frame type {0}")]
    UndefinedFrameType(i32),
}
