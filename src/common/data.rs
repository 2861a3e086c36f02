// Scalar data values and the null singleton.
//
// Scalars round-trip through `dump_value`/`set_dumped_value`; null is never
// dumped as a scalar — callers keep the reserved `NullData` singleton and
// store a null flag beside the payload.

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};

/// A non-null scalar value as stored in record and index files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarData {
    Int(i32),
    Int64(i64),
    Double(f64),
    Str(String),
    Binary(Vec<u8>),
}

impl ScalarData {
    /// Serialize into the on-disk representation.
    pub fn dump_value(&self) -> Result<Vec<u8>> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())?;
        Ok(bytes)
    }

    /// Reconstruct a value dumped by `dump_value`.
    pub fn set_dumped_value(bytes: &[u8]) -> Result<ScalarData> {
        let (value, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(value)
    }

    pub fn is_null(&self) -> bool {
        false
    }
}

/// The reserved null value.
///
/// There is exactly one instance per process; it can never hold a value and
/// never stop being null.
#[derive(Debug)]
pub struct NullData {
    _private: (),
}

static NULL_DATA: NullData = NullData { _private: () };

impl NullData {
    /// The process-wide singleton.
    pub fn instance() -> &'static NullData {
        &NULL_DATA
    }

    pub fn is_null(&self) -> bool {
        true
    }

    /// Null cannot be assigned from another value.
    pub fn assign(&self, _other: &ScalarData) -> Result<()> {
        Err(DbError::NullNotAssignable)
    }

    /// Null cannot be made non-null in place.
    pub fn set_null(&self, value: bool) -> Result<()> {
        if value {
            Ok(())
        } else {
            Err(DbError::NullNotAssignable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trip() {
        let values = [
            ScalarData::Int(42),
            ScalarData::Int64(-1),
            ScalarData::Double(2.5),
            ScalarData::Str("hello".to_string()),
            ScalarData::Binary(vec![0, 1, 2, 255]),
        ];
        for v in values {
            let bytes = v.dump_value().unwrap();
            let back = ScalarData::set_dumped_value(&bytes).unwrap();
            assert_eq!(v, back);
        }
    }

    #[test]
    fn null_is_singleton_and_rejects_assign() {
        let a = NullData::instance() as *const NullData;
        let b = NullData::instance() as *const NullData;
        assert_eq!(a, b);
        assert!(NullData::instance()
            .assign(&ScalarData::Int(1))
            .is_err());
        assert!(NullData::instance().set_null(false).is_err());
        assert!(NullData::instance().set_null(true).is_ok());
    }
}
