use crate::types::AreaId;

/// Which input a key or field came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSide {
    Table,
    Geometry,
}

impl std::fmt::Display for DataSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSide::Table => f.write_str("table"),
            DataSide::Geometry => f.write_str("geometry"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MapError {
    #[error(
        "join mismatch: table rows without geometry {unmatched_records:?}, geometry features without table row {unmatched_features:?}"
    )]
    JoinMismatch {
        unmatched_records: Vec<AreaId>,
        unmatched_features: Vec<AreaId>,
    },
    #[error("duplicate area id {id} in {side} input")]
    DuplicateKey { side: DataSide, id: AreaId },
    #[error("field '{field}' not found in {side} input")]
    MissingField { side: DataSide, field: String },
    #[error("unknown indicator '{name}'")]
    UnknownIndicator { name: String },
    #[error("malformed numeric value '{value}' in column '{column}' (row {row})")]
    MalformedNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("malformed geometry for area {id}: {reason}")]
    MalformedGeometry { id: AreaId, reason: String },
    #[error("invalid color '{0}', expected #RRGGBB")]
    InvalidColor(String),
}
