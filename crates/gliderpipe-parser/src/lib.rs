pub mod errors;
pub mod model;
pub mod payload;
pub mod sequence;

pub use errors::ParserError;
pub use model::{DecodeStats, DecodedPayload};
pub use payload::{parse_payload, TIMESTAMP_COLUMN};
pub use sequence::extract_sequence;
