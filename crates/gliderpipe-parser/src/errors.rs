use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("payload format mismatch: {reason}")]
    FormatMismatch { reason: String },

    #[error("payload CSV error: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },

    #[error("payload validation error: {message}")]
    Validation { message: String },

    #[error("payload did not contain any data rows")]
    EmptyData,
}

impl From<csv::Error> for ParserError {
    fn from(source: csv::Error) -> Self {
        ParserError::Csv { source }
    }
}
