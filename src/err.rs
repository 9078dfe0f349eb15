use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("record is not valid XML: {message}")]
    MalformedRecord { message: String },

    #[error("failed to write CSV output: {source}")]
    CsvOutput {
        #[from]
        source: csv::Error,
    },

    #[error("an I/O error has occurred: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn malformed_record(message: impl Into<String>) -> Self {
        Error::MalformedRecord {
            message: message.into(),
        }
    }
}
