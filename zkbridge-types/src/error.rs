pub type Result<T> = std::result::Result<T, Error>;

/// Record decoding and validation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A field value the terminal would refuse
    #[error("Invalid record: {0}")]
    Validation(String),

    #[error("Malformed device data: {0}")]
    Parse(String),

    #[error("Record table of {len} bytes is not a multiple of any known record size")]
    UnknownRecordLayout { len: usize },
}
