// Standard error codes, modelled on the gRPC status codes.
// https://grpc.github.io/grpc/core/md_doc_statuscodes.html
// Crate-specific errors map onto these so callers can handle them generically.
use std::error::Error;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ErrorCodes {
    // UNKNOWN indicates an unknown error.
    Unknown = 2,
    // INVALID_ARGUMENT indicates the caller passed an invalid argument.
    InvalidArgument = 3,
    // FAILED_PRECONDITION indicates the operation was rejected because the scorer is not in a state required for it.
    FailedPrecondition = 9,
    // OUT_OF_RANGE means the operation was attempted past the valid range.
    OutOfRange = 11,
    // UNIMPLEMENTED indicates the operation is not supported on this platform.
    Unimplemented = 12,
    // DATA_LOSS indicates unrecoverable data loss or corruption.
    DataLoss = 15,
}

impl ErrorCodes {
    /// Contract violations by the caller, as opposed to environmental failures.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            ErrorCodes::InvalidArgument | ErrorCodes::FailedPrecondition | ErrorCodes::OutOfRange
        )
    }
}

pub trait ScoringError: Error + Send {
    fn code(&self) -> ErrorCodes;
    fn boxed(self) -> Box<dyn ScoringError>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

impl Error for Box<dyn ScoringError> {}

impl ScoringError for Box<dyn ScoringError> {
    fn code(&self) -> ErrorCodes {
        self.as_ref().code()
    }
}

impl ScoringError for std::io::Error {
    fn code(&self) -> ErrorCodes {
        match self.kind() {
            std::io::ErrorKind::UnexpectedEof => ErrorCodes::DataLoss,
            std::io::ErrorKind::InvalidInput => ErrorCodes::OutOfRange,
            _ => ErrorCodes::Unknown,
        }
    }
}
