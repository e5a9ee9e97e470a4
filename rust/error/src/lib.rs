// A subset of the gRPC status codes
// (https://grpc.github.io/grpc/core/md_doc_statuscodes.html). Error types in
// the discovery crates report one of these so callers can handle them
// generically, e.g. when translating into an HTTP response.
use std::error::Error;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ErrorCodes {
    // INVALID_ARGUMENT indicates client specified an invalid argument.
    InvalidArgument = 3,
    // INTERNAL errors are internal errors.
    Internal = 13,
    // UNAVAILABLE indicates the backing store is currently unavailable.
    Unavailable = 14,
    // DATA_LOSS indicates a stored record could not be decoded.
    DataLoss = 15,
}

impl ErrorCodes {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCodes::InvalidArgument => "InvalidArgumentError",
            ErrorCodes::Internal => "InternalError",
            ErrorCodes::Unavailable => "UnavailableError",
            ErrorCodes::DataLoss => "DataLossError",
        }
    }
}

#[cfg(feature = "http")]
impl From<ErrorCodes> for http::StatusCode {
    fn from(error_code: ErrorCodes) -> Self {
        match error_code {
            ErrorCodes::InvalidArgument => http::StatusCode::BAD_REQUEST,
            ErrorCodes::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCodes::Unavailable => http::StatusCode::SERVICE_UNAVAILABLE,
            ErrorCodes::DataLoss => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub trait DiscoveryError: Error + Send + Sync {
    fn code(&self) -> ErrorCodes;
    fn should_trace_error(&self) -> bool {
        true
    }
}

impl Error for Box<dyn DiscoveryError> {}

impl DiscoveryError for Box<dyn DiscoveryError> {
    fn code(&self) -> ErrorCodes {
        self.as_ref().code()
    }

    fn should_trace_error(&self) -> bool {
        self.as_ref().should_trace_error()
    }
}
