pub mod config;
pub mod error_handler;
pub mod logging;
pub mod notifications;

pub use config::SyncConfig;
pub use error_handler::{
    ClassifiedError, ErrorKind, UNRECOGNIZED_CHAIN_CODE, USER_REJECTED_CODE, classify_error,
    classify_provider_error,
};
pub use notifications::{Toast, ToastKind, ToastStore};
