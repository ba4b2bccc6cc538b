pub mod error;
pub mod integrations;
pub mod logging;
pub mod password;
pub mod rotation;
pub mod token;

pub use error::{AuthError, BackofficeError, Result};
pub use integrations::{
    BlobStorage, CacheStore, EmailClient, FilesystemBlobStorage, MessageConsumer, MessageHandler,
    MessagePublisher,
};
pub use logging::{
    CorrelationId, LogChannel, LogConfig, LogContext, LogFormat, LogGuard, init_logging,
    parse_log_level,
};
pub use password::{hash_password, verify_password};
pub use rotation::{Clock, DayWatch, RotatingFileWriter, RotationConfig, SystemClock};
pub use token::{Claims, TokenService};
