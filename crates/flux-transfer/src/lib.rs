pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod naming;
pub mod subject;
pub mod transfer;

pub use backend::{MemoryBucket, MemoryStreamContext, ObjectBucket, StoredMessage, StreamContext};
#[cfg(feature = "nats")]
pub use backend::{NatsBucket, NatsStreamContext};
pub use config::{MeasurementPolicy, NatsConfig, TransferConfig, TransferSettings};
pub use error::{BackendError, BackendResult, Result, TransferError};
pub use logging::{build_subscriber, init_logging, LogFormat, LoggingConfig};
pub use transfer::{MeasurementInfo, Transfer, TransferOptions};

pub use flux_types::{MeasurementOption, Payload, PublishAck, RetentionPolicy, StreamConfig, StreamInfo, StreamState};
pub use tokio_util::sync::CancellationToken;
