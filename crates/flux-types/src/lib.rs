pub mod measurement;
pub mod stream;

pub use measurement::{MeasurementOption, Payload};
pub use stream::{PublishAck, RetentionPolicy, StreamConfig, StreamInfo, StreamState};
