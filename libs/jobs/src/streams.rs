//! Stream definitions shared by producers and workers.

/// Compile-time binding of a job family to its Redis stream.
pub trait StreamDef {
    const STREAM_NAME: &'static str;
    const CONSUMER_GROUP: &'static str;
    /// Approximate cap applied with `XADD MAXLEN ~`.
    const MAX_LENGTH: i64 = 100_000;
}

/// Chained email validation jobs.
pub struct ValidityStream;

impl StreamDef for ValidityStream {
    const STREAM_NAME: &'static str = "email:validity";
    const CONSUMER_GROUP: &'static str = "validity_workers";
}

/// Per-client email send jobs.
pub struct SendStream;

impl StreamDef for SendStream {
    const STREAM_NAME: &'static str = "email:send";
    const CONSUMER_GROUP: &'static str = "send_workers";
}
