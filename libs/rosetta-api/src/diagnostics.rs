/// Fire-and-forget diagnostics sink.
///
/// Implementations must never fail back into the caller; a sink that
/// cannot write simply drops the line.
pub trait Diagnostics: Send + Sync {
    fn log_error(&self, message: &str);
    fn log_info(&self, message: &str);
}
