pub mod destination;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod overrides;
pub mod record;
pub mod storage;

pub use destination::{Destination, Transport};
pub use diagnostics::Diagnostics;
pub use error::{StatusError, StoreError, TransformError, TransformErrorKind};
pub use format::OutputFormat;
pub use overrides::FieldOverrides;
pub use record::{Record, RecordId, RecordStatus};
pub use storage::RecordStore;
