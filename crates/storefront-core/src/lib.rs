pub mod canonical;
pub mod error;
pub mod id;
pub mod request;
pub mod time;

pub use canonical::{BINARY_BODY_SENTINEL, CanonicalKey, canonicalize, resolve_url};
pub use error::{CoreError, Result};
pub use id::RequestId;
pub use request::{ApiRequest, FormData, FormPart, RequestBody};
pub use time::{Clock, ManualClock, SharedClock, SystemClock, system_clock};
