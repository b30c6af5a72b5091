pub mod messages;
pub mod models;
pub mod payloads;
pub mod transform;

pub use messages::{classify, MessageKind};
pub use models::{Change, ChangeState, Document, Event, EventKind, FileDetail, OnChange};
pub use payloads::ChangePayload;
pub use transform::{ChangeExtractor, ExtractError, ExtractFailure, Extraction};
