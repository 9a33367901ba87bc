//! Data models for Roost

mod account;
mod entry;
pub(crate) mod status;
mod status_id;
mod timeline;

pub use account::Account;
pub use entry::{TimelineEntry, UiState, UiStateChange};
pub use status::{Author, MediaAttachment, MediaType, Status, strip_html};
pub use status_id::{StatusId, id_range};
pub use timeline::{LoadType, RemoteKeyKind, TimelineId};
