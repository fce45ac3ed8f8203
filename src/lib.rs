pub mod assets;
pub mod config;
pub mod context;
pub mod events;
pub mod history;
pub mod index;
pub mod mutation;
pub mod path;
pub mod record;
pub mod schema;
pub mod selection;
pub mod snapshot;
pub mod sync;

pub use assets::AssetStore;
pub use config::EditorConfig;
pub use context::{EditorContext, Effect};
pub use events::{EditorEvent, EventBus};
pub use history::{Command, HistoryAction, HistoryStack, RestoreEntry};
pub use index::{ReferenceIndex, ReferenceMap, ReferenceSite};
pub use mutation::{AddEntityOptions, ClipboardPayload};
pub use path::{KeyPath, PathPattern, PathSeg};
pub use record::{Change, ChangeEvent, Record, RecordId};
pub use schema::SchemaSet;
pub use selection::{Selection, SelectionKind};
pub use snapshot::ProjectSnapshot;
pub use sync::{SceneOp, SyncBridge};
