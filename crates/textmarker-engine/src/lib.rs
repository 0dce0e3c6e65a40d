pub mod anchors;
pub mod dom;
pub mod export;
pub mod highlight;
pub mod marking;
pub mod session;
pub mod store;

// Re-export key types for easier usage
pub use anchors::{AnchorLost, PathStep};
pub use dom::{Boundary, DomRange, DomTree, NodeId, RangeError};
pub use highlight::{Highlight, HighlightId};
pub use marking::RestoreReport;
pub use session::{Cmd, ExportFormat, Reply, Session, SessionError};
pub use store::{AnchorStore, HighlightStorage, JsonFileStorage, MemoryStorage, StorageError};
