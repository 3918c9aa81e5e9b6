mod exercise;
mod file_tree;
mod messages;

pub use exercise::{
    review_messages, DescriptorError, FileDescriptor, GenerationData, GenerationRequest,
    GenerationResult, GenerationStatus, ReferenceSolution, ReviewPayload,
};
pub use file_tree::{FileTree, TreeEntry};
pub use messages::{
    ActiveDocument, ActivityState, FlightKind, NoticeLevel, PanelIntent, PanelMessage,
    ResponseData, ReviewDraft,
};
