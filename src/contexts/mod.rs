mod artifact_writer;
mod code_blocks;
mod disk_tree;
mod entry_point;
mod exercise_service;
mod project_locator;
mod session_controller;

pub use artifact_writer::{ArtifactWriter, WriteError, PROBLEM_FILE, STARTER_DIR};
pub use code_blocks::{flatten_files, CodeBlockExtractor};
pub use disk_tree::DiskTree;
pub use entry_point::{
    namespace_declaration, public_class_name, EntryPoint, EntryPointResolver, ResolveError,
    DEFAULT_ENTRY_MARKER, DEFAULT_SOURCE_SUFFIX,
};
pub use exercise_service::{ExerciseService, ServiceError};
pub use project_locator::{
    ProjectLocator, WalkFilter, DEFAULT_BUILD_DESCRIPTORS, DEFAULT_EXCLUDED_DIRS,
    DEFAULT_SOURCE_DIR,
};
pub use session_controller::{SessionController, SessionError, SessionHandle, TEST_SOURCE_DIR};
