//! Session orchestration: one controller per open panel.
//!
//! The controller owns all session state. Panels talk to it through a
//! channel of [`PanelIntent`]s and observe it only through the
//! [`PanelMessage`]s it emits. Network calls run as spawned tasks whose
//! outcomes come back through the same `select!` loop, so state changes are
//! totally ordered. At most one generate or review call is in flight; a
//! second request while one runs is rejected, not queued.

use super::artifact_writer::{ArtifactWriter, WriteError, PROBLEM_FILE, STARTER_DIR};
use super::code_blocks::CodeBlockExtractor;
use super::entry_point::{
    namespace_declaration, public_class_name, EntryPoint, EntryPointResolver, ResolveError,
    DEFAULT_ENTRY_MARKER, DEFAULT_SOURCE_SUFFIX,
};
use super::exercise_service::{ExerciseService, ServiceError};
use super::project_locator::{
    ProjectLocator, WalkFilter, DEFAULT_BUILD_DESCRIPTORS, DEFAULT_SOURCE_DIR,
};
use crate::data::{
    FileDescriptor, FileTree, FlightKind, GenerationData, GenerationRequest, GenerationResult,
    NoticeLevel, PanelIntent, PanelMessage, ReferenceSolution, ResponseData, ReviewDraft,
    ReviewPayload,
};
use crate::settings::Settings;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Conventional test source directory, mirroring the main one.
pub const TEST_SOURCE_DIR: &str = "src/test/java";

/// Inbound intents buffered per session.
const INTENT_BUFFER: usize = 32;

/// Everything that can end a session action early.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No project, no active document and similar user or environment problems
    #[error("{0}")]
    Environment(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The backend answered but reported failure
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// The response is usable JSON but lacks something we need
    #[error("{0}")]
    Data(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// State owned by exactly one controller.
#[derive(Debug, Default)]
struct SessionState {
    reference_solution: Option<ReferenceSolution>,
    in_flight: Option<FlightKind>,
    active_cancellation: Option<CancellationToken>,
    last_topic: Option<String>,
    last_smells: Vec<String>,
}

enum Completion {
    Generate {
        request: GenerationRequest,
        outcome: Result<GenerationResult, ServiceError>,
    },
    Review {
        outcome: Result<Vec<String>, ServiceError>,
    },
}

/// The panel's side of a running session.
///
/// Dropping `intents` (or calling [`SessionHandle::close`]) disposes the
/// session: any in-flight call is cancelled and the state is discarded.
pub struct SessionHandle {
    pub intents: mpsc::Sender<PanelIntent>,
    pub messages: mpsc::UnboundedReceiver<PanelMessage>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Closes the intent channel and waits for the controller to stop.
    pub async fn close(self) -> mpsc::UnboundedReceiver<PanelMessage> {
        let SessionHandle {
            intents,
            messages,
            task,
        } = self;
        drop(intents);
        if let Err(e) = task.await {
            error!(error = %e, "session task failed");
        }
        messages
    }
}

pub struct SessionController {
    settings: Settings,
    service: Arc<dyn ExerciseService>,
    tree: Box<dyn FileTree + Send + Sync>,
    locator: ProjectLocator,
    resolver: EntryPointResolver,
    extractor: CodeBlockExtractor,
    state: SessionState,
    outbound: mpsc::UnboundedSender<PanelMessage>,
    completions: mpsc::UnboundedSender<Completion>,
    completions_rx: Option<mpsc::UnboundedReceiver<Completion>>,
}

impl SessionController {
    pub fn new(
        settings: Settings,
        service: Arc<dyn ExerciseService>,
        tree: Box<dyn FileTree + Send + Sync>,
        outbound: mpsc::UnboundedSender<PanelMessage>,
    ) -> Self {
        let filter = WalkFilter::new(settings.excluded_dirs.iter().cloned());
        let locator = ProjectLocator::new(
            DEFAULT_BUILD_DESCRIPTORS.iter().copied(),
            DEFAULT_SOURCE_DIR,
            filter,
        );
        let resolver = EntryPointResolver::new(
            DEFAULT_ENTRY_MARKER,
            DEFAULT_SOURCE_SUFFIX,
            WalkFilter::hidden_only(),
        );
        let extractor = CodeBlockExtractor::new(&settings.fence_language);
        let (completions, completions_rx) = mpsc::unbounded_channel();

        Self {
            settings,
            service,
            tree,
            locator,
            resolver,
            extractor,
            state: SessionState::default(),
            outbound,
            completions,
            completions_rx: Some(completions_rx),
        }
    }

    /// Starts a controller on its own task and returns the panel's handle.
    pub fn open(
        settings: Settings,
        service: Arc<dyn ExerciseService>,
        tree: Box<dyn FileTree + Send + Sync>,
    ) -> SessionHandle {
        let (outbound, messages) = mpsc::unbounded_channel();
        let (intents, intent_rx) = mpsc::channel(INTENT_BUFFER);
        let controller = SessionController::new(settings, service, tree, outbound);
        let task = tokio::spawn(controller.run(intent_rx));
        SessionHandle {
            intents,
            messages,
            task,
        }
    }

    /// Processes intents until the channel closes.
    pub async fn run(mut self, mut intents: mpsc::Receiver<PanelIntent>) {
        let Some(mut completions) = self.completions_rx.take() else {
            error!("session controller was already run");
            return;
        };
        info!(workspace = %self.settings.workspace_root.display(), "session opened");

        loop {
            tokio::select! {
                Some(done) = completions.recv() => self.complete(done),
                intent = intents.recv() => match intent {
                    Some(intent) => self.handle(intent),
                    None => break,
                },
            }
        }

        if let Some(token) = self.state.active_cancellation.take() {
            token.cancel();
        }
        info!("session closed");
    }

    fn handle(&mut self, intent: PanelIntent) {
        debug!(?intent, "intent received");
        match intent {
            PanelIntent::Submit { topic, smells } => self.start_generate(topic, smells),
            PanelIntent::Review { payload } => self.start_review(payload),
            PanelIntent::ShowAnswerFile => self.show_answer_file(),
        }
    }

    fn emit(&self, message: PanelMessage) {
        if self.outbound.send(message).is_err() {
            debug!("panel is gone; dropping message");
        }
    }

    fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        self.emit(PanelMessage::notice(level, text));
    }

    /// Emits a rejection and returns true when something is already in flight.
    fn reject_if_busy(&self, kind: FlightKind) -> bool {
        let Some(active) = self.state.in_flight else {
            return false;
        };
        warn!(requested = %kind, running = %active, "rejecting request while busy");
        self.emit(PanelMessage::Rejected {
            kind,
            reason: format!("A {} request is already running", active),
        });
        true
    }

    fn begin(&mut self, kind: FlightKind) -> CancellationToken {
        let token = CancellationToken::new();
        self.state.in_flight = Some(kind);
        self.state.active_cancellation = Some(token.clone());
        self.emit(PanelMessage::busy(kind));
        token
    }

    fn finish(&mut self) {
        self.state.in_flight = None;
        self.state.active_cancellation = None;
        self.emit(PanelMessage::idle());
    }

    fn start_generate(&mut self, topic: String, smells: Vec<String>) {
        if self.reject_if_busy(FlightKind::Generate) {
            return;
        }
        let token = self.begin(FlightKind::Generate);
        let request = GenerationRequest {
            topic,
            code_smells: smells,
        };
        info!(topic = %request.topic, smells = request.code_smells.len(), "requesting exercise");

        let service = Arc::clone(&self.service);
        let done = self.completions.clone();
        let limit = self.settings.request_timeout;
        tokio::spawn(async move {
            let outcome = bounded(limit, &token, service.generate(&request)).await;
            let _ = done.send(Completion::Generate { request, outcome });
        });
    }

    fn start_review(&mut self, draft: ReviewDraft) {
        if self.reject_if_busy(FlightKind::Review) {
            return;
        }
        let payload = match self.build_review_payload(draft) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "review aborted before sending");
                self.emit(PanelMessage::ReviewError {
                    error: e.to_string(),
                });
                return;
            }
        };

        let token = self.begin(FlightKind::Review);
        info!(
            topic = self.state.last_topic.as_deref().unwrap_or("none"),
            smells = payload.code_smells.len(),
            "requesting review"
        );

        let service = Arc::clone(&self.service);
        let done = self.completions.clone();
        let limit = self.settings.request_timeout;
        tokio::spawn(async move {
            let outcome = bounded(limit, &token, service.review(&payload)).await;
            let _ = done.send(Completion::Review { outcome });
        });
    }

    fn complete(&mut self, done: Completion) {
        match done {
            Completion::Generate { request, outcome } => {
                let result = outcome
                    .map_err(SessionError::from)
                    .and_then(|result| self.materialize(&request, result));
                match result {
                    Ok((root, manifest)) => {
                        let files: Vec<String> =
                            manifest.iter().map(|p| p.display().to_string()).collect();
                        let question =
                            format!("Saved {} file(s) to {}", files.len(), root.display());
                        self.emit(PanelMessage::GenerateComplete { files });
                        self.emit(PanelMessage::Response {
                            data: ResponseData {
                                topic: request.topic,
                                smells: request.code_smells,
                                question: question.clone(),
                            },
                        });
                        self.notify(NoticeLevel::Info, question);
                    }
                    Err(e) => {
                        error!(error = %e, "generation failed");
                        self.notify(
                            NoticeLevel::Error,
                            format!("Error generating exercise: {}", e),
                        );
                    }
                }
            }
            Completion::Review { outcome } => match outcome {
                Ok(messages) => {
                    info!(messages = messages.len(), "review received");
                    self.emit(PanelMessage::ReviewResponse { messages });
                }
                Err(e) => {
                    error!(error = %e, "review failed");
                    self.emit(PanelMessage::ReviewError {
                        error: e.to_string(),
                    });
                }
            },
        }
        self.finish();
    }

    /// The workspace as an absolute path, so it compares against the
    /// absolute document paths editors send.
    fn workspace(&self) -> PathBuf {
        self.canonical(&self.settings.workspace_root)
    }

    fn canonical(&self, path: &Path) -> PathBuf {
        self.tree.canonicalize(path).unwrap_or_else(|e| {
            debug!(path = %path.display(), error = %e, "keeping path as given");
            path.to_path_buf()
        })
    }

    fn project_root(&self) -> Option<PathBuf> {
        self.locator.locate(self.tree.as_ref(), &self.workspace())
    }

    /// Writes a validated generation into the project and updates the session.
    ///
    /// Every check runs before the first write, so data and environment
    /// errors leave the project untouched.
    fn materialize(
        &mut self,
        request: &GenerationRequest,
        result: GenerationResult,
    ) -> Result<(PathBuf, Vec<PathBuf>), SessionError> {
        let data = accept_generation(result)?;
        let root = self.project_root().ok_or_else(|| {
            SessionError::Environment(format!(
                "No Spring Boot project detected under {}",
                self.settings.workspace_root.display()
            ))
        })?;

        let needs_namespace = data
            .project_files
            .iter()
            .chain(&data.test_files)
            .any(FileDescriptor::is_bare_file_name);
        let entry = if needs_namespace {
            Some(
                self.resolver
                    .resolve(self.tree.as_ref(), &root.join(self.locator.source_dir()))?,
            )
        } else {
            None
        };

        let main_dir = self.locator.source_dir().to_path_buf();
        let main_files = place_files(&data.project_files, entry.as_ref(), &main_dir);
        let test_files = place_files(&data.test_files, entry.as_ref(), Path::new(TEST_SOURCE_DIR));
        let problem = Some(data.problem_description.as_str()).filter(|p| !p.trim().is_empty());

        let writer = ArtifactWriter::new(self.tree.as_ref());
        let manifest = writer.write(&root, &main_files, &test_files, problem)?;

        if self.settings.snapshot_starter {
            if let Err(e) = writer.snapshot_starter(&root, &main_files) {
                warn!(error = %e, "starter snapshot failed");
                self.notify(
                    NoticeLevel::Warning,
                    format!("Could not save the starter copy: {}", e),
                );
            }
        }

        if let Some(reference) = data.reference_solution {
            self.state.reference_solution = Some(reference);
        }
        self.state.last_topic = Some(request.topic.clone());
        self.state.last_smells = request.code_smells.clone();

        Ok((root, manifest))
    }

    fn build_review_payload(&self, draft: ReviewDraft) -> Result<ReviewPayload, SessionError> {
        let document = draft
            .document
            .ok_or_else(|| SessionError::Environment("No active editor found!".to_string()))?;
        let root = self.project_root().unwrap_or_else(|| self.workspace());

        let problem_description = match self.tree.read_to_string(&root.join(PROBLEM_FILE)) {
            Ok(text) => text,
            Err(_) => {
                self.notify(
                    NoticeLevel::Warning,
                    format!("{} not found in project root. Using empty description.", PROBLEM_FILE),
                );
                String::new()
            }
        };

        let document_path = PathBuf::from(&document.path);
        let relative = if document_path.is_absolute() {
            self.canonical(&document_path)
                .strip_prefix(&root)
                .ok()
                .map(Path::to_path_buf)
        } else {
            Some(document_path)
        };
        let original_code = relative
            .and_then(|rel| self.tree.read_to_string(&root.join(STARTER_DIR).join(rel)).ok())
            .unwrap_or_else(|| {
                self.notify(
                    NoticeLevel::Warning,
                    format!("Starter file not found for {}. Using empty string.", document.path),
                );
                String::new()
            });

        let reference_solution = self.extractor.extract(self.state.reference_solution.as_ref());
        if reference_solution.is_empty() {
            debug!("reviewing without a reference solution");
        }

        Ok(ReviewPayload {
            problem_description,
            original_code,
            student_code: document.content,
            reference_solution,
            test_results: draft.test_results.unwrap_or_default(),
            code_smells: draft
                .code_smells
                .unwrap_or_else(|| self.state.last_smells.clone()),
        })
    }

    fn show_answer_file(&self) {
        let code = self.extractor.extract(self.state.reference_solution.as_ref());
        if code.trim().is_empty() {
            self.notify(NoticeLevel::Warning, "No reference solution available");
            return;
        }

        let stem = public_class_name(&code).unwrap_or_else(|| "ReferenceSolution".to_string());
        let file_name = format!("{}.{}", stem, self.extractor.language());
        let writer = ArtifactWriter::new(self.tree.as_ref());
        match writer.write_scratch(&self.settings.scratch_dir, &file_name, &code) {
            Ok(path) => {
                info!(path = %path.display(), "reference solution written");
                self.emit(PanelMessage::AnswerFile {
                    path: path.display().to_string(),
                    content: code,
                });
            }
            Err(e) => {
                error!(error = %e, "could not write reference solution");
                self.notify(
                    NoticeLevel::Error,
                    format!("Could not open the reference solution: {}", e),
                );
            }
        }
    }
}

/// Runs `call` until it finishes, the token is cancelled, or `limit` passes.
/// A timeout cancels the token so the abort is visible to other holders.
async fn bounded<T, F>(limit: Duration, token: &CancellationToken, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    tokio::select! {
        _ = token.cancelled() => Err(ServiceError::Cancelled),
        result = tokio::time::timeout(limit, call) => match result {
            Ok(outcome) => outcome,
            Err(_) => {
                token.cancel();
                Err(ServiceError::TimedOut(limit))
            }
        },
    }
}

/// Turns a raw generation response into data we can write, or the reason we can't.
fn accept_generation(result: GenerationResult) -> Result<GenerationData, SessionError> {
    if !result.is_success() {
        let message = if result.message.trim().is_empty() {
            "backend reported failure".to_string()
        } else {
            result.message
        };
        return Err(SessionError::GenerationFailed(message));
    }
    let data = result
        .data
        .ok_or_else(|| SessionError::Data("Response has no data section".to_string()))?;
    if data.project_files.is_empty() {
        return Err(SessionError::Data(
            "Response contains no project files".to_string(),
        ));
    }
    Ok(data)
}

/// Places bare file names under the namespace directory of `source_dir` and
/// gives them a package declaration when they lack one. Paths with a
/// directory part are kept as they are.
fn place_files(
    files: &[FileDescriptor],
    entry: Option<&EntryPoint>,
    source_dir: &Path,
) -> Vec<FileDescriptor> {
    files
        .iter()
        .map(|file| match entry {
            Some(entry) if file.is_bare_file_name() => {
                let path = source_dir
                    .join(entry.namespace_path())
                    .join(file.relative_path());
                let path = path
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join("/");
                let content = if namespace_declaration(&file.content).is_some() {
                    file.content.clone()
                } else {
                    format!("package {};\n\n{}", entry.namespace, file.content)
                };
                FileDescriptor { path, content }
            }
            _ => file.clone(),
        })
        .collect()
}
