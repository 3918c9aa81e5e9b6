use async_trait::async_trait;
use refactor_studio::contexts::{DiskTree, ExerciseService, ServiceError, SessionController, SessionHandle};
use refactor_studio::data::{
    ActiveDocument, ActivityState, FileDescriptor, FlightKind, GenerationData, GenerationRequest,
    GenerationResult, GenerationStatus, NoticeLevel, PanelIntent, PanelMessage, ReferenceSolution,
    ReviewDraft, ReviewPayload,
};
use refactor_studio::settings::Settings;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

/// Backend double: answers from a queue, optionally holding generate calls
/// until released, and never answering once the queue is empty.
#[derive(Default)]
struct ScriptedService {
    generate_calls: AtomicUsize,
    review_calls: AtomicUsize,
    generations: Mutex<VecDeque<Result<GenerationResult, ServiceError>>>,
    reviews: Mutex<VecDeque<Result<Vec<String>, ServiceError>>>,
    gate: Option<Arc<Notify>>,
    last_review: Mutex<Option<ReviewPayload>>,
}

impl ScriptedService {
    fn with_generations(results: Vec<GenerationResult>) -> Self {
        Self {
            generations: Mutex::new(results.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn with_review(self, messages: Vec<&str>) -> Self {
        self.reviews
            .lock()
            .unwrap()
            .push_back(Ok(messages.into_iter().map(str::to_string).collect()));
        self
    }
}

#[async_trait]
impl ExerciseService for ScriptedService {
    async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResult, ServiceError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.generations.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn review(&self, payload: &ReviewPayload) -> Result<Vec<String>, ServiceError> {
        self.review_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_review.lock().unwrap() = Some(payload.clone());
        let next = self.reviews.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

const BANK_SOLUTION: &str = "Refactored:\n```java\npublic class Bank {}\n```\n";

fn seed_project(root: &Path, app_source: &str) {
    fs::write(root.join("pom.xml"), "<project/>").unwrap();
    fs::create_dir_all(root.join("src/main/java/com/x")).unwrap();
    fs::write(root.join("src/main/java/com/x/App.java"), app_source).unwrap();
}

fn spring_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    seed_project(
        dir.path(),
        "package com.x;\n\n@SpringBootApplication\npublic class App {}\n",
    );
    dir
}

fn settings_for(dir: &Path) -> Settings {
    Settings {
        workspace_root: dir.to_path_buf(),
        scratch_dir: dir.join("scratch"),
        request_timeout: Duration::from_secs(5),
        ..Settings::default()
    }
}

fn success(files: Vec<FileDescriptor>, problem: &str, reference: Option<&str>) -> GenerationResult {
    GenerationResult {
        status: GenerationStatus::Success,
        message: "ok".to_string(),
        data: Some(GenerationData {
            problem_description: problem.to_string(),
            project_files: files,
            test_files: Vec::new(),
            reference_solution: reference.map(|r| ReferenceSolution::Markdown(r.to_string())),
        }),
    }
}

fn bank_generation() -> GenerationResult {
    success(
        vec![FileDescriptor::new(
            "src/main/java/com/x/Bank.java",
            "public class Bank { void everything() {} }",
        )],
        "Split the bank's god method.",
        Some(BANK_SOLUTION),
    )
}

fn open(dir: &Path, service: Arc<ScriptedService>) -> SessionHandle {
    SessionController::open(settings_for(dir), service, Box::new(DiskTree::new()))
}

fn open_with(settings: Settings, service: Arc<ScriptedService>) -> SessionHandle {
    SessionController::open(settings, service, Box::new(DiskTree::new()))
}

/// Collects messages until one satisfies `done`, returning all of them.
async fn collect_until<F>(handle: &mut SessionHandle, done: F) -> Vec<PanelMessage>
where
    F: Fn(&PanelMessage) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), handle.messages.recv())
            .await
            .unwrap_or_else(|_| panic!("no matching message; saw {:?}", seen))
            .expect("session ended");
        let matched = done(&message);
        seen.push(message);
        if matched {
            return seen;
        }
    }
}

fn is_idle(message: &PanelMessage) -> bool {
    matches!(
        message,
        PanelMessage::Status {
            state: ActivityState::Idle,
            ..
        }
    )
}

fn submit(topic: &str, smells: &[&str]) -> PanelIntent {
    PanelIntent::Submit {
        topic: topic.to_string(),
        smells: smells.iter().map(|s| s.to_string()).collect(),
    }
}

async fn show_answer(handle: &mut SessionHandle) -> PanelMessage {
    handle.intents.send(PanelIntent::ShowAnswerFile).await.unwrap();
    collect_until(handle, |m| {
        matches!(m, PanelMessage::AnswerFile { .. } | PanelMessage::Notice { .. })
    })
    .await
    .pop()
    .unwrap()
}

#[tokio::test]
async fn banking_scenario_writes_files_and_serves_the_answer() {
    let project = spring_project();
    let service = Arc::new(ScriptedService::with_generations(vec![bank_generation()]));
    let mut handle = open(project.path(), service.clone());

    handle.intents.send(submit("Banking", &["Long Method"])).await.unwrap();
    let messages = collect_until(&mut handle, is_idle).await;

    let bank = fs::canonicalize(project.path())
        .unwrap()
        .join("src/main/java/com/x/Bank.java");
    assert_eq!(
        fs::read_to_string(&bank).unwrap(),
        "public class Bank { void everything() {} }"
    );
    assert_eq!(
        fs::read_to_string(project.path().join("PROBLEM.md")).unwrap(),
        "Split the bank's god method."
    );
    assert!(project
        .path()
        .join("starter/src/main/java/com/x/Bank.java")
        .is_file());

    let files = messages
        .iter()
        .find_map(|m| match m {
            PanelMessage::GenerateComplete { files } => Some(files.clone()),
            _ => None,
        })
        .expect("generateComplete");
    assert_eq!(files.len(), 2);
    assert_eq!(files[0], bank.display().to_string());
    assert!(messages.iter().any(|m| matches!(
        m,
        PanelMessage::Response { data } if data.topic == "Banking" && data.smells == vec!["Long Method"]
    )));

    match show_answer(&mut handle).await {
        PanelMessage::AnswerFile { path, content } => {
            assert_eq!(content, "public class Bank {}");
            assert!(path.ends_with("Bank.java"));
            assert_eq!(fs::read_to_string(&path).unwrap(), "public class Bank {}");
        }
        other => panic!("expected answer file, got {:?}", other),
    }
    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 1);
    handle.close().await;
}

#[tokio::test]
async fn second_request_while_busy_is_rejected() {
    let project = spring_project();
    let gate = Arc::new(Notify::new());
    let service = Arc::new(
        ScriptedService::with_generations(vec![bank_generation()]).gated(gate.clone()),
    );
    let mut handle = open(project.path(), service.clone());

    handle.intents.send(submit("Banking", &[])).await.unwrap();
    handle.intents.send(submit("Library", &[])).await.unwrap();
    handle
        .intents
        .send(PanelIntent::Review {
            payload: ReviewDraft::default(),
        })
        .await
        .unwrap();

    let early = collect_until(&mut handle, |m| {
        matches!(m, PanelMessage::Rejected { kind: FlightKind::Review, .. })
    })
    .await;
    assert_eq!(early[0], PanelMessage::busy(FlightKind::Generate));
    assert!(matches!(
        &early[1],
        PanelMessage::Rejected { kind: FlightKind::Generate, reason } if reason.contains("generate")
    ));

    gate.notify_one();
    collect_until(&mut handle, is_idle).await;

    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.review_calls.load(Ordering::SeqCst), 0);
    handle.close().await;
}

#[tokio::test]
async fn failed_generation_keeps_previous_reference() {
    let project = spring_project();
    let failure = GenerationResult {
        status: GenerationStatus::Failure,
        message: "crew crashed".to_string(),
        data: None,
    };
    let service = Arc::new(ScriptedService::with_generations(vec![bank_generation(), failure]));
    let mut handle = open(project.path(), service);

    handle.intents.send(submit("Banking", &[])).await.unwrap();
    collect_until(&mut handle, is_idle).await;

    handle.intents.send(submit("Banking", &[])).await.unwrap();
    let messages = collect_until(&mut handle, is_idle).await;
    assert!(messages.iter().any(|m| matches!(
        m,
        PanelMessage::Notice { level: NoticeLevel::Error, text } if text.contains("crew crashed")
    )));
    assert!(!messages
        .iter()
        .any(|m| matches!(m, PanelMessage::GenerateComplete { .. })));

    match show_answer(&mut handle).await {
        PanelMessage::AnswerFile { content, .. } => assert_eq!(content, "public class Bank {}"),
        other => panic!("expected answer file, got {:?}", other),
    }
    handle.close().await;
}

#[tokio::test]
async fn answer_without_reference_warns() {
    let project = spring_project();
    let mut handle = open(project.path(), Arc::new(ScriptedService::default()));

    match show_answer(&mut handle).await {
        PanelMessage::Notice { level, text } => {
            assert_eq!(level, NoticeLevel::Warning);
            assert_eq!(text, "No reference solution available");
        }
        other => panic!("expected warning, got {:?}", other),
    }
    handle.close().await;
}

#[tokio::test]
async fn slow_backend_times_out_and_session_recovers() {
    let project = spring_project();
    let service = Arc::new(ScriptedService::default());
    let settings = Settings {
        request_timeout: Duration::from_millis(50),
        ..settings_for(project.path())
    };
    let mut handle = open_with(settings, service.clone());

    handle.intents.send(submit("Banking", &[])).await.unwrap();
    let messages = collect_until(&mut handle, is_idle).await;
    assert!(messages.iter().any(|m| matches!(
        m,
        PanelMessage::Notice { level: NoticeLevel::Error, text } if text.contains("timed out")
    )));

    handle.intents.send(submit("Banking", &[])).await.unwrap();
    let retry = collect_until(&mut handle, is_idle).await;
    assert_eq!(retry[0], PanelMessage::busy(FlightKind::Generate));
    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 2);
    handle.close().await;
}

#[tokio::test]
async fn missing_project_is_reported_without_writing() {
    let workspace = TempDir::new().unwrap();
    fs::create_dir_all(workspace.path().join("notes")).unwrap();
    let service = Arc::new(ScriptedService::with_generations(vec![bank_generation()]));
    let mut handle = open(workspace.path(), service);

    handle.intents.send(submit("Banking", &[])).await.unwrap();
    let messages = collect_until(&mut handle, is_idle).await;

    assert!(messages.iter().any(|m| matches!(
        m,
        PanelMessage::Notice { level: NoticeLevel::Error, text } if text.contains("No Spring Boot project detected")
    )));
    assert!(!workspace.path().join("src").exists());
    assert!(!workspace.path().join("PROBLEM.md").exists());
    handle.close().await;
}

#[tokio::test]
async fn bare_file_names_land_in_the_entry_package() {
    let project = spring_project();
    let result = success(
        vec![FileDescriptor::new("Ledger.java", "public class Ledger {}")],
        "",
        None,
    );
    let service = Arc::new(ScriptedService::with_generations(vec![result]));
    let mut handle = open(project.path(), service);

    handle.intents.send(submit("Banking", &[])).await.unwrap();
    collect_until(&mut handle, is_idle).await;

    let ledger = project.path().join("src/main/java/com/x/Ledger.java");
    assert_eq!(
        fs::read_to_string(ledger).unwrap(),
        "package com.x;\n\npublic class Ledger {}"
    );
    assert!(!project.path().join("PROBLEM.md").exists());
    handle.close().await;
}

#[tokio::test]
async fn review_without_document_fails_before_calling_backend() {
    let project = spring_project();
    let service = Arc::new(ScriptedService::default());
    let mut handle = open(project.path(), service.clone());

    handle
        .intents
        .send(PanelIntent::Review {
            payload: ReviewDraft::default(),
        })
        .await
        .unwrap();
    let messages = collect_until(&mut handle, |m| matches!(m, PanelMessage::ReviewError { .. })).await;

    assert_eq!(
        messages.last(),
        Some(&PanelMessage::ReviewError {
            error: "No active editor found!".to_string()
        })
    );
    assert_eq!(service.review_calls.load(Ordering::SeqCst), 0);
    handle.close().await;
}

#[tokio::test]
async fn review_payload_is_built_from_project_and_session() {
    let project = spring_project();
    let service = Arc::new(
        ScriptedService::with_generations(vec![bank_generation()])
            .with_review(vec!["Nice extraction", "Rename `x`"]),
    );
    let mut handle = open(project.path(), service.clone());

    handle.intents.send(submit("Banking", &["Long Method"])).await.unwrap();
    collect_until(&mut handle, is_idle).await;

    handle
        .intents
        .send(PanelIntent::Review {
            payload: ReviewDraft {
                document: Some(ActiveDocument {
                    path: "src/main/java/com/x/Bank.java".to_string(),
                    content: "public class Bank { void deposit() {} }".to_string(),
                }),
                code_smells: None,
                test_results: None,
            },
        })
        .await
        .unwrap();
    let messages = collect_until(&mut handle, is_idle).await;

    assert!(messages.contains(&PanelMessage::ReviewResponse {
        messages: vec!["Nice extraction".to_string(), "Rename `x`".to_string()],
    }));
    let sent = service.last_review.lock().unwrap().clone().expect("review sent");
    assert_eq!(sent.problem_description, "Split the bank's god method.");
    assert_eq!(sent.original_code, "public class Bank { void everything() {} }");
    assert_eq!(sent.student_code, "public class Bank { void deposit() {} }");
    assert_eq!(sent.reference_solution, "public class Bank {}");
    assert_eq!(sent.code_smells, vec!["Long Method"]);
    assert_eq!(sent.test_results, "");
    handle.close().await;
}

#[tokio::test]
async fn review_warns_about_missing_problem_and_starter() {
    let project = spring_project();
    let service = Arc::new(ScriptedService::default().with_review(vec![]));
    let mut handle = open(project.path(), service.clone());

    handle
        .intents
        .send(PanelIntent::Review {
            payload: ReviewDraft {
                document: Some(ActiveDocument {
                    path: "src/main/java/com/x/App.java".to_string(),
                    content: "class App {}".to_string(),
                }),
                code_smells: Some(vec!["Feature Envy".to_string()]),
                test_results: Some("BUILD SUCCESS".to_string()),
            },
        })
        .await
        .unwrap();
    let messages = collect_until(&mut handle, is_idle).await;

    let warnings = messages
        .iter()
        .filter(|m| matches!(m, PanelMessage::Notice { level: NoticeLevel::Warning, .. }))
        .count();
    assert_eq!(warnings, 2);
    assert!(messages.contains(&PanelMessage::ReviewResponse { messages: vec![] }));

    let sent = service.last_review.lock().unwrap().clone().expect("review sent");
    assert_eq!(sent.problem_description, "");
    assert_eq!(sent.original_code, "");
    assert_eq!(sent.reference_solution, "");
    assert_eq!(sent.code_smells, vec!["Feature Envy"]);
    assert_eq!(sent.test_results, "BUILD SUCCESS");
    handle.close().await;
}

#[tokio::test]
async fn closing_the_panel_cancels_in_flight_work() {
    let project = spring_project();
    let service = Arc::new(ScriptedService::default());
    let mut handle = open(project.path(), service.clone());

    handle.intents.send(submit("Banking", &[])).await.unwrap();
    collect_until(&mut handle, |m| {
        matches!(m, PanelMessage::Status { state: ActivityState::Busy, .. })
    })
    .await;

    let closed = tokio::time::timeout(Duration::from_secs(5), handle.close()).await;
    assert!(closed.is_ok(), "session did not stop after the panel closed");
    assert!(!project.path().join("src/main/java/com/x/Bank.java").exists());
}

#[tokio::test]
async fn successful_generation_replaces_the_reference() {
    let project = spring_project();
    let second = success(
        vec![FileDescriptor::new("src/main/java/com/x/Vault.java", "class Vault {}")],
        "Extract the vault.",
        Some("```java\npublic class Vault {}\n```"),
    );
    let service = Arc::new(ScriptedService::with_generations(vec![bank_generation(), second]));
    let mut handle = open(project.path(), service);

    handle.intents.send(submit("Banking", &[])).await.unwrap();
    collect_until(&mut handle, is_idle).await;
    handle.intents.send(submit("Banking", &[])).await.unwrap();
    collect_until(&mut handle, is_idle).await;

    match show_answer(&mut handle).await {
        PanelMessage::AnswerFile { path, content } => {
            assert_eq!(content, "public class Vault {}");
            assert!(path.ends_with("Vault.java"));
        }
        other => panic!("expected answer file, got {:?}", other),
    }
    handle.close().await;
}

#[tokio::test]
async fn entry_without_package_aborts_before_writing() {
    let project = TempDir::new().unwrap();
    seed_project(project.path(), "@SpringBootApplication\npublic class App {}\n");
    let result = success(
        vec![FileDescriptor::new("Bank.java", "public class Bank {}")],
        "Split the bank's god method.",
        Some(BANK_SOLUTION),
    );
    let service = Arc::new(ScriptedService::with_generations(vec![result]));
    let mut handle = open(project.path(), service);

    handle.intents.send(submit("Banking", &[])).await.unwrap();
    let messages = collect_until(&mut handle, is_idle).await;

    assert!(messages.iter().any(|m| matches!(
        m,
        PanelMessage::Notice { level: NoticeLevel::Error, text }
            if text.contains("Could not extract a package declaration")
    )));
    assert!(!messages
        .iter()
        .any(|m| matches!(m, PanelMessage::GenerateComplete { .. })));
    assert!(!project.path().join("src/main/java/Bank.java").exists());
    assert!(!project.path().join("src/main/java/com/x/Bank.java").exists());
    assert!(!project.path().join("PROBLEM.md").exists());
    assert!(!project.path().join("starter").exists());

    match show_answer(&mut handle).await {
        PanelMessage::Notice { level, .. } => assert_eq!(level, NoticeLevel::Warning),
        other => panic!("reference must not be stored, got {:?}", other),
    }
    handle.close().await;
}

#[tokio::test]
async fn relative_workspace_matches_absolute_document_paths() {
    let project = tempfile::Builder::new()
        .prefix("session-ws-")
        .tempdir_in(".")
        .unwrap();
    seed_project(
        project.path(),
        "package com.x;\n\n@SpringBootApplication\npublic class App {}\n",
    );
    let relative = Path::new(".").join(project.path().file_name().unwrap());
    assert!(relative.is_relative());
    fs::create_dir_all(project.path().join("starter/src/main/java/com/x")).unwrap();
    fs::write(
        project.path().join("starter/src/main/java/com/x/Bank.java"),
        "ORIGINAL",
    )
    .unwrap();
    fs::write(project.path().join("PROBLEM.md"), "Split it.").unwrap();

    let service = Arc::new(ScriptedService::default().with_review(vec!["ok"]));
    let mut handle = open(&relative, service.clone());
    let document = fs::canonicalize(project.path())
        .unwrap()
        .join("src/main/java/com/x/Bank.java");

    handle
        .intents
        .send(PanelIntent::Review {
            payload: ReviewDraft {
                document: Some(ActiveDocument {
                    path: document.display().to_string(),
                    content: "public class Bank {}".to_string(),
                }),
                code_smells: None,
                test_results: None,
            },
        })
        .await
        .unwrap();
    let messages = collect_until(&mut handle, is_idle).await;

    assert!(!messages
        .iter()
        .any(|m| matches!(m, PanelMessage::Notice { level: NoticeLevel::Warning, .. })));
    let sent = service.last_review.lock().unwrap().clone().expect("review sent");
    assert_eq!(sent.original_code, "ORIGINAL");
    assert_eq!(sent.problem_description, "Split it.");
    handle.close().await;
}
