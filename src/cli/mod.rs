use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

mod panel_bridge;
mod progress;

use progress::ActivityReport;
use refactor_studio::contexts::{
    CodeBlockExtractor, DiskTree, EntryPointResolver, ProjectLocator, SessionController,
    SessionHandle, WalkFilter, DEFAULT_BUILD_DESCRIPTORS, DEFAULT_ENTRY_MARKER,
    DEFAULT_SOURCE_DIR, DEFAULT_SOURCE_SUFFIX,
};
use refactor_studio::data::{ActiveDocument, ActivityState, PanelIntent, PanelMessage, ReviewDraft};
use refactor_studio::services::HttpExerciseService;
use refactor_studio::settings::Settings;

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub verbose: bool,
    pub workspace: Option<PathBuf>,
    pub service_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Environment settings with command-line overrides applied on top.
fn resolve_settings(config: &Config) -> Result<Settings> {
    let mut settings = Settings::from_env().context("Invalid configuration in environment")?;
    if let Some(workspace) = &config.workspace {
        settings.workspace_root = workspace.clone();
    }
    if let Some(url) = &config.service_url {
        settings.service_url = url.clone();
    }
    if let Some(secs) = config.timeout_secs {
        if secs == 0 {
            bail!("--timeout-secs must be greater than zero");
        }
        settings.request_timeout = Duration::from_secs(secs);
    }
    // stdout belongs to command output and the panel protocol
    debug!(
        workspace = %settings.workspace_root.display(),
        backend = %settings.service_url,
        "settings resolved"
    );
    Ok(settings)
}

fn open_session(settings: Settings) -> Result<SessionHandle> {
    let service = HttpExerciseService::new(&settings.service_url, settings.request_timeout)
        .context("Failed to create backend client")?;
    Ok(SessionController::open(
        settings,
        Arc::new(service),
        Box::new(DiskTree::new()),
    ))
}

pub async fn panel(config: &Config) -> Result<()> {
    let settings = resolve_settings(config)?;
    let handle = open_session(settings)?;
    panel_bridge::serve(handle).await
}

pub async fn generate(topic: String, smells: Vec<String>, config: &Config) -> Result<()> {
    let settings = resolve_settings(config)?;
    let mut handle = open_session(settings)?;

    println!("Generating exercise on '{}'", topic);
    handle
        .intents
        .send(PanelIntent::Submit { topic, smells })
        .await
        .context("Session stopped before the request was sent")?;

    let report = drive_until_idle(&mut handle, config).await;
    handle.close().await;
    report.finish("Generation")
}

pub async fn review(
    file: PathBuf,
    smells: Vec<String>,
    test_results: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let settings = resolve_settings(config)?;
    let source = if file.is_absolute() {
        file.clone()
    } else {
        ProjectLocator::new(
            DEFAULT_BUILD_DESCRIPTORS.iter().copied(),
            DEFAULT_SOURCE_DIR,
            WalkFilter::new(settings.excluded_dirs.iter().cloned()),
        )
        .locate(&DiskTree::new(), &settings.workspace_root)
        .unwrap_or_else(|| settings.workspace_root.clone())
        .join(&file)
    };
    let content = fs::read_to_string(&source)
        .with_context(|| format!("Failed to read solution file: {}", source.display()))?;
    let test_results = match test_results {
        Some(path) => Some(
            fs::read_to_string(&path)
                .with_context(|| format!("Failed to read test results: {}", path.display()))?,
        ),
        None => None,
    };

    let mut handle = open_session(settings)?;
    let payload = ReviewDraft {
        document: Some(ActiveDocument {
            path: file.display().to_string(),
            content,
        }),
        code_smells: Some(smells).filter(|s| !s.is_empty()),
        test_results,
    };

    println!("Requesting review of {}", file.display());
    handle
        .intents
        .send(PanelIntent::Review { payload })
        .await
        .context("Session stopped before the request was sent")?;

    let report = drive_until_idle(&mut handle, config).await;
    handle.close().await;
    report.finish("Review")
}

/// Prints session messages until the session goes idle again after its
/// single request, or the request is refused up front.
async fn drive_until_idle(handle: &mut SessionHandle, config: &Config) -> ActivityReport {
    let mut report = ActivityReport::new(config.verbose);
    let mut started = false;

    while let Some(message) = handle.messages.recv().await {
        report.show(&message);
        match message {
            PanelMessage::Status {
                state: ActivityState::Busy,
                ..
            } => started = true,
            PanelMessage::Status {
                state: ActivityState::Idle,
                ..
            } if started => break,
            PanelMessage::ReviewError { .. } | PanelMessage::Rejected { .. } if !started => break,
            _ => {}
        }
    }

    report
}

pub fn locate(config: &Config) -> Result<()> {
    let settings = resolve_settings(config)?;
    let tree = DiskTree::new();
    let filter = WalkFilter::new(settings.excluded_dirs.iter().cloned());
    let locator = ProjectLocator::new(
        DEFAULT_BUILD_DESCRIPTORS.iter().copied(),
        DEFAULT_SOURCE_DIR,
        filter,
    );

    let Some(root) = locator.locate(&tree, &settings.workspace_root) else {
        bail!(
            "No Spring Boot project detected under {}",
            settings.workspace_root.display()
        );
    };
    println!("Project root: {}", root.display());

    let resolver = EntryPointResolver::new(
        DEFAULT_ENTRY_MARKER,
        DEFAULT_SOURCE_SUFFIX,
        WalkFilter::hidden_only(),
    );
    match resolver.resolve(&tree, &root.join(locator.source_dir())) {
        Ok(entry) => {
            println!("Entry point:  {}", entry.file.display());
            println!("Namespace:    {}", entry.namespace);
        }
        Err(e) => println!("Entry point:  unavailable ({})", e),
    }
    Ok(())
}

pub fn extract(file: PathBuf, config: &Config) -> Result<()> {
    let settings = resolve_settings(config)?;
    let markdown = fs::read_to_string(&file)
        .with_context(|| format!("Failed to read markdown file: {}", file.display()))?;

    let code = CodeBlockExtractor::new(&settings.fence_language).extract_text(&markdown);
    if code.is_empty() {
        bail!(
            "No {} code blocks found in {}",
            settings.fence_language,
            file.display()
        );
    }
    println!("{}", code);
    Ok(())
}
