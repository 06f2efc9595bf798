//! Application state machine and the controller that drives it.

use crate::analysis::{ProgressTicker, StyleAnalyzer, INITIAL_PROGRESS};
use crate::credentials::CredentialSelector;
use crate::error::{ArchitectError, Result};
use crate::generation::GenerationSession;
use crate::history::{HistoryRepository, HistoryStore};
use crate::image::UploadedImage;
use crate::ingest::{IngestReport, UploadSet};
use crate::sections::ExtractedSections;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// Top-level application status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppStatus {
    /// Ready for uploads.
    #[default]
    Idle,
    /// One analysis call is in flight.
    Analyzing,
    /// An analysis result is available.
    Completed,
    /// The last analysis failed; the images are kept for a retry.
    Error,
}

/// Events that move the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// An analysis was started.
    Start,
    /// The analysis call succeeded.
    Succeeded,
    /// The analysis call failed.
    Failed,
    /// The user went back to the start screen.
    Reset,
    /// A history entry was loaded.
    Restore,
}

impl AppStatus {
    /// Returns the status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Returns the status after `event`, or an error for an illegal edge.
    pub fn apply(self, event: AppEvent) -> Result<Self> {
        use AppEvent::*;
        use AppStatus::*;

        match (self, event) {
            (Idle | Error, Start) => Ok(Analyzing),
            (Analyzing, Succeeded) => Ok(Completed),
            (Analyzing, Failed) => Ok(Error),
            (Idle | Completed | Error, Reset) => Ok(Idle),
            (Idle | Completed | Error, Restore) => Ok(Completed),
            (from, event) => Err(ArchitectError::InvalidTransition {
                from: from.as_str(),
                event: event.as_str(),
            }),
        }
    }
}

impl AppEvent {
    /// Returns the event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Reset => "reset",
            Self::Restore => "restore",
        }
    }
}

impl std::fmt::Display for AppStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stored as the error when an analysis future is dropped before it settles.
pub const ANALYSIS_CANCELLED: &str = "analysis cancelled before it completed";

/// Moves the status out of `Analyzing` if the analysis future is dropped
/// mid-call, so the controller stays usable.
struct InFlight<'a> {
    status: &'a mut AppStatus,
    error: &'a mut String,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Ok(next) = self.status.apply(AppEvent::Failed) {
            tracing::warn!(from = %self.status, to = %next, "analysis cancelled");
            *self.status = next;
            *self.error = ANALYSIS_CANCELLED.to_string();
        }
    }
}

/// Owns the reference images, the current result and history, and runs
/// analyses through the status machine.
pub struct AppController<R> {
    analyzer: StyleAnalyzer,
    history: HistoryStore<R>,
    images: UploadSet,
    status: AppStatus,
    result: String,
    error: String,
    progress: Arc<watch::Sender<String>>,
}

impl<R: HistoryRepository> AppController<R> {
    /// Creates a controller, loading history from `repository`.
    pub fn new(analyzer: StyleAnalyzer, repository: R) -> Self {
        let (progress, _) = watch::channel(INITIAL_PROGRESS.to_string());
        Self {
            analyzer,
            history: HistoryStore::open(repository),
            images: UploadSet::new(),
            status: AppStatus::Idle,
            result: String::new(),
            error: String::new(),
            progress: Arc::new(progress),
        }
    }

    /// Returns the current status.
    pub fn status(&self) -> AppStatus {
        self.status
    }

    /// Returns the current reference images.
    pub fn images(&self) -> &[UploadedImage] {
        self.images.images()
    }

    /// Returns the raw analysis text (empty unless completed).
    pub fn result(&self) -> &str {
        &self.result
    }

    /// Returns the last error message (empty unless in error).
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Returns the current progress label.
    pub fn progress(&self) -> String {
        self.progress.borrow().clone()
    }

    /// Subscribes to progress label changes.
    pub fn subscribe_progress(&self) -> watch::Receiver<String> {
        self.progress.subscribe()
    }

    /// Returns the history store.
    pub fn history(&self) -> &HistoryStore<R> {
        &self.history
    }

    /// Returns the sections of the current result, once completed.
    pub fn sections(&self) -> Option<ExtractedSections> {
        (self.status == AppStatus::Completed).then(|| ExtractedSections::parse(&self.result))
    }

    fn transition(&mut self, event: AppEvent) -> Result<()> {
        let next = self.status.apply(event)?;
        tracing::info!(from = %self.status, to = %next, "status change");
        self.status = next;
        Ok(())
    }

    fn ensure_editable(&self) -> Result<()> {
        match self.status {
            AppStatus::Idle | AppStatus::Error => Ok(()),
            other => Err(ArchitectError::InvalidRequest(format!(
                "images cannot be changed while {other}"
            ))),
        }
    }

    /// Reads image files into the reference set (all or nothing on the cap).
    pub async fn add_images<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<IngestReport> {
        self.ensure_editable()?;
        self.images.ingest_paths(paths).await
    }

    /// Adds already decoded images as one batch.
    pub fn add_uploaded(&mut self, images: Vec<UploadedImage>) -> Result<()> {
        self.ensure_editable()?;
        self.images.extend(images)
    }

    /// Removes one reference image.
    pub fn remove_image(&mut self, id: &str) -> Result<bool> {
        self.ensure_editable()?;
        Ok(self.images.remove(id))
    }

    /// Runs the analysis over the current images.
    ///
    /// On success the result is recorded in history and the status becomes
    /// `Completed`. On failure the status becomes `Error`, the message is
    /// kept and the images stay for a retry. The progress ticker runs only
    /// while the call is in flight.
    pub async fn start_analysis(&mut self) -> Result<&str> {
        if self.images.is_empty() {
            return Err(ArchitectError::InvalidRequest(
                "add at least one reference image first".into(),
            ));
        }
        self.transition(AppEvent::Start)?;
        self.error.clear();
        self.progress.send_replace(INITIAL_PROGRESS.to_string());

        let outcome = {
            let mut in_flight = InFlight {
                status: &mut self.status,
                error: &mut self.error,
                settled: false,
            };
            let _ticker = ProgressTicker::start(Arc::clone(&self.progress));
            let outcome = self.analyzer.analyze(self.images.images()).await;
            in_flight.settled = true;
            outcome
        };

        match outcome {
            Ok(text) => {
                self.result = text;
                if let Err(e) = self.history.record(&self.result, self.images.images()) {
                    tracing::warn!("failed to persist history: {e}");
                }
                self.transition(AppEvent::Succeeded)?;
                Ok(&self.result)
            }
            Err(e) => {
                self.error = e.to_string();
                self.transition(AppEvent::Failed)?;
                Err(e)
            }
        }
    }

    /// Clears images, result and error and returns to `Idle`.
    pub fn reset(&mut self) -> Result<()> {
        self.transition(AppEvent::Reset)?;
        self.images.clear();
        self.result.clear();
        self.error.clear();
        Ok(())
    }

    /// Makes a history entry the current result.
    pub fn restore_from_history(&mut self, id: &str) -> Result<()> {
        let entry = self
            .history
            .get(id)
            .cloned()
            .ok_or_else(|| ArchitectError::InvalidRequest(format!("no history entry {id}")))?;
        self.transition(AppEvent::Restore)?;
        self.result = entry.content;
        self.images = UploadSet::from_images(entry.reference_images);
        self.error.clear();
        Ok(())
    }

    /// Deletes a history entry. The current result is unaffected.
    pub fn delete_history_entry(&mut self, id: &str) -> Result<bool> {
        self.history.delete(id)
    }

    /// Opens a product-image session over the current result.
    ///
    /// Requires `Completed` and a non-empty positive prompt.
    pub fn open_lab(&self, credentials: Arc<dyn CredentialSelector>) -> Result<GenerationSession> {
        if self.status != AppStatus::Completed {
            return Err(ArchitectError::InvalidRequest(format!(
                "no completed analysis (status: {})",
                self.status
            )));
        }
        let sections = ExtractedSections::parse(&self.result);
        if !sections.is_generation_ready() {
            return Err(ArchitectError::EmptyPrompt);
        }
        Ok(GenerationSession::new(
            self.analyzer.provider(),
            credentials,
            sections.positive_prompt,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use crate::history::{MemoryRepository, HISTORY_LIMIT};
    use crate::provider::GenerativeProvider;
    use crate::testing::{sample_image, MockProvider};

    const ANSWER: &str = "### 1. Agent 系统设定\nbe precise\n### 2. 正向提示词\nmatte studio\n### 3. 负向提示词\nclutter";

    fn controller(mock: &Arc<MockProvider>) -> AppController<MemoryRepository> {
        let analyzer = StyleAnalyzer::new(Arc::clone(mock) as Arc<dyn GenerativeProvider>);
        AppController::new(analyzer, MemoryRepository::new())
    }

    /// Never answers within the test's timeout.
    struct StalledProvider;

    #[async_trait::async_trait]
    impl GenerativeProvider for StalledProvider {
        async fn generate_content(
            &self,
            _model: &str,
            _request: &crate::provider::ContentRequest,
        ) -> Result<crate::provider::ContentResponse> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Err(ArchitectError::UnexpectedResponse("stalled".into()))
        }

        fn name(&self) -> &str {
            "stalled"
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_transition_table() {
        use AppEvent::*;
        use AppStatus::*;

        assert_eq!(Idle.apply(Start).unwrap(), Analyzing);
        assert_eq!(Error.apply(Start).unwrap(), Analyzing);
        assert_eq!(Analyzing.apply(Succeeded).unwrap(), Completed);
        assert_eq!(Analyzing.apply(Failed).unwrap(), Error);
        assert_eq!(Completed.apply(Reset).unwrap(), Idle);
        assert_eq!(Error.apply(Reset).unwrap(), Idle);
        assert_eq!(Idle.apply(Restore).unwrap(), Completed);

        assert!(Completed.apply(Start).is_err());
        assert!(Analyzing.apply(Start).is_err());
        assert!(Analyzing.apply(Reset).is_err());
        assert!(Idle.apply(Succeeded).is_err());

        let err = Analyzing.apply(Reset).unwrap_err();
        assert_eq!(err.to_string(), "cannot apply reset while analyzing");
    }

    #[tokio::test]
    async fn test_successful_analysis_completes_and_records() {
        let mock = Arc::new(MockProvider::new());
        mock.push_text(ANSWER);
        let mut app = controller(&mock);
        app.add_uploaded(vec![sample_image("a"), sample_image("b")]).unwrap();

        let text = app.start_analysis().await.unwrap().to_string();

        assert_eq!(text, ANSWER);
        assert_eq!(app.status(), AppStatus::Completed);
        assert_eq!(app.history().len(), 1);
        assert_eq!(app.history().entries()[0].content, ANSWER);
        assert_eq!(app.history().entries()[0].reference_images.len(), 2);

        let sections = app.sections().unwrap();
        assert_eq!(sections.positive_prompt, "matte studio");
    }

    #[tokio::test]
    async fn test_failed_analysis_keeps_images() {
        let mock = Arc::new(MockProvider::new());
        mock.push(Err(ArchitectError::Auth("API key not valid".into())));
        let mut app = controller(&mock);
        app.add_uploaded(vec![sample_image("a")]).unwrap();

        assert!(app.start_analysis().await.is_err());

        assert_eq!(app.status(), AppStatus::Error);
        assert!(app.error().contains("API key not valid"));
        assert_eq!(app.images().len(), 1);
        assert!(app.history().is_empty());
        assert!(app.sections().is_none());

        // retry with the same images
        mock.push_text(ANSWER);
        app.start_analysis().await.unwrap();
        assert_eq!(app.status(), AppStatus::Completed);
        assert_eq!(app.error(), "");
    }

    #[tokio::test]
    async fn test_start_requires_images() {
        let mock = Arc::new(MockProvider::new());
        let mut app = controller(&mock);
        assert!(app.start_analysis().await.is_err());
        assert_eq!(app.status(), AppStatus::Idle);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_history_capped_across_analyses() {
        let mock = Arc::new(MockProvider::new());
        let mut app = controller(&mock);
        for i in 0..HISTORY_LIMIT + 2 {
            mock.push_text(&format!("answer {i}"));
            app.add_uploaded(vec![sample_image("a")]).unwrap();
            app.start_analysis().await.unwrap();
            assert_eq!(app.history().len(), (i + 1).min(HISTORY_LIMIT));
            assert_eq!(app.history().entries()[0].content, format!("answer {i}"));
            app.reset().unwrap();
        }
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let mock = Arc::new(MockProvider::new());
        mock.push_text(ANSWER);
        let mut app = controller(&mock);
        app.add_uploaded(vec![sample_image("a")]).unwrap();
        app.start_analysis().await.unwrap();

        app.reset().unwrap();

        assert_eq!(app.status(), AppStatus::Idle);
        assert!(app.images().is_empty());
        assert_eq!(app.result(), "");
        // history survives a reset
        assert_eq!(app.history().len(), 1);
    }

    #[tokio::test]
    async fn test_images_locked_after_completion() {
        let mock = Arc::new(MockProvider::new());
        mock.push_text(ANSWER);
        let mut app = controller(&mock);
        app.add_uploaded(vec![sample_image("a")]).unwrap();
        app.start_analysis().await.unwrap();

        assert!(app.add_uploaded(vec![sample_image("b")]).is_err());
        assert!(app.remove_image("a").is_err());
    }

    #[tokio::test]
    async fn test_restore_and_delete_history() {
        let mock = Arc::new(MockProvider::new());
        mock.push_text(ANSWER);
        let mut app = controller(&mock);
        app.add_uploaded(vec![sample_image("a")]).unwrap();
        app.start_analysis().await.unwrap();
        let id = app.history().entries()[0].id.clone();
        app.reset().unwrap();

        app.restore_from_history(&id).unwrap();
        assert_eq!(app.status(), AppStatus::Completed);
        assert_eq!(app.result(), ANSWER);
        assert_eq!(app.images()[0].id, "a");

        assert!(app.delete_history_entry(&id).unwrap());
        assert!(app.history().is_empty());
        assert!(app.restore_from_history(&id).is_err());
    }

    #[tokio::test]
    async fn test_open_lab_uses_positive_prompt() {
        let mock = Arc::new(MockProvider::new());
        mock.push_text(ANSWER);
        let mut app = controller(&mock);
        let creds = Arc::new(StaticCredentials::new(true));

        assert!(app.open_lab(creds.clone()).is_err());

        app.add_uploaded(vec![sample_image("a")]).unwrap();
        app.start_analysis().await.unwrap();

        let mut lab = app.open_lab(creds).unwrap();
        assert_eq!(lab.style_prompt(), "matte studio");

        mock.push_image("image/png", "AAAA");
        lab.set_product_image(sample_image("product-main"));
        lab.generate().await.unwrap();
        // generating does not move the top-level status
        assert_eq!(app.status(), AppStatus::Completed);
    }

    #[tokio::test]
    async fn test_open_lab_refuses_unparsed_result() {
        let mock = Arc::new(MockProvider::new());
        mock.push_text("free-form answer without headings");
        let mut app = controller(&mock);
        app.add_uploaded(vec![sample_image("a")]).unwrap();
        app.start_analysis().await.unwrap();

        let creds = Arc::new(StaticCredentials::new(true));
        assert!(matches!(
            app.open_lab(creds),
            Err(ArchitectError::EmptyPrompt)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_analysis_leaves_controller_usable() {
        let analyzer = StyleAnalyzer::new(Arc::new(StalledProvider));
        let mut app = AppController::new(analyzer, MemoryRepository::new());
        app.add_uploaded(vec![sample_image("a")]).unwrap();

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            app.start_analysis(),
        )
        .await;
        assert!(timed_out.is_err());

        assert_eq!(app.status(), AppStatus::Error);
        assert_eq!(app.error(), ANALYSIS_CANCELLED);
        assert_eq!(app.images().len(), 1);
        assert!(app.history().is_empty());

        // images stay editable and the controller can be reset
        app.add_uploaded(vec![sample_image("b")]).unwrap();
        app.reset().unwrap();
        assert_eq!(app.status(), AppStatus::Idle);
    }

    #[tokio::test]
    async fn test_retry_after_cancel() {
        let mock = Arc::new(MockProvider::new());
        mock.push_text(ANSWER);
        let mut app = controller(&mock);
        app.add_uploaded(vec![sample_image("a")]).unwrap();

        // dropped before its first poll
        drop(app.start_analysis());
        assert_eq!(app.status(), AppStatus::Idle);

        app.start_analysis().await.unwrap();
        assert_eq!(app.status(), AppStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_resets_and_ticker_stops() {
        let mock = Arc::new(MockProvider::new());
        mock.push_text(ANSWER);
        let mut app = controller(&mock);
        let rx = app.subscribe_progress();
        app.add_uploaded(vec![sample_image("a")]).unwrap();

        app.start_analysis().await.unwrap();
        let label = app.progress();

        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        assert_eq!(app.progress(), label);
        assert_eq!(*rx.borrow(), INITIAL_PROGRESS);
        // only the controller holds the sender once the ticker is gone
        assert_eq!(Arc::strong_count(&app.progress), 1);
    }
}
