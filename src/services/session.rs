// Session Controller
// Page state machine for one analysis session: select kind, submit, await, show result

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{
    AnalysisResult, ContentKind, ContentPayload, ContentSubmission, Page, SessionInfo, SessionState,
};
use super::analysis_client::{AnalysisFailure, ContentAnalyzer};
use super::auth::{Authenticator, Credentials};
use super::config_store::ValidationConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No content has been provided yet")]
    MissingPayload,
    #[error("{kind} analysis expects {expected}")]
    WrongShape { kind: ContentKind, expected: &'static str },
    #[error("Text is empty")]
    EmptyText,
    #[error("Text must be at least {min} characters (got {actual})")]
    TextTooShort { min: usize, actual: usize },
    #[error("File {name} is empty")]
    EmptyFile { name: String },
    #[error("File {name} has type {mime_type:?}, expected a {kind} file")]
    MimeMismatch {
        name: String,
        mime_type: String,
        kind: ContentKind,
    },
    #[error("File {name} is {size} bytes, the limit is {limit}")]
    FileTooLarge { name: String, size: u64, limit: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Analysis(#[from] AnalysisFailure),
    #[error("Cannot {event} on the {page} page")]
    InvalidTransition { page: Page, event: &'static str },
    #[error("Login was rejected")]
    LoginRejected,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SubmitOutcome {
    /// The request ran and the session moved to `result`.
    Completed,
    /// A request for this submission is already in flight; nothing was sent.
    AlreadyPending,
}

/// Check that a payload has the shape the chosen kind expects.
pub fn validate_payload(
    kind: ContentKind,
    payload: &ContentPayload,
    rules: &ValidationConfig,
) -> Result<(), ValidationError> {
    match (kind, payload) {
        (ContentKind::Text, ContentPayload::Text(text)) => {
            if text.is_empty() {
                return Err(ValidationError::EmptyText);
            }
            // Length is measured without surrounding whitespace.
            let actual = text.trim().chars().count();
            if actual < rules.min_text_chars {
                return Err(ValidationError::TextTooShort {
                    min: rules.min_text_chars,
                    actual,
                });
            }
            Ok(())
        }
        (ContentKind::Text, ContentPayload::File(_)) => Err(ValidationError::WrongShape {
            kind,
            expected: "a text string",
        }),
        (_, ContentPayload::Text(_)) => Err(ValidationError::WrongShape {
            kind,
            expected: "a file upload",
        }),
        (_, ContentPayload::File(file)) => {
            if file.is_empty() {
                return Err(ValidationError::EmptyFile {
                    name: file.name.clone(),
                });
            }
            if !kind.accepts_mime(&file.mime_type) {
                return Err(ValidationError::MimeMismatch {
                    name: file.name.clone(),
                    mime_type: file.mime_type.clone(),
                    kind,
                });
            }
            if let Some(limit) = rules.max_upload_bytes {
                if file.size > limit {
                    return Err(ValidationError::FileTooLarge {
                        name: file.name.clone(),
                        size: file.size,
                        limit,
                    });
                }
            }
            Ok(())
        }
    }
}

/// Owns one session's state and mediates every transition.
///
/// Every event takes `&mut self`, so one transition runs at a time. While the
/// page is `pending`, further submissions are ignored.
pub struct SessionController<A> {
    state: SessionState,
    analyzer: A,
    rules: ValidationConfig,
}

impl<A: ContentAnalyzer> SessionController<A> {
    pub fn new(analyzer: A) -> Self {
        Self::with_rules(analyzer, ValidationConfig::default())
    }

    pub fn with_rules(analyzer: A, rules: ValidationConfig) -> Self {
        Self {
            state: SessionState::default(),
            analyzer,
            rules,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn page(&self) -> Page {
        self.state.page
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    fn expect_page(&self, expected: Page, event: &'static str) -> Result<(), SessionError> {
        if self.state.page == expected {
            Ok(())
        } else {
            debug!(page = %self.state.page, event, "session.transition_rejected");
            Err(SessionError::InvalidTransition {
                page: self.state.page,
                event,
            })
        }
    }

    fn enter(&mut self, page: Page) {
        info!(from = %self.state.page, to = %page, "session.transition");
        self.state.page = page;
    }

    fn accept_login(&mut self, authenticated: bool, user: Option<String>) -> Result<(), SessionError> {
        self.expect_page(Page::Start, "log in")?;
        if !authenticated {
            warn!("session.login_rejected");
            return Err(SessionError::LoginRejected);
        }
        let info = SessionInfo::new(user);
        info!(session_id = %info.id, "session.created");
        self.state.session = Some(info);
        self.state.last_error = None;
        self.enter(Page::SelectKind);
        Ok(())
    }

    /// Consume an external login outcome.
    pub fn login(&mut self, authenticated: bool) -> Result<(), SessionError> {
        self.accept_login(authenticated, None)
    }

    pub fn login_with<Au: Authenticator + ?Sized>(
        &mut self,
        auth: &Au,
        credentials: &Credentials,
    ) -> Result<(), SessionError> {
        let authenticated = auth.login(credentials);
        self.accept_login(authenticated, Some(credentials.email.trim().to_string()))
    }

    /// Destroy the session from any page except `pending`.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        if self.state.page == Page::Pending {
            return Err(SessionError::InvalidTransition {
                page: Page::Pending,
                event: "log out",
            });
        }
        if let Some(info) = self.state.session.take() {
            info!(session_id = %info.id, "session.destroyed");
        }
        self.state.submission = None;
        self.state.result = None;
        self.state.last_error = None;
        self.enter(Page::Start);
        Ok(())
    }

    pub fn choose_kind(&mut self, kind: ContentKind) -> Result<(), SessionError> {
        self.expect_page(Page::SelectKind, "choose a content kind")?;
        self.state.submission = Some(ContentSubmission::new(kind));
        self.state.result = None;
        self.state.last_error = None;
        info!(kind = %kind, "session.kind_chosen");
        self.enter(Page::Submit);
        Ok(())
    }

    /// Attach content to the current submission. A rejected payload leaves
    /// the previous one in place.
    pub fn set_payload(&mut self, payload: ContentPayload) -> Result<(), SessionError> {
        self.expect_page(Page::Submit, "set content")?;
        let rules = &self.rules;
        let submission = self
            .state
            .submission
            .as_mut()
            .ok_or(SessionError::InvalidTransition {
                page: Page::Submit,
                event: "set content",
            })?;

        if let Err(e) = validate_payload(submission.kind, &payload, rules) {
            warn!(kind = %submission.kind, error = %e, "session.payload_rejected");
            return Err(e.into());
        }

        debug!(kind = %submission.kind, payload = %payload.describe(), "session.payload_set");
        submission.payload = Some(payload);
        self.state.last_error = None;
        Ok(())
    }

    /// Leave the submit page without sending anything.
    pub fn back(&mut self) -> Result<(), SessionError> {
        self.expect_page(Page::Submit, "go back")?;
        self.state.submission = None;
        self.enter(Page::SelectKind);
        Ok(())
    }

    /// Move to `pending` if the submission is complete.
    ///
    /// Returns `Ok(false)` when already pending: the caller must not dispatch
    /// another request.
    pub fn begin_analysis(&mut self) -> Result<bool, SessionError> {
        if self.state.page == Page::Pending {
            debug!("session.submit_ignored_while_pending");
            return Ok(false);
        }
        self.expect_page(Page::Submit, "submit for analysis")?;
        let ready = self.state.submission.as_ref().map_or(false, |s| s.is_ready());
        if !ready {
            return Err(ValidationError::MissingPayload.into());
        }
        self.state.last_error = None;
        self.enter(Page::Pending);
        Ok(true)
    }

    /// Resolve the in-flight request. A failure discards the submission and
    /// returns to kind selection; the failure is also returned to the caller.
    pub fn finish_analysis(
        &mut self,
        outcome: Result<AnalysisResult, AnalysisFailure>,
    ) -> Result<&AnalysisResult, SessionError> {
        self.expect_page(Page::Pending, "finish analysis")?;
        match outcome {
            Ok(result) => {
                self.enter(Page::Result);
                Ok(&*self.state.result.insert(result))
            }
            Err(failure) => {
                warn!(error = %failure, "session.analysis_failed");
                self.state.submission = None;
                self.state.result = None;
                self.state.last_error = Some(failure.to_string());
                self.enter(Page::SelectKind);
                Err(failure.into())
            }
        }
    }

    /// Send the current submission and wait for the outcome.
    pub async fn submit_analysis(&mut self) -> Result<SubmitOutcome, SessionError> {
        if !self.begin_analysis()? {
            return Ok(SubmitOutcome::AlreadyPending);
        }

        let outcome = match self.state.submission.as_ref() {
            Some(submission) => self.analyzer.analyze(submission).await,
            None => Err(AnalysisFailure::new("submission disappeared while pending")),
        };

        self.finish_analysis(outcome)?;
        Ok(SubmitOutcome::Completed)
    }

    pub fn analyze_another(&mut self) -> Result<(), SessionError> {
        self.expect_page(Page::Result, "analyze another")?;
        self.state.result = None;
        self.state.submission = None;
        self.enter(Page::SelectKind);
        Ok(())
    }

    /// Continue from the result page to the closing page.
    pub fn proceed(&mut self) -> Result<(), SessionError> {
        self.expect_page(Page::Result, "continue")?;
        self.state.result = None;
        self.enter(Page::Done);
        Ok(())
    }

    pub fn back_to_dashboard(&mut self) -> Result<(), SessionError> {
        self.expect_page(Page::Done, "go back to the dashboard")?;
        self.state.submission = None;
        self.enter(Page::SelectKind);
        Ok(())
    }
}
