use crate::models::detect_types::AnalysisOutcome;
use crate::models::session_types::{HistoryEntry, Page, VideoSource};

pub const HISTORY_CAP: usize = 9;

const HISTORY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Per-session state, one instance per user session, nothing persisted.
/// A typed struct rather than a dynamically keyed bag.
#[derive(Debug, Clone)]
pub struct SessionContext {
    page: Page,
    pub source: Option<VideoSource>,
    pub analysis_complete: bool,
    history: Vec<HistoryEntry>,
    pub camera_on: bool,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            page: Page::Instructions,
            source: None,
            analysis_complete: false,
            history: Vec::new(),
            camera_on: false,
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    /// Jump to a page. There is no transition table: any explicit user action
    /// may land anywhere, matching the original navigation bar.
    pub fn goto(&mut self, page: Page) {
        self.page = page;
    }

    pub fn toggle_camera(&mut self) {
        self.camera_on = !self.camera_on;
    }

    pub fn set_source(&mut self, source: VideoSource) {
        self.source = Some(source);
        self.analysis_complete = false;
    }

    pub fn begin_analysis(&mut self) {
        self.analysis_complete = false;
        self.page = Page::Progress;
    }

    /// Record a finished analysis: flag it, show the results page and append
    /// to history. History stops accepting entries once full, as the
    /// original did, so it never exceeds the cap.
    pub fn complete_analysis(&mut self, outcome: &AnalysisOutcome) {
        self.analysis_complete = true;
        self.page = Page::Results;
        if self.history.len() < HISTORY_CAP {
            self.history.push(HistoryEntry {
                label: outcome.label().to_string(),
                recorded_at: chrono::Local::now()
                    .format(HISTORY_TIMESTAMP_FORMAT)
                    .to_string(),
            });
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_instructions_with_empty_state() {
        let session = SessionContext::new();
        assert_eq!(session.page(), Page::Instructions);
        assert!(session.source.is_none());
        assert!(!session.analysis_complete);
        assert!(session.history().is_empty());
    }

    #[test]
    fn navigation_is_explicit_jumps() {
        let mut session = SessionContext::new();
        session.goto(Page::Upload);
        assert_eq!(session.page(), Page::Upload);
        session.goto(Page::Instructions);
        assert_eq!(session.page(), Page::Instructions);
    }

    #[test]
    fn camera_flag_toggles() {
        let mut session = SessionContext::new();
        session.toggle_camera();
        assert!(session.camera_on);
        session.toggle_camera();
        assert!(!session.camera_on);
    }

    #[test]
    fn completing_analysis_moves_to_results() {
        let mut session = SessionContext::new();
        session.set_source(VideoSource::File("beach.mp4".into()));
        session.begin_analysis();
        assert_eq!(session.page(), Page::Progress);
        session.complete_analysis(&AnalysisOutcome::canned());
        assert!(session.analysis_complete);
        assert_eq!(session.page(), Page::Results);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].label, "95% no-rip");
    }

    #[test]
    fn history_never_exceeds_cap() {
        let mut session = SessionContext::new();
        for _ in 0..HISTORY_CAP + 5 {
            session.complete_analysis(&AnalysisOutcome::canned());
        }
        assert_eq!(session.history().len(), HISTORY_CAP);
    }
}
