use serde::Serialize;

/// The five screens of the original flow. Navigation only happens through
/// explicit calls; rendering is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Page {
    Instructions,
    Upload,
    Progress,
    Results,
    History,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VideoSource {
    File(String),
    Stream(String),
}

impl VideoSource {
    pub fn location(&self) -> &str {
        match self {
            VideoSource::File(path) => path,
            VideoSource::Stream(url) => url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub label: String,
    pub recorded_at: String,
}
