use crate::error::AppError;
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_FRAME_CAP: u64 = 300;
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_IOU: f32 = 0.45;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

// COCO class 0 is "person"
const DEFAULT_TARGET_CLASS: usize = 0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Path of the ONNX detector weights.
    pub model_path: PathBuf,
    /// Optional URL to fetch the weights from when the file is missing.
    pub model_url: Option<String>,
    /// CVAT-style XML annotation file carrying the water polygon.
    pub annotation_path: PathBuf,
    /// Where annotated output videos are written.
    pub output_dir: PathBuf,
    /// Upper bound on frames processed in one pass.
    pub frame_cap: u64,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Detector class kept by the pass; everything else is discarded.
    pub target_class: usize,
    /// Fixed timeout applied to the stream-URL page fetch.
    pub fetch_timeout_secs: u64,
    pub alert: AlertConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub recipient: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub sender: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/yolov8n.onnx"),
            model_url: None,
            annotation_path: PathBuf::from("annotations.xml"),
            output_dir: std::env::temp_dir().join("shorewatch"),
            frame_cap: DEFAULT_FRAME_CAP,
            confidence_threshold: DEFAULT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU,
            target_class: DEFAULT_TARGET_CLASS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            alert: AlertConfig::default(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            recipient: None,
            smtp_host: None,
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_username: None,
            smtp_password: None,
            sender: "shorewatch@localhost".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration: an optional JSON file (SHOREWATCH_CONFIG) layered
    /// under SHOREWATCH_* environment overrides. Credentials are never read
    /// from source literals.
    pub fn load() -> Result<Self, AppError> {
        let mut config = match std::env::var("SHOREWATCH_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError {
            message: format!("Failed to read config file {}: {}", path, e),
        })?;
        serde_json::from_str(&content).map_err(|e| AppError {
            message: format!("Failed to parse config file {}: {}", path, e),
        })
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("SHOREWATCH_MODEL_PATH") {
            self.model_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SHOREWATCH_MODEL_URL") {
            self.model_url = Some(v);
        }
        if let Ok(v) = std::env::var("SHOREWATCH_ANNOTATION_PATH") {
            self.annotation_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SHOREWATCH_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SHOREWATCH_FRAME_CAP") {
            if let Ok(cap) = v.parse() {
                self.frame_cap = cap;
            }
        }
        if let Ok(v) = std::env::var("SHOREWATCH_CONFIDENCE") {
            if let Ok(c) = v.parse::<f32>() {
                self.confidence_threshold = c.clamp(0.0, 1.0);
            }
        }
        if let Ok(v) = std::env::var("SHOREWATCH_ALERT_RECIPIENT") {
            self.alert.recipient = Some(v);
        }
        if let Ok(v) = std::env::var("SHOREWATCH_SMTP_HOST") {
            self.alert.smtp_host = Some(v);
        }
        if let Ok(v) = std::env::var("SHOREWATCH_SMTP_PORT") {
            if let Ok(port) = v.parse() {
                self.alert.smtp_port = port;
            }
        }
        if let Ok(v) = std::env::var("SHOREWATCH_SMTP_USERNAME") {
            self.alert.smtp_username = Some(v);
        }
        if let Ok(v) = std::env::var("SHOREWATCH_SMTP_PASSWORD") {
            self.alert.smtp_password = Some(v);
        }
        if let Ok(v) = std::env::var("SHOREWATCH_SENDER") {
            self.alert.sender = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = AppConfig::default();
        assert_eq!(config.frame_cap, 300);
        assert_eq!(config.target_class, 0);
        assert!(config.alert.recipient.is_none());
    }

    #[test]
    fn partial_json_keeps_defaults_elsewhere() {
        let config: AppConfig =
            serde_json::from_str(r#"{"frame_cap": 42, "alert": {"recipient": "duty@beach.example"}}"#)
                .unwrap();
        assert_eq!(config.frame_cap, 42);
        assert_eq!(config.alert.recipient.as_deref(), Some("duty@beach.example"));
        assert_eq!(config.alert.smtp_port, 587);
        assert_eq!(config.confidence_threshold, 0.25);
    }
}
