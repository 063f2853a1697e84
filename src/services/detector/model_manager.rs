use crate::error::AppError;
use futures::StreamExt;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Owns the detector weights and the ONNX Runtime session. The weights file
/// is loaded once; an optional URL covers first-run download. The cancel
/// flag is the only way to interrupt a running pass.
#[derive(Clone)]
pub struct DetectorManager {
    model_path: PathBuf,
    model_url: Option<String>,
    session: Arc<Mutex<Option<Session>>>,
    cancel_flag: Arc<AtomicBool>,
}

impl DetectorManager {
    pub fn new(model_path: PathBuf, model_url: Option<String>) -> Self {
        Self {
            model_path,
            model_url,
            session: Arc::new(Mutex::new(None)),
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn is_downloaded(&self) -> bool {
        self.model_path.exists()
    }

    pub fn is_ready(&self) -> bool {
        self.session.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    pub fn cancel_pass(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn reset_cancel_flag(&self) {
        self.cancel_flag.store(false, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Make sure the weights file exists, fetching it once when a model URL
    /// is configured.
    pub async fn ensure_weights(&self) -> Result<(), AppError> {
        if self.is_downloaded() {
            return Ok(());
        }
        let url = self.model_url.as_deref().ok_or_else(|| AppError {
            message: format!(
                "Model file {} is missing and no model URL is configured",
                self.model_path.display()
            ),
        })?;
        if let Some(dir) = self.model_path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| AppError {
                message: format!("Failed to create model directory: {}", e),
            })?;
        }
        download_file(url, &self.model_path, &self.cancel_flag).await
    }

    pub async fn load(&self, use_gpu: bool) -> Result<(), AppError> {
        if self.is_ready() {
            return Ok(());
        }
        if !self.is_downloaded() {
            return Err(format!("Model file {} not found", self.model_path.display()).into());
        }

        let model_path = self.model_path.clone();
        let session = tokio::task::spawn_blocking(move || -> Result<Session, AppError> {
            let _ = ort::init().with_name("shorewatch").commit();

            let mut builder = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(4)?;

            if use_gpu {
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default().build(),
                    ort::execution_providers::CPUExecutionProvider::default().build(),
                ])?;
            } else {
                builder = builder.with_execution_providers([
                    ort::execution_providers::CPUExecutionProvider::default().build(),
                ])?;
            }

            builder.commit_from_file(&model_path).map_err(|e| AppError {
                message: format!("Failed to load ONNX model {}: {}", model_path.display(), e),
            })
        })
        .await
        .map_err(|e| AppError {
            message: format!("Failed to spawn model loading task: {}", e),
        })??;

        *self
            .session
            .lock()
            .map_err(|_| AppError::from("Detector session lock poisoned"))? = Some(session);
        info!("Detector ready: {}", self.model_path.display());
        Ok(())
    }

    pub fn session(&self) -> Arc<Mutex<Option<Session>>> {
        self.session.clone()
    }
}

async fn download_file(url: &str, dest: &Path, cancel_flag: &AtomicBool) -> Result<(), AppError> {
    info!("Downloading detector weights from {}", url);
    let client = reqwest::Client::new();
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(format!("Failed to download {}: HTTP {}", url, response.status()).into());
    }

    let total_size = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let mut file = tokio::fs::File::create(dest).await.map_err(|e| AppError {
        message: format!("Failed to create file {}: {}", dest.display(), e),
    })?;

    let mut stream = response.bytes_stream();
    let mut last_logged = 0;

    while let Some(chunk) = stream.next().await {
        if cancel_flag.load(Ordering::Relaxed) {
            // Clean up partial file
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            return Err("Download cancelled".into());
        }

        let chunk = chunk?;
        downloaded += chunk.len() as u64;
        tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
            .await
            .map_err(|e| AppError {
                message: format!("Failed to write to file: {}", e),
            })?;

        if total_size > 0 {
            let progress = (downloaded * 100) / total_size;
            if progress >= last_logged + 10 {
                debug!("Downloading weights: {}%", progress);
                last_logged = progress;
            }
        }
    }

    info!("Weights saved to {}", dest.display());
    Ok(())
}
