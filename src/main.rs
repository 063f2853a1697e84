use shorewatch::config::AppConfig;
use shorewatch::error::AppError;
use shorewatch::models::detect_types::AnalysisOutcome;
use shorewatch::models::session_types::VideoSource;
use shorewatch::services::analysis::{self, PassSettings};
use shorewatch::services::detector::inference::DetectorParams;
use shorewatch::services::detector::model_manager::DetectorManager;
use shorewatch::services::resolver;
use shorewatch::services::zones::WaterZone;
use shorewatch::services::alert;
use shorewatch::session::SessionContext;
use std::time::Duration;
use tracing::{error, info, warn};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shorewatch=info,ort=warn".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_logging();

    let input = std::env::args()
        .nth(1)
        .ok_or_else(|| AppError::from("usage: shorewatch <video file or URL>"))?;

    let config = AppConfig::load()?;

    let resolved = resolver::resolve_source(&input, Duration::from_secs(config.fetch_timeout_secs))
        .await?;
    let source = if resolved.starts_with("http") {
        VideoSource::Stream(resolved.clone())
    } else {
        VideoSource::File(resolved.clone())
    };
    info!("Analyzing {}", source.location());

    let zone = WaterZone::from_file(&config.annotation_path)?;
    info!(
        "Water polygon loaded from {} ({} points)",
        config.annotation_path.display(),
        zone.points().len()
    );

    let manager = DetectorManager::new(config.model_path.clone(), config.model_url.clone());
    manager.ensure_weights().await?;
    manager.load(false).await?;

    let mut session = SessionContext::new();
    session.set_source(source);
    session.begin_analysis();

    let settings = PassSettings {
        frame_cap: config.frame_cap,
        params: DetectorParams {
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
            target_class: config.target_class,
            ..DetectorParams::default()
        },
        output_dir: config.output_dir.clone(),
    };

    let report =
        analysis::run_pass_blocking(manager, zone, resolved.clone(), settings).await?;

    if alert::should_alert(report.counters.water, config.alert.recipient.as_deref()) {
        if let Err(e) = alert::send_alert(&config.alert, &resolved, &report.counters) {
            error!("Alert delivery failed: {}", e);
        }
    } else if report.counters.water > 0 {
        warn!("Swimmers detected but no alert recipient is configured");
    }

    let outcome = AnalysisOutcome::Detected(report.clone());
    session.complete_analysis(&outcome);

    info!("Result: {}", outcome.label());
    info!("Annotated video: {}", report.output_path);
    Ok(())
}
