use crate::config::AlertConfig;
use crate::error::AppError;
use crate::models::detect_types::PassCounters;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

const ALERT_SUBJECT: &str = "Shorewatch alert: swimmers detected in the water";

/// The alert fires if and only if the pass saw at least one detection in the
/// water and a recipient is configured.
pub fn should_alert(water_count: u64, recipient: Option<&str>) -> bool {
    water_count > 0 && recipient.map_or(false, |r| !r.is_empty())
}

/// Fixed plaintext template naming the source and the counts.
pub fn compose_alert(source: &str, counters: &PassCounters) -> String {
    format!(
        "Automated alert from shorewatch.\n\n\
         Source: {}\n\
         Detections in water: {}\n\
         Detections on beach: {}\n\
         Frames analyzed: {}\n\n\
         Review the annotated video before acting on this alert.\n",
        source, counters.water, counters.beach, counters.frames
    )
}

/// One synchronous SMTP send, blocking the caller; a failure is surfaced to
/// the user and never retried.
pub fn send_alert(
    config: &AlertConfig,
    source: &str,
    counters: &PassCounters,
) -> Result<(), AppError> {
    let recipient = config
        .recipient
        .as_deref()
        .ok_or_else(|| AppError::from("No alert recipient configured"))?;
    let host = config
        .smtp_host
        .as_deref()
        .ok_or_else(|| AppError::from("No SMTP host configured"))?;

    let from: Mailbox = config.sender.parse().map_err(|e| AppError {
        message: format!("Invalid sender address {}: {}", config.sender, e),
    })?;
    let to: Mailbox = recipient.parse().map_err(|e| AppError {
        message: format!("Invalid recipient address {}: {}", recipient, e),
    })?;

    let email = Message::builder()
        .from(from)
        .to(to)
        .subject(ALERT_SUBJECT)
        .body(compose_alert(source, counters))?;

    let mut builder = SmtpTransport::relay(host)?.port(config.smtp_port);
    if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
        builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }
    let mailer = builder.build();

    mailer.send(&email)?;
    info!("Alert sent to {}", recipient);
    Ok(())
}
