use crate::config::{NotifyConfig, NotifyOn};
use crate::migration::RunReport;
use serde_json::json;
use std::time::Duration;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("webhook request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("failed to encode notification: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Delivers a finished run's report somewhere a human will see it.
pub trait Notifier {
    fn notify(&self, report: &RunReport) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _report: &RunReport) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Posts `{"text": <summary>, "report": <run report>}` to an incoming-webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    notify_on: NotifyOn,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, notify_on: NotifyOn) -> Self {
        Self {
            url: url.into(),
            notify_on,
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(config.webhook_url.clone(), config.notify_on)
    }

    pub fn wants(&self, report: &RunReport) -> bool {
        match self.notify_on {
            NotifyOn::Always => true,
            NotifyOn::Failure => !report.effective_success(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, report: &RunReport) -> Result<(), NotifyError> {
        if !self.wants(report) {
            return Ok(());
        }
        let body = json!({
            "text": summary_text(report),
            "report": serde_json::to_value(report).map_err(NotifyError::Encode)?,
        });
        ureq::post(&self.url)
            .timeout(WEBHOOK_TIMEOUT)
            .send_json(body)
            .map_err(|e| NotifyError::Request {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

/// One-line human summary of a run.
pub fn summary_text(report: &RunReport) -> String {
    let verdict = if report.timed_out {
        "stalled and was stopped"
    } else if report.effective_success() {
        "succeeded"
    } else {
        "failed"
    };
    let mut text = format!(
        "{} {verdict}: {} -> {} | {} copied, {} skipped, {} failed, {} extra, {} bytes | {} | exit {}",
        report.phase,
        report.source,
        report.destination,
        report.copied_files,
        report.skipped_files,
        report.failed_files,
        report.extra_files,
        report.copied_bytes,
        format_duration(Duration::from_millis(report.duration_ms)),
        report.exit_code,
    );
    if let Some(fallback) = &report.fallback {
        let status = if fallback.success {
            "succeeded"
        } else if fallback.attempted {
            "failed"
        } else {
            "skipped"
        };
        text.push_str(&format!(" | snapshot retry {status}"));
    }
    text
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3_600, (secs % 3_600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::Phase;
    use crate::snapshot::FallbackOutcome;

    fn report(success: bool) -> RunReport {
        RunReport {
            phase: Phase::Sync,
            source: "D:\\a".to_string(),
            destination: "E:\\b".to_string(),
            started_at: 0,
            duration_ms: 3_723_000,
            total_dirs: 10,
            total_files: 100,
            copied_files: 95,
            skipped_files: 3,
            failed_files: 2,
            extra_files: 0,
            copied_bytes: "5.1g".to_string(),
            exit_code: if success { 1 } else { 9 },
            success,
            timed_out: false,
            log_path: "logs/sync.log".to_string(),
            dry_run: false,
            fallback: None,
        }
    }

    #[test]
    fn failure_filter_skips_successful_runs_without_a_request() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook", NotifyOn::Failure);
        assert!(!notifier.wants(&report(true)));
        assert!(notifier.wants(&report(false)));
        notifier.notify(&report(true)).expect("filtered out");
    }

    #[test]
    fn fallback_success_counts_for_the_filter() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook", NotifyOn::Failure);
        let mut failed = report(false);
        failed.fallback = Some(FallbackOutcome {
            attempted: true,
            success: true,
            ..FallbackOutcome::default()
        });
        assert!(!notifier.wants(&failed));
        assert!(summary_text(&failed).ends_with("snapshot retry succeeded"));
    }

    #[test]
    fn summary_names_phase_counters_and_duration() {
        let text = summary_text(&report(false));
        assert!(text.starts_with("SYNC failed: D:\\a -> E:\\b"), "{text}");
        assert!(text.contains("95 copied, 3 skipped, 2 failed, 0 extra, 5.1g bytes"));
        assert!(text.contains("1h 02m 03s"));
        assert!(text.ends_with("exit 9"));
    }

    #[test]
    fn durations_are_compact() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_secs(61)), "1m 01s");
    }
}
