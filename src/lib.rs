// Tremorwatch - streaming IMU rest/tremor classifier
// Module declarations and server entry point

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

pub mod classify;
pub mod config;
pub mod hub;
pub mod motion;
pub mod pipeline;
pub mod recording;
pub mod server;

use crate::classify::{load_model, ModelError};
use crate::config::{Args, ConfigError, SessionMode};
use crate::hub::Hub;
use crate::pipeline::{RunError, SessionContext, TraceError, TraceWriter};
use crate::recording::{classify_output_path, collect_output_path, CsvRecorder, RecordingError};
use crate::server::ServerError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Pipeline setup failed: {0}")]
    Pipeline(#[from] RunError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Build the session described by the command line
pub fn build_session(args: &Args, started_at: DateTime<Utc>) -> Result<SessionContext, AppError> {
    let mut session = match args.mode {
        SessionMode::Classify => {
            let config = args.pipeline_config()?;
            let model_path = args.model.as_ref().ok_or(ConfigError::MissingModel)?;
            let model = load_model(model_path)?;
            SessionContext::classify(&config, model.classifier)?
        }
        SessionMode::Collect => {
            let label = args.normalized_label();
            log::info!("Collecting samples labelled '{}'", label);
            SessionContext::collect(label)
        }
    };

    if let Some(name) = &args.output {
        let path = match args.mode {
            SessionMode::Classify => classify_output_path(&args.results_dir, name)?,
            SessionMode::Collect => {
                collect_output_path(&args.data_dir, &args.normalized_label(), name)?
            }
        };
        let end_time = recording_deadline(started_at, args.duration)?;

        let recorder = CsvRecorder::create(path, end_time)?;
        match end_time {
            Some(end) => log::info!(
                "Recording to {} until {}",
                recorder.path().display(),
                end.to_rfc3339()
            ),
            None => log::info!("Recording to {}", recorder.path().display()),
        }
        session = session.with_recorder(recorder);
    }

    if let Some(path) = &args.trace {
        if args.mode == SessionMode::Classify {
            let trace = TraceWriter::open(path.clone())?;
            log::info!("Writing prediction trace to {}", path.display());
            session = session.with_trace(trace);
        } else {
            log::warn!("--trace is ignored in collect mode");
        }
    }

    Ok(session)
}

/// End of the recording window, `None` for an unlimited recording
pub fn recording_deadline(
    started_at: DateTime<Utc>,
    duration_secs: u64,
) -> Result<Option<DateTime<Utc>>, ConfigError> {
    if duration_secs == 0 {
        return Ok(None);
    }
    i64::try_from(duration_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|duration| started_at.checked_add_signed(duration))
        .map(Some)
        .ok_or_else(|| ConfigError::Invalid(format!("duration {}s is out of range", duration_secs)))
}

/// Build the session and serve until Ctrl-C
pub async fn run(args: Args) -> Result<(), AppError> {
    let session = build_session(&args, Utc::now())?;
    let (hub, coordinator) = Hub::new(session).spawn();

    let app = server::router(hub, &args.www);
    let listener = server::bind(&args.host, args.port).await?;
    server::serve(listener, app, server::shutdown_signal()).await?;

    // Open sockets hold handles until they close
    coordinator.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{ModelArtifact, ModelSpec};
    use crate::motion::FEATURE_COUNT;
    use clap::Parser;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_model(dir: &Path) -> std::path::PathBuf {
        let artifact = ModelArtifact {
            name: Some("session-test".to_string()),
            feature_names: None,
            scaler: None,
            model: ModelSpec::Linear {
                coef: vec![0.0; FEATURE_COUNT],
                intercept: 1.0,
                threshold: 0.0,
            },
        };
        let path = dir.join("model.json");
        std::fs::write(&path, artifact.to_json_bytes().unwrap()).unwrap();
        path
    }

    #[test]
    fn test_classify_requires_model() {
        let args = Args::parse_from(["tremorwatch"]);
        assert!(matches!(
            build_session(&args, Utc::now()),
            Err(AppError::Config(ConfigError::MissingModel))
        ));
    }

    #[test]
    fn test_classify_session_with_recording() {
        let temp_dir = TempDir::new().unwrap();
        let model = write_model(temp_dir.path());
        let results = temp_dir.path().join("resultats");

        let args = Args::parse_from([
            "tremorwatch",
            "--model",
            model.to_str().unwrap(),
            "--output",
            "patient1",
            "--results-dir",
            results.to_str().unwrap(),
            "--duration",
            "60",
        ]);

        let session = build_session(&args, Utc::now()).unwrap();
        assert_eq!(session.mode(), SessionMode::Classify);
        assert!(session.is_recording());
        assert!(results.join("patient1.csv").exists());

        // A second run may not overwrite the first recording
        drop(session);
        assert!(matches!(
            build_session(&args, Utc::now()),
            Err(AppError::Recording(RecordingError::AlreadyExists(_)))
        ));
    }

    #[test]
    fn test_recording_deadline_range() {
        let start = Utc::now();
        assert_eq!(recording_deadline(start, 0).unwrap(), None);
        assert_eq!(
            recording_deadline(start, 90).unwrap(),
            Some(start + TimeDelta::try_seconds(90).unwrap())
        );

        for duration in [u64::MAX, i64::MAX as u64, 1 << 62] {
            assert!(matches!(
                recording_deadline(start, duration),
                Err(ConfigError::Invalid(_))
            ));
        }
    }

    #[test]
    fn test_huge_duration_fails_startup() {
        let temp_dir = TempDir::new().unwrap();
        let args = Args::parse_from([
            "tremorwatch",
            "--mode",
            "collect",
            "--output",
            "capture",
            "--data-dir",
            temp_dir.path().to_str().unwrap(),
            "--duration",
            "18446744073709551615",
        ]);
        assert!(matches!(
            build_session(&args, Utc::now()),
            Err(AppError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_short_window_config_fails_startup() {
        let temp_dir = TempDir::new().unwrap();
        let model = write_model(temp_dir.path());
        let config = temp_dir.path().join("pipeline.json");
        std::fs::write(&config, r#"{"window_size": 12}"#).unwrap();

        let args = Args::parse_from([
            "tremorwatch",
            "--model",
            model.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ]);
        assert!(matches!(
            build_session(&args, Utc::now()),
            Err(AppError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_collect_session_uses_label_directory() {
        let temp_dir = TempDir::new().unwrap();
        let data = temp_dir.path().join("data");

        let args = Args::parse_from([
            "tremorwatch",
            "--mode",
            "collect",
            "--label",
            "Tremor",
            "--output",
            "capture",
            "--data-dir",
            data.to_str().unwrap(),
        ]);

        let session = build_session(&args, Utc::now()).unwrap();
        assert_eq!(session.mode(), SessionMode::Collect);
        assert!(data.join("tremor").join("capture.csv").exists());
    }
}
