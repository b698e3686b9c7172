// Session context
// Process-wide pipeline state: buffer, filter, classifier, smoother, recorder and trace

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::classify::{
    Classifier, ClassifierError, MotionLabel, PredictionSmoother, StandardScaler,
};
use crate::config::{PipelineConfig, SessionMode};
use crate::motion::sample::split_record;
use crate::motion::{
    extract_features, parse_record, ChannelFrame, FeatureError, FeatureVector, FilterError,
    LowPassFilter, ParseError, SessionBuffer, FEATURE_COUNT,
};
use crate::pipeline::trace::{PredictionTrace, TraceWriter};
use crate::recording::CsvRecorder;

/// Failure of one pipeline run; the trigger is skipped
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),
}

/// Result of feeding one record to the session
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Malformed record; nothing is persisted or sent
    Rejected(ParseError),

    /// Record kept; `prediction` is the smoothed label when a run completed
    Accepted { prediction: Option<MotionLabel> },
}

impl RecordOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RecordOutcome::Accepted { .. })
    }

    pub fn prediction(&self) -> Option<MotionLabel> {
        match self {
            RecordOutcome::Accepted { prediction } => *prediction,
            RecordOutcome::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub accepted: u64,
    pub rejected: u64,
    pub triggers: u64,
    pub inferences: u64,
    /// Runs skipped because filtering or feature extraction failed
    pub signal_failures: u64,
    /// Runs skipped because the scaler or classifier failed
    pub classifier_failures: u64,
}

/// What the session does with a record
enum Stage {
    Classify {
        buffer: SessionBuffer,
        filter: LowPassFilter,
        classifier: Classifier,
        smoother: PredictionSmoother,
        sample_rate_hz: f64,
    },
    Collect {
        label: String,
    },
}

pub struct SessionContext {
    stage: Stage,
    recorder: Option<CsvRecorder>,
    trace: Option<TraceWriter>,
    reset_history_on_connect: bool,
    stats: SessionStats,
}

impl SessionContext {
    /// Classification session with a loaded classifier
    ///
    /// Fails when no window could ever be classified: a window not longer
    /// than the filter padding, or a model sized for another feature count.
    pub fn classify(config: &PipelineConfig, classifier: Classifier) -> Result<Self, RunError> {
        let filter =
            LowPassFilter::butterworth(config.filter_order, config.cutoff_hz, config.sample_rate_hz)?;
        if config.window_size <= filter.pad_len() {
            return Err(FilterError::SegmentTooShort {
                len: config.window_size,
                pad_len: filter.pad_len(),
            }
            .into());
        }
        check_model_dimension(&classifier)?;

        let buffer = SessionBuffer::new(config.window_size, config.stride, config.trigger);
        let smoother = PredictionSmoother::new(config.smoothing_depth);
        log::info!(
            "Pipeline: window {} ({:?}), order {} low-pass at {} Hz, {} Hz sampling, smoothing depth {}",
            buffer.window_size(),
            buffer.policy(),
            filter.order(),
            filter.cutoff_hz(),
            filter.sample_rate_hz(),
            smoother.depth()
        );

        Ok(SessionContext {
            stage: Stage::Classify {
                buffer,
                filter,
                classifier,
                smoother,
                sample_rate_hz: config.sample_rate_hz,
            },
            recorder: None,
            trace: None,
            reset_history_on_connect: config.reset_history_on_connect,
            stats: SessionStats::default(),
        })
    }

    /// Labelled capture session: records are persisted and relayed, never classified
    pub fn collect(label: impl Into<String>) -> Self {
        SessionContext {
            stage: Stage::Collect {
                label: label.into(),
            },
            recorder: None,
            trace: None,
            reset_history_on_connect: false,
            stats: SessionStats::default(),
        }
    }

    pub fn with_recorder(mut self, recorder: CsvRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_trace(mut self, trace: TraceWriter) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn mode(&self) -> SessionMode {
        match self.stage {
            Stage::Classify { .. } => SessionMode::Classify,
            Stage::Collect { .. } => SessionMode::Collect,
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.as_ref().is_some_and(CsvRecorder::is_recording)
    }

    /// Called for every new peer
    pub fn on_connect(&mut self) {
        if !self.reset_history_on_connect {
            return;
        }
        if let Stage::Classify { smoother, .. } = &mut self.stage {
            smoother.reset();
            log::debug!("Prediction history reset on connect");
        }
    }

    /// Feed one text record through the session
    pub fn ingest(&mut self, record: &str, now: DateTime<Utc>) -> RecordOutcome {
        if let Some(recorder) = self.recorder.as_mut() {
            if recorder.check_deadline(now) {
                log::info!(
                    "Recording finished: {} rows in {}",
                    recorder.rows(),
                    recorder.path().display()
                );
            }
        }

        match self.stage {
            Stage::Classify { .. } => self.ingest_sample(record, now),
            Stage::Collect { .. } => self.ingest_labelled(record),
        }
    }

    fn ingest_sample(&mut self, record: &str, now: DateTime<Utc>) -> RecordOutcome {
        let sample = match parse_record(record) {
            Ok(sample) => sample,
            Err(e) => {
                self.stats.rejected += 1;
                log::debug!("Rejected record {:?}: {}", record, e);
                return RecordOutcome::Rejected(e);
            }
        };
        self.stats.accepted += 1;

        let Stage::Classify {
            buffer,
            filter,
            classifier,
            smoother,
            sample_rate_hz,
        } = &mut self.stage
        else {
            return RecordOutcome::Accepted { prediction: None };
        };

        let mut prediction = None;
        if buffer.push(sample) {
            self.stats.triggers += 1;
            match run_window(buffer, filter, classifier, *sample_rate_hz) {
                Ok((features, raw)) => {
                    self.stats.inferences += 1;
                    let smoothed = smoother.push(raw);
                    prediction = Some(smoothed);

                    if let Some(trace) = self.trace.as_mut() {
                        let entry =
                            PredictionTrace::new(now, buffer.accepted(), raw, smoothed, features);
                        if let Err(e) = trace.write(&entry) {
                            log::error!(
                                "Trace write to {} failed, disabling trace: {}",
                                trace.path().display(),
                                e
                            );
                            self.trace = None;
                        }
                    }
                }
                Err(e) => {
                    match e {
                        RunError::Classifier(_) => self.stats.classifier_failures += 1,
                        RunError::Filter(_) | RunError::Feature(_) => {
                            self.stats.signal_failures += 1
                        }
                    }
                    log::warn!("Skipping prediction at sample {}: {}", buffer.accepted(), e);
                }
            }
        }

        let label = prediction.map(|l| l.as_str());
        self.persist(record, label);

        RecordOutcome::Accepted { prediction }
    }

    fn ingest_labelled(&mut self, record: &str) -> RecordOutcome {
        if record.trim().is_empty() {
            self.stats.rejected += 1;
            return RecordOutcome::Rejected(ParseError::TooFewFields { found: 0 });
        }
        self.stats.accepted += 1;

        let label = match &self.stage {
            Stage::Collect { label } => label.clone(),
            Stage::Classify { .. } => String::new(),
        };
        self.persist(record, Some(&label));

        RecordOutcome::Accepted { prediction: None }
    }

    fn persist(&mut self, record: &str, label: Option<&str>) {
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };

        let fields = split_record(record);
        if let Err(e) = recorder.write_row(&fields, label) {
            log::error!(
                "Recording to {} failed, disabling recorder: {}",
                recorder.path().display(),
                e
            );
            recorder.close();
        }
    }
}

/// The scaler and model must both take a full feature vector
fn check_model_dimension(classifier: &Classifier) -> Result<(), ClassifierError> {
    let parts = [
        ("scaler", classifier.scaler().map(StandardScaler::dimension)),
        ("model", classifier.dimension()),
    ];
    for (stage, dimension) in parts {
        match dimension {
            Some(found) if found != FEATURE_COUNT => {
                return Err(ClassifierError::DimensionMismatch {
                    stage,
                    expected: FEATURE_COUNT,
                    found,
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Filter the current window, extract features and classify
fn run_window(
    buffer: &SessionBuffer,
    filter: &LowPassFilter,
    classifier: &Classifier,
    sample_rate_hz: f64,
) -> Result<(FeatureVector, MotionLabel), RunError> {
    let samples = buffer.window().ok_or(FeatureError::EmptyWindow)?;
    let mut frame = ChannelFrame::from_samples(&samples);
    filter.apply(&mut frame)?;

    let features = extract_features(&frame, sample_rate_hz)?;
    let raw = classifier.predict(&features)?;
    Ok((features, raw))
}
