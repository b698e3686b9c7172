// Session recording module
// CSV persistence of accepted records with an optional recording deadline

pub mod csv;

pub use self::csv::{
    classify_output_path, collect_output_path, CsvRecorder, RecordingError, CSV_HEADER,
};
