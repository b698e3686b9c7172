// Motion signal module
// Sample decoding, windowing, low-pass filtering and feature extraction

pub mod features;
pub mod filter;
pub mod sample;
pub mod window;

pub use features::{extract_features, FeatureError, FeatureVector, FEATURE_COUNT};
pub use filter::{FilterError, LowPassFilter};
pub use sample::{parse_record, Axis, ParseError, Sample};
pub use window::{ChannelFrame, SessionBuffer, TriggerPolicy};
