pub mod diarize;
pub mod serialize;
pub mod shorts;
pub mod subtitle;
pub mod translate;
pub mod word;

pub use diarize::{assign_speakers_to_lines, DiarizationBackend, DiarizationConfig, SpeakerSegment};
pub use shorts::{equal_splits, select_top, sliding_window, SegmentCandidate};
pub use subtitle::{group_words, GroupingConfig, SubtitleLine};
pub use translate::{CloudTranslator, NoOpTranslator, Translator};
pub use word::{TranscriptionResult, Word};
