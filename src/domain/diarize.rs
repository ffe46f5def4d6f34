use crate::domain::subtitle::SubtitleLine;
use serde::{Deserialize, Serialize};

/// A speaker-labeled time span produced by a diarization backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerSegment {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
}

impl SpeakerSegment {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Which diarization backend a job should run. The default is NOOP: no
/// network calls, no speaker labels, safe to run with `offline_mode = true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiarizationBackend {
    #[default]
    Noop,
    Pyannote,
    SpeechBrain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiarizationConfig {
    pub backend: DiarizationBackend,
    pub model: String,
    pub huggingface_token: Option<String>,
    pub min_segment_duration: f64,
}

impl Default for DiarizationConfig {
    fn default() -> Self {
        Self {
            backend: DiarizationBackend::Noop,
            model: "pyannote/speaker-diarization-3.1".to_string(),
            huggingface_token: None,
            min_segment_duration: 0.0,
        }
    }
}

/// Attach `speaker` labels to subtitle lines by finding, for each line, the
/// diarization segment with the greatest temporal overlap.
///
/// Ties are broken in favor of the first segment seen (strict `>`
/// comparison, not `>=`). With no segments, lines pass through unlabeled.
pub fn assign_speakers_to_lines(lines: &[SubtitleLine], segments: &[SpeakerSegment]) -> Vec<SubtitleLine> {
    if segments.is_empty() {
        return lines.to_vec();
    }

    lines
        .iter()
        .map(|line| {
            let mut best_speaker: Option<&str> = None;
            let mut best_overlap = 0.0_f64;
            for seg in segments {
                let overlap = (line.end.min(seg.end) - line.start.max(seg.start)).max(0.0);
                if overlap > best_overlap {
                    best_overlap = overlap;
                    best_speaker = Some(seg.speaker.as_str());
                }
            }
            SubtitleLine::new(line.start, line.end, line.words.clone())
                .with_speaker(best_speaker.map(str::to_string))
        })
        .collect()
}

/// A single speaker-embedding vector paired with the speech span it was
/// computed from. Callers are responsible for running VAD and the speaker
/// embedding model; this module only clusters the results.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddedRegion {
    pub start: f64,
    pub end: f64,
    pub embedding: Vec<f32>,
}

const SPEECHBRAIN_SIMILARITY_THRESHOLD: f64 = 0.65;
const SPEECHBRAIN_MERGE_GAP_SECONDS: f64 = 0.10;

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = (v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt()) as f32;
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Greedy online clustering of speaker embeddings into pseudo-speaker
/// labels, followed by adjacent-segment merging and a minimum-duration
/// filter.
///
/// Grounded on `_diarize_speechbrain`'s clustering loop: each region is
/// assigned to the most similar existing centroid if the cosine similarity
/// clears [`SPEECHBRAIN_SIMILARITY_THRESHOLD`], else it seeds a new
/// speaker. Centroids are running means, renormalized after each update.
/// Consecutive regions assigned the same speaker and separated by no more
/// than [`SPEECHBRAIN_MERGE_GAP_SECONDS`] are coalesced into one segment.
pub fn cluster_speechbrain_regions(regions: &[EmbeddedRegion], min_segment_duration: f64) -> Vec<SpeakerSegment> {
    if regions.is_empty() {
        return Vec::new();
    }

    let mut centroids: Vec<Vec<f32>> = Vec::new();
    let mut centroid_counts: Vec<u32> = Vec::new();
    let mut assignments: Vec<usize> = Vec::new();

    for region in regions {
        let emb = normalize(&region.embedding);
        let mut best_idx: Option<usize> = None;
        let mut best_sim = -1.0_f64;
        for (idx, centroid) in centroids.iter().enumerate() {
            let sim = cosine_similarity(&emb, centroid);
            if sim > best_sim {
                best_sim = sim;
                best_idx = Some(idx);
            }
        }

        match best_idx {
            Some(idx) if best_sim >= SPEECHBRAIN_SIMILARITY_THRESHOLD => {
                centroid_counts[idx] += 1;
                let n = centroid_counts[idx] as f32;
                let updated: Vec<f32> = centroids[idx]
                    .iter()
                    .zip(emb.iter())
                    .map(|(c, e)| (*c * (n - 1.0) + *e) / n)
                    .collect();
                centroids[idx] = normalize(&updated);
                assignments.push(idx);
            }
            _ => {
                centroids.push(emb);
                centroid_counts.push(1);
                assignments.push(centroids.len() - 1);
            }
        }
    }

    let mut segments: Vec<SpeakerSegment> = Vec::new();
    for (region, &cluster_idx) in regions.iter().zip(assignments.iter()) {
        let speaker = format!("SPEAKER_{cluster_idx:02}");
        if let Some(last) = segments.last_mut() {
            if last.speaker == speaker && region.start <= last.end + SPEECHBRAIN_MERGE_GAP_SECONDS {
                last.end = last.end.max(region.end);
                continue;
            }
        }
        segments.push(SpeakerSegment { start: region.start, end: region.end, speaker });
    }

    if min_segment_duration > 0.0 {
        segments.retain(|s| s.duration() >= min_segment_duration);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::word::Word;

    fn line(start: f64, end: f64) -> SubtitleLine {
        SubtitleLine::new(start, end, vec![Word::new("x", start, end).unwrap()])
    }

    #[test]
    fn lines_pass_through_unlabeled_with_no_segments() {
        let lines = vec![line(0.0, 1.0)];
        let labeled = assign_speakers_to_lines(&lines, &[]);
        assert_eq!(labeled[0].speaker, None);
    }

    #[test]
    fn assigns_speaker_with_greatest_overlap() {
        let lines = vec![line(0.0, 2.0)];
        let segments = vec![
            SpeakerSegment { start: 0.0, end: 0.5, speaker: "A".to_string() },
            SpeakerSegment { start: 0.5, end: 2.0, speaker: "B".to_string() },
        ];
        let labeled = assign_speakers_to_lines(&lines, &segments);
        assert_eq!(labeled[0].speaker.as_deref(), Some("B"));
    }

    #[test]
    fn ties_break_in_favor_of_first_segment_seen() {
        let lines = vec![line(0.0, 2.0)];
        let segments = vec![
            SpeakerSegment { start: 0.0, end: 1.0, speaker: "A".to_string() },
            SpeakerSegment { start: 1.0, end: 2.0, speaker: "B".to_string() },
        ];
        let labeled = assign_speakers_to_lines(&lines, &segments);
        assert_eq!(labeled[0].speaker.as_deref(), Some("A"));
    }

    #[test]
    fn clusters_similar_embeddings_into_the_same_speaker() {
        let regions = vec![
            EmbeddedRegion { start: 0.0, end: 1.0, embedding: vec![1.0, 0.0] },
            EmbeddedRegion { start: 1.05, end: 2.0, embedding: vec![0.99, 0.01] },
            EmbeddedRegion { start: 5.0, end: 6.0, embedding: vec![0.0, 1.0] },
        ];
        let segments = cluster_speechbrain_regions(&regions, 0.0);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].speaker, "SPEAKER_00");
        assert!((segments[0].end - 2.0).abs() < 1e-6);
        assert_eq!(segments[1].speaker, "SPEAKER_01");
    }

    #[test]
    fn does_not_merge_across_large_gaps() {
        let regions = vec![
            EmbeddedRegion { start: 0.0, end: 1.0, embedding: vec![1.0, 0.0] },
            EmbeddedRegion { start: 10.0, end: 11.0, embedding: vec![1.0, 0.0] },
        ];
        let segments = cluster_speechbrain_regions(&regions, 0.0);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn filters_segments_below_min_duration() {
        let regions = vec![EmbeddedRegion { start: 0.0, end: 0.05, embedding: vec![1.0, 0.0] }];
        let segments = cluster_speechbrain_regions(&regions, 0.2);
        assert!(segments.is_empty());
    }
}
