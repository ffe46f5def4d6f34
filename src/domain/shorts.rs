use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A candidate short-form clip: a time span with an optional score,
/// selection reason, and transcript snippet used for scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentCandidate {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

impl SegmentCandidate {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end, score: 0.0, reason: None, snippet: None }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Naive fixed-length splits across the full duration.
pub fn equal_splits(duration: f64, clip_length: f64) -> Vec<SegmentCandidate> {
    if duration <= 0.0 || clip_length <= 0.0 {
        return Vec::new();
    }
    let mut segments = Vec::new();
    let mut t = 0.0;
    while t < duration {
        let end = duration.min(t + clip_length);
        segments.push(SegmentCandidate { start: t, end, score: 0.0, reason: Some("equal_split".to_string()), snippet: None });
        t += clip_length;
    }
    segments
}

/// Overlapping fixed-width windows advancing by `stride`.
pub fn sliding_window(duration: f64, window: f64, stride: f64) -> Vec<SegmentCandidate> {
    if duration <= 0.0 || window <= 0.0 || stride <= 0.0 {
        return Vec::new();
    }
    let mut segments = Vec::new();
    let mut t = 0.0;
    while t < duration {
        let end = duration.min(t + window);
        segments.push(SegmentCandidate { start: t, end, score: 0.0, reason: Some("sliding_window".to_string()), snippet: None });
        t += stride;
    }
    segments
}

/// Count keyword occurrences (case-insensitive substring match) in each
/// candidate's snippet and set that count as its score, leaving candidates
/// without a snippet at score 0.
pub fn score_segments_heuristic(candidates: &[SegmentCandidate], keywords: &[String]) -> Vec<SegmentCandidate> {
    candidates
        .iter()
        .cloned()
        .map(|mut c| {
            let score = match &c.snippet {
                Some(snippet) => {
                    let lower = snippet.to_lowercase();
                    keywords.iter().map(|kw| lower.matches(&kw.to_lowercase()).count() as f64).sum()
                }
                None => 0.0,
            };
            c.score = score;
            c
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct LlmScoreEntry {
    #[allow(dead_code)]
    start: f64,
    #[allow(dead_code)]
    end: f64,
    score: f64,
}

/// A `chat.completions.create`-shaped scoring backend: given a model name
/// and a prompt, return the raw assistant message content.
#[async_trait]
pub trait LlmScoringClient: Send + Sync {
    async fn complete(&self, model: &str, prompt: &str, candidates_json: &str) -> anyhow::Result<String>;
}

/// Score candidates via an injectable LLM client. The client is given the
/// prompt plus a JSON payload of `{candidates: [{start, end, snippet}]}` and
/// is expected to answer with a JSON array of `{start, end, score}` in the
/// same order. On any client error or response that fails to parse into
/// exactly that shape, scores are left unchanged rather than the call
/// failing outright.
pub async fn score_segments_llm(
    candidates: &[SegmentCandidate],
    prompt: &str,
    model: &str,
    client: &dyn LlmScoringClient,
) -> Vec<SegmentCandidate> {
    let payload = json!({
        "candidates": candidates.iter().map(|c| json!({
            "start": c.start,
            "end": c.end,
            "snippet": c.snippet,
        })).collect::<Vec<_>>(),
    });

    let response = match client.complete(model, prompt, &payload.to_string()).await {
        Ok(text) => text,
        Err(_) => return candidates.to_vec(),
    };

    let parsed: Result<Vec<LlmScoreEntry>, _> = serde_json::from_str(&response);
    match parsed {
        Ok(entries) if entries.len() == candidates.len() => candidates
            .iter()
            .cloned()
            .zip(entries)
            .map(|(mut c, e)| {
                c.score = e.score;
                c
            })
            .collect(),
        _ => candidates.to_vec(),
    }
}

/// Select at most `max_segments` non-overlapping candidates (separated by
/// at least `min_gap`) within `[min_duration, max_duration]` maximizing
/// total score, via weighted interval scheduling with a cardinality
/// constraint.
///
/// 1. Filter by duration bounds.
/// 2. Sort by `end` ascending.
/// 3. For each interval `i`, find `p(i)`, the largest index `j < i` with
///    `intervals[j].end <= intervals[i].start - min_gap`.
/// 4. `dp[i][k] = max(dp[i-1][k], score_i + dp[p(i)][k-1])`.
/// 5. Reconstruct the selected set and sort by `start` for output.
pub fn select_top(
    candidates: &[SegmentCandidate],
    max_segments: usize,
    min_duration: f64,
    max_duration: f64,
    min_gap: f64,
) -> Vec<SegmentCandidate> {
    let mut filtered: Vec<SegmentCandidate> = candidates
        .iter()
        .filter(|c| c.duration() >= min_duration && c.duration() <= max_duration && c.start < c.end)
        .cloned()
        .collect();

    if filtered.is_empty() || max_segments == 0 {
        return Vec::new();
    }

    filtered.sort_by(|a, b| a.end.partial_cmp(&b.end).unwrap_or(std::cmp::Ordering::Equal));
    let n = filtered.len();

    let mut p = vec![usize::MAX; n];
    for i in 0..n {
        let cutoff = filtered[i].start - min_gap;
        let mut lo = 0usize;
        let mut hi = i;
        let mut result = usize::MAX;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if filtered[mid].end <= cutoff {
                result = mid;
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        p[i] = result;
    }

    let k_max = max_segments;
    // dp[i][k]: max score using the first i intervals (1-indexed), picking at most k.
    let mut dp = vec![vec![0.0_f64; k_max + 1]; n + 1];
    for i in 1..=n {
        let score_i = filtered[i - 1].score;
        let prev = p[i - 1];
        let take_base = if prev == usize::MAX { 0 } else { prev + 1 };
        for k in 1..=k_max {
            let skip = dp[i - 1][k];
            let take = score_i + dp[take_base][k - 1];
            dp[i][k] = skip.max(take);
        }
    }

    let mut selected_idx: Vec<usize> = Vec::new();
    let mut i = n;
    let mut k = k_max;
    while i > 0 && k > 0 {
        if dp[i][k] == dp[i - 1][k] {
            i -= 1;
        } else {
            selected_idx.push(i - 1);
            let prev = p[i - 1];
            i = if prev == usize::MAX { 0 } else { prev + 1 };
            k -= 1;
        }
    }

    let mut selected: Vec<SegmentCandidate> = selected_idx.into_iter().map(|idx| filtered[idx].clone()).collect();
    selected.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
    selected
}
