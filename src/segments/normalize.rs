/// Segment normalization: pad, sort and merge raw detections into a canonical list
use super::Segment;
use tracing::debug;

/// Normalize raw segments into an ascending, non-overlapping, deduplicated list.
///
/// Padding is applied to every segment before sorting (`start` clamped at 0),
/// and the sweep merges on plain overlap/adjacency of the padded ranges, so two
/// raw segments merge when their gap is at most `2 * padding`. Segments with
/// non-finite bounds or `end <= start` are dropped up front. A merged run keeps
/// the category of its earliest segment.
pub fn normalize(segments: &[Segment], padding: f64) -> Vec<Segment> {
    debug!("Normalizing {} raw segments (padding {:.1}s)", segments.len(), padding);

    let padding = if padding.is_finite() { padding.max(0.0) } else { 0.0 };

    let mut padded: Vec<Segment> = segments
        .iter()
        .filter(|s| s.start.is_finite() && s.end.is_finite() && s.end > s.start && s.end > 0.0)
        .map(|s| Segment {
            start: (s.start - padding).max(0.0),
            end: s.end + padding,
            category: s.category.clone(),
        })
        .collect();

    if padded.is_empty() {
        debug!("Nothing to normalize");
        return Vec::new();
    }

    // Stable sort keeps the first-seen category for equal starts
    padded.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut result: Vec<Segment> = Vec::with_capacity(padded.len());
    let mut iter = padded.into_iter();
    let mut current = match iter.next() {
        Some(first) => first,
        None => return result,
    };

    for next in iter {
        if next.start <= current.end {
            current.end = current.end.max(next.end);
        } else {
            result.push(std::mem::replace(&mut current, next));
        }
    }
    result.push(current);

    debug!("Normalized into {} segments", result.len());
    result
}
