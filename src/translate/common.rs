use crate::error::{Result, VidsubError};
use crate::transcript::Segment;

/// Re-attach translated strings to the segments they came from.
///
/// Missing strings become empty text; extra strings are dropped, so the result
/// always has `batch.len()` entries.
pub fn merge_translations<I>(batch: &[Segment], translations: I) -> Vec<Segment>
where
    I: IntoIterator<Item = String>,
{
    let mut translations = translations.into_iter();
    batch
        .iter()
        .map(|segment| {
            let text = translations.next().unwrap_or_default();
            segment.with_text(text.trim())
        })
        .collect()
}

/// Check that a translation lines up with its source: same length, same timing at every position.
pub fn ensure_aligned(source: &[Segment], translated: &[Segment]) -> Result<()> {
    if source.len() != translated.len() {
        return Err(VidsubError::Translation(format!(
            "Expected {} translated segments, got {}",
            source.len(),
            translated.len()
        )));
    }

    if let Some(index) = source
        .iter()
        .zip(translated)
        .position(|(a, b)| a.start != b.start || a.end != b.end)
    {
        return Err(VidsubError::Translation(format!(
            "Translated segment {} does not match the timing of its source",
            index + 1
        )));
    }

    Ok(())
}

/// Number of sub-batches needed for `total` segments.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    total.div_ceil(batch_size.max(1))
}
