//! Fixed-duration frame splitting

use voice_relay_core::{AudioClip, SampleRate};

/// Split a clip into fixed-duration frames at the transport sample rate
///
/// The clip is resampled to `target_rate` first. Only complete frames are
/// emitted; a partial tail shorter than one frame is dropped. Callers that
/// must guarantee at least one frame for non-empty audio pad the clip with
/// one frame of silence and retry the split.
pub fn split_frames(clip: &AudioClip, target_rate: SampleRate, frame_ms: u32) -> Vec<Vec<f32>> {
    let clip = if clip.sample_rate == target_rate {
        clip.clone()
    } else {
        clip.resample(target_rate)
    };

    let frame_size = target_rate.frame_size(frame_ms);
    if frame_size == 0 {
        return Vec::new();
    }

    clip.samples
        .chunks_exact(frame_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_exact_frames() {
        // 100ms at 8kHz = five 20ms frames
        let clip = AudioClip::new(vec![0.1; 800], SampleRate::Hz8000);
        let frames = split_frames(&clip, SampleRate::Hz8000, 20);

        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|f| f.len() == 160));
    }

    #[test]
    fn test_partial_tail_dropped() {
        // 50ms at 8kHz = two full 20ms frames, 10ms remainder dropped
        let clip = AudioClip::new(vec![0.1; 400], SampleRate::Hz8000);
        let frames = split_frames(&clip, SampleRate::Hz8000, 20);

        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_short_clip_yields_zero_frames() {
        // 10ms at 8kHz, shorter than one 20ms frame
        let clip = AudioClip::new(vec![0.1; 80], SampleRate::Hz8000);
        let frames = split_frames(&clip, SampleRate::Hz8000, 20);

        assert!(frames.is_empty());
    }

    #[test]
    fn test_split_resamples_to_target() {
        // 100ms at 16kHz split for the 8kHz telephony rate
        let clip = AudioClip::new(vec![0.1; 1600], SampleRate::Hz16000);
        let frames = split_frames(&clip, SampleRate::Hz8000, 20);

        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|f| f.len() == 160));
    }

    #[test]
    fn test_empty_clip() {
        let clip = AudioClip::new(Vec::new(), SampleRate::Hz8000);
        assert!(split_frames(&clip, SampleRate::Hz8000, 20).is_empty());
    }
}
