use std::{
    fmt,
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};

use crate::{config::validate_volume, Result, VisualiserError};

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a loaded audio asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(u64);

impl SourceId {
    pub fn next() -> Self {
        Self(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// A locally provided audio asset that can be streamed into the analyser and
/// driven by the transport.
pub trait AudioSource {
    fn id(&self) -> SourceId;
    fn sample_rate(&self) -> u32;
    /// Total length in seconds.
    fn duration(&self) -> f64;
    /// Current playhead in seconds.
    fn position(&self) -> f64;
    /// Moves the playhead, clamped to `[0, duration]`.
    fn seek(&mut self, seconds: f64);
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32) -> Result<()>;
    /// Starts audible playback. Only a successful return counts as playing.
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    /// Writes the most recent `out.len()` mono samples ending at the playhead.
    /// Positions before the start of the asset are written as silence.
    fn fill_window(&self, out: &mut [f32]);
    /// Moves the playhead forward by `seconds` of host time while playing.
    /// Returns `None` when paused.
    fn advance(&mut self, seconds: f64) -> Option<SourceEvent>;
}

/// Notifications a source emits while its playhead moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SourceEvent {
    TimeUpdate { position: f64 },
    Ended,
}

/// Summary of a decoded asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub sample_rate: u32,
    pub frames: usize,
    pub duration_seconds: f64,
}

/// In-memory mono PCM asset with a playhead advanced by the host clock.
pub struct PcmSource {
    id: SourceId,
    samples: Vec<f32>,
    sample_rate: u32,
    cursor: usize,
    volume: f32,
    paused: bool,
}

impl PcmSource {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(VisualiserError::Decode("sample rate must be positive".into()));
        }
        Ok(Self {
            id: SourceId::next(),
            samples,
            sample_rate,
            cursor: 0,
            volume: 1.0,
            paused: true,
        })
    }

    /// Decodes a WAV file, down-mixing every channel to mono.
    pub fn from_wav(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = hound::WavReader::open(path)?;
        tracing::debug!(?path, spec = ?reader.spec(), "decoding wav asset");
        Self::from_wav_reader(reader)
    }

    pub fn from_wav_reader<R: std::io::Read>(reader: hound::WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 * scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let mono = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Self::new(mono, spec.sample_rate)
    }

    pub fn summary(&self) -> SourceSummary {
        SourceSummary {
            sample_rate: self.sample_rate,
            frames: self.samples.len(),
            duration_seconds: self.duration(),
        }
    }
}

impl AudioSource for PcmSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    fn position(&self) -> f64 {
        self.cursor as f64 / f64::from(self.sample_rate)
    }

    fn seek(&mut self, seconds: f64) {
        let target = seconds.clamp(0.0, self.duration());
        let frame = (target * f64::from(self.sample_rate)).round() as usize;
        self.cursor = frame.min(self.samples.len());
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        validate_volume(volume)?;
        self.volume = volume;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.samples.is_empty() {
            return Err(VisualiserError::PlaybackStartFailed(
                "asset contains no audio frames".into(),
            ));
        }
        if self.cursor >= self.samples.len() {
            self.cursor = 0;
        }
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn fill_window(&self, out: &mut [f32]) {
        let end = self.cursor;
        let len = out.len();
        let available = end.min(len);
        let silent = len - available;

        out[..silent].fill(0.0);
        out[silent..].copy_from_slice(&self.samples[end - available..end]);
    }

    fn advance(&mut self, seconds: f64) -> Option<SourceEvent> {
        if self.paused {
            return None;
        }

        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        let step = (seconds * f64::from(self.sample_rate)).round() as usize;
        self.cursor = self.cursor.saturating_add(step).min(self.samples.len());

        if self.cursor >= self.samples.len() {
            self.paused = true;
            Some(SourceEvent::Ended)
        } else {
            Some(SourceEvent::TimeUpdate {
                position: self.position(),
            })
        }
    }
}

impl fmt::Debug for PcmSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcmSource")
            .field("id", &self.id)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.samples.len())
            .field("cursor", &self.cursor)
            .field("paused", &self.paused)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_zero_padded_before_start() {
        let mut source = PcmSource::new(vec![0.5; 8], 4).unwrap();
        source.seek(0.5);

        let mut window = [1.0_f32; 4];
        source.fill_window(&mut window);
        assert_eq!(window, [0.0, 0.0, 0.5, 0.5]);
    }

    #[test]
    fn advance_reports_end_and_pauses() {
        let mut source = PcmSource::new(vec![0.0; 100], 100).unwrap();
        assert_eq!(source.advance(0.5), None);

        source.play().unwrap();
        assert_eq!(
            source.advance(0.5),
            Some(SourceEvent::TimeUpdate { position: 0.5 })
        );
        assert_eq!(source.advance(0.6), Some(SourceEvent::Ended));
        assert!(source.is_paused());
        assert_eq!(source.position(), 1.0);
    }

    #[test]
    fn oversized_steps_clamp_to_the_end() {
        let mut source = PcmSource::new(vec![0.0; 100], 100).unwrap();
        source.play().unwrap();
        source.advance(0.1);

        assert_eq!(
            source.advance(f64::INFINITY),
            Some(SourceEvent::TimeUpdate { position: 0.1 })
        );
        assert_eq!(
            source.advance(f64::NAN),
            Some(SourceEvent::TimeUpdate { position: 0.1 })
        );
        assert_eq!(source.advance(f64::MAX), Some(SourceEvent::Ended));
        assert_eq!(source.position(), 1.0);
    }

    #[test]
    fn empty_asset_refuses_to_play() {
        let mut source = PcmSource::new(Vec::new(), 48_000).unwrap();
        let err = source.play().unwrap_err();
        assert!(matches!(err, VisualiserError::PlaybackStartFailed(_)));
        assert!(source.is_paused());
    }

    #[test]
    fn decodes_stereo_wav_to_mono() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut bytes, spec).unwrap();
            for _ in 0..80 {
                writer.write_sample(i16::MAX).unwrap();
                writer.write_sample(0_i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        bytes.set_position(0);

        let reader = hound::WavReader::new(bytes).unwrap();
        let source = PcmSource::from_wav_reader(reader).unwrap();
        let summary = source.summary();

        assert_eq!(summary.frames, 80);
        assert_eq!(summary.sample_rate, 8_000);
        assert!((summary.duration_seconds - 0.01).abs() < 1e-9);
        assert!((source.samples[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn sources_get_distinct_ids() {
        let a = PcmSource::new(vec![0.0], 10).unwrap();
        let b = PcmSource::new(vec![0.0], 10).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
