//! Audio probing and decoding via symphonia.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Sample rate expected by every speech model.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unrecognised audio format: {0}")]
    Probe(String),

    #[error("no audio track found")]
    NoTrack,

    #[error("unknown sample rate")]
    UnknownSampleRate,

    #[error("decode: {0}")]
    Decode(String),

    #[error("resample: {0}")]
    Resample(String),

    #[error("no audio samples decoded")]
    Empty,
}

/// Basic stream properties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioProperties {
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: usize,
}

struct OpenedTrack {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: Option<usize>,
    n_frames: Option<u64>,
}

fn open_track(path: &Path) -> Result<OpenedTrack, AudioError> {
    let file = File::open(path).map_err(|source| AudioError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::Probe(e.to_string()))?;
    let format = probed.format;

    let track = format.default_track().ok_or(AudioError::NoTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or(AudioError::UnknownSampleRate)?;

    let decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(format!("codec: {e}")))?;

    Ok(OpenedTrack {
        format,
        decoder,
        track_id,
        sample_rate,
        channels: codec_params.channels.map(|c| c.count()),
        n_frames: codec_params.n_frames,
    })
}

/// Feed every decoded buffer (interleaved, with its channel count) to `on_buffer`.
fn decode_loop(
    track: &mut OpenedTrack,
    mut on_buffer: impl FnMut(&[f32], usize),
) -> Result<(), AudioError> {
    loop {
        let packet = match track.format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::Decode(format!("packet: {e}"))),
        };

        if packet.track_id() != track.track_id {
            continue;
        }

        let decoded = match track.decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!(error = %e, "Skipping corrupt audio frame");
                continue;
            }
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        if num_frames == 0 {
            continue;
        }

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        on_buffer(sample_buf.samples(), spec.channels.count().max(1));
    }
    Ok(())
}

/// Read duration, sample rate and channel count.
///
/// Uses the container's frame count when present and decodes the stream
/// to count frames otherwise.
pub fn probe(path: &Path) -> Result<AudioProperties, AudioError> {
    let mut track = open_track(path)?;
    let sample_rate = track.sample_rate;

    if let (Some(frames), Some(channels)) = (track.n_frames, track.channels) {
        return Ok(AudioProperties {
            duration_secs: frames as f64 / sample_rate as f64,
            sample_rate,
            channels,
        });
    }

    let mut frames: u64 = 0;
    let mut channels = track.channels.unwrap_or(0);
    decode_loop(&mut track, |samples, ch| {
        channels = ch;
        frames += (samples.len() / ch) as u64;
    })?;

    Ok(AudioProperties {
        duration_secs: frames as f64 / sample_rate as f64,
        sample_rate,
        channels: channels.max(1),
    })
}

/// Decode to mono `f32` PCM at [`TARGET_SAMPLE_RATE`].
pub fn decode_to_mono_16k(path: &Path) -> Result<Vec<f32>, AudioError> {
    let mut track = open_track(path)?;
    let source_rate = track.sample_rate;

    let mut mono: Vec<f32> = Vec::new();
    decode_loop(&mut track, |samples, channels| {
        if channels > 1 {
            for frame in samples.chunks(channels) {
                mono.push(frame.iter().sum::<f32>() / channels as f32);
            }
        } else {
            mono.extend_from_slice(samples);
        }
    })?;

    if mono.is_empty() {
        return Err(AudioError::Empty);
    }

    if source_rate != TARGET_SAMPLE_RATE {
        mono = resample(&mono, source_rate, TARGET_SAMPLE_RATE)?;
    }

    tracing::debug!(
        samples = mono.len(),
        duration_secs = mono.len() as f32 / TARGET_SAMPLE_RATE as f32,
        "Audio decoded to 16kHz mono PCM"
    );

    Ok(mono)
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let chunk_size = 1024;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| AudioError::Resample(format!("init: {e}")))?;

    let mut output = Vec::with_capacity((samples.len() as f64 * ratio) as usize + chunk_size);

    for chunk in samples.chunks(chunk_size) {
        let mut input = chunk.to_vec();
        input.resize(chunk_size, 0.0);

        let result = resampler
            .process(&[input], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;

        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
    }

    output.truncate((samples.len() as f64 * ratio) as usize);
    Ok(output)
}

/// Split PCM into windows of `window_secs` at [`TARGET_SAMPLE_RATE`].
pub fn split_windows(samples: &[f32], window_secs: u32) -> impl Iterator<Item = &[f32]> {
    let window = (window_secs.max(1) as usize) * TARGET_SAMPLE_RATE as usize;
    samples.chunks(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, secs: f32) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let frames = (sample_rate as f32 * secs) as u32;
        for i in 0..frames {
            let v = ((i as f32 * 0.05).sin() * 8000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(v).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_probe_reads_wav_properties() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 16_000, 2, 1.5);

        let props = probe(&path).unwrap();
        assert_eq!(props.sample_rate, 16_000);
        assert_eq!(props.channels, 2);
        assert!((props.duration_secs - 1.5).abs() < 0.01);
    }

    #[test]
    fn test_decode_downmixes_and_keeps_length_at_16k() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 16_000, 2, 1.0);

        let pcm = decode_to_mono_16k(&path).unwrap();
        assert_eq!(pcm.len(), 16_000);
    }

    #[test]
    fn test_decode_resamples_to_16k() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cd.wav");
        write_wav(&path, 44_100, 1, 1.0);

        let pcm = decode_to_mono_16k(&path).unwrap();
        assert!(pcm.len() <= 16_000);
        assert!(pcm.len() > 15_000, "got {} samples", pcm.len());
    }

    #[test]
    fn test_garbage_file_fails_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();
        assert!(probe(&path).is_err());
    }

    #[test]
    fn test_split_windows() {
        let pcm = vec![0.0f32; 16_000 * 65];
        let windows: Vec<_> = split_windows(&pcm, 30).collect();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[2].len(), 16_000 * 5);
    }
}
