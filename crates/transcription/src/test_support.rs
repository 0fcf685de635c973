//! Fakes shared by the unit tests in this crate.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::engine::{DecodeOptions, EngineError, LoadRequest, SpeechEngine, SpeechModel};

/// Engine whose models label each non-silent window with its sequence number.
#[derive(Default)]
pub struct CountingEngine {
    pub loads: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
    pub seen_options: Arc<std::sync::Mutex<Vec<DecodeOptions>>>,
    pub fail_on_call: Option<usize>,
}

impl SpeechEngine for CountingEngine {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn load(&self, _request: &LoadRequest) -> Result<Box<dyn SpeechModel>, EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingModel {
            calls: Arc::clone(&self.calls),
            seen_options: Arc::clone(&self.seen_options),
            fail_on_call: self.fail_on_call,
        }))
    }
}

struct CountingModel {
    calls: Arc<AtomicUsize>,
    seen_options: Arc<std::sync::Mutex<Vec<DecodeOptions>>>,
    fail_on_call: Option<usize>,
}

impl SpeechModel for CountingModel {
    fn transcribe_pcm(&mut self, samples: &[f32], options: &DecodeOptions) -> Result<String, EngineError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_options.lock().unwrap().push(options.clone());
        if self.fail_on_call == Some(n) {
            return Err(EngineError::Inference("synthetic failure".to_string()));
        }
        if samples.iter().all(|s| *s == 0.0) {
            return Ok("   ".to_string());
        }
        Ok(format!(" part{n} "))
    }
}

/// 16 kHz mono WAV built from `(seconds, audible)` segments.
pub fn write_wav(path: &Path, segments: &[(f32, bool)]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &(secs, audible) in segments {
        for i in 0..(secs * 16_000.0) as u32 {
            let v = if audible { ((i % 40) as i16 - 20) * 500 } else { 0 };
            writer.write_sample(v).unwrap();
        }
    }
    writer.finalize().unwrap();
}
