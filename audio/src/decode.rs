//! Mono audio loading.
//!
//! Decodes any container/codec pair symphonia supports, downmixes every frame
//! to one channel by averaging, then resamples to the requested rate.
//! Each call builds its own demuxer, decoder and resampler, so a
//! [`MonoLoader`] can be shared freely between threads.

use std::fs::File;
use std::io;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AudioError;
use crate::resampler::{ResampleQuality, resample};

/// Symphonia error text when no format reader matches the stream.
const NO_FORMAT_READER: &str = "no suitable format reader";

/// Default output sample rate, the rate the embedding models are trained at.
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// Decoded mono audio at the file's native sample rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Loads audio files as a mono waveform at a fixed sample rate.
#[derive(Debug, Clone, Copy)]
pub struct MonoLoader {
    sample_rate: u32,
    quality: ResampleQuality,
}

impl Default for MonoLoader {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            quality: ResampleQuality::Linear,
        }
    }
}

impl MonoLoader {
    pub fn new(sample_rate: u32, quality: ResampleQuality) -> Self {
        Self {
            sample_rate,
            quality,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn quality(&self) -> ResampleQuality {
        self.quality
    }

    /// Decodes `path` and returns mono samples at the loader's sample rate.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Vec<f32>, AudioError> {
        let decoded = decode_mono(path.as_ref())?;
        tracing::debug!(
            samples = decoded.samples.len(),
            src_rate = decoded.sample_rate,
            dst_rate = self.sample_rate,
            "decoded audio"
        );
        resample(
            &decoded.samples,
            decoded.sample_rate,
            self.sample_rate,
            self.quality,
        )
    }
}

/// Decodes the first audio track of `path` into mono samples.
pub fn decode_mono(path: &Path) -> Result<DecodedAudio, AudioError> {
    let name = path.display().to_string();

    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => AudioError::FileNotFound(name.clone()),
        _ => AudioError::Open {
            path: name.clone(),
            source: e,
        },
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
        .map_err(|e| format_error(&name, e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::NoStreamInfo(format!("{name}: no audio track")))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .filter(|&rate| rate > 0)
        .ok_or_else(|| AudioError::InvalidSampleRate(name.clone()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| match e {
            SymphoniaError::Unsupported(what) => {
                AudioError::UnsupportedCodec(format!("{name}: {what}"))
            }
            other => AudioError::Decode(format!("{name}: {other}")),
        })?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::Decode(format!("{name}: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count().max(1);
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                downmix_into(buf.samples(), channels, &mut samples);
            }
            // A corrupt packet is skipped, the rest of the stream is still usable.
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!(path = %name, error = e, "skipping undecodable packet");
            }
            Err(e) => return Err(AudioError::Decode(format!("{name}: {e}"))),
        }
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Symphonia reports both "no reader recognised the stream" and "the reader
/// recognised the container but not its codec" as `Unsupported`.
fn format_error(name: &str, e: SymphoniaError) -> AudioError {
    match e {
        SymphoniaError::Unsupported(what) if !what.contains(NO_FORMAT_READER) => {
            AudioError::UnsupportedCodec(format!("{name}: {what}"))
        }
        other => AudioError::NoStreamInfo(format!("{name}: {other}")),
    }
}

/// Averages interleaved frames of `channels` samples into `out`.
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use std::io::Write;

    fn write_wav(path: &Path, rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let v = (2.0 * PI * 440.0 * i as f32 / rate as f32).sin() * 0.5;
            for _ in 0..channels {
                w.write_sample((v * i16::MAX as f32) as i16).unwrap();
            }
        }
        w.finalize().unwrap();
    }

    /// Ogg CRC-32: polynomial 0x04c11db7, no reflection, zero init.
    fn ogg_crc(data: &[u8]) -> u32 {
        let mut crc = 0u32;
        for &b in data {
            crc ^= (b as u32) << 24;
            for _ in 0..8 {
                crc = if crc & 0x8000_0000 != 0 {
                    (crc << 1) ^ 0x04c1_1db7
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    fn ogg_page(header_type: u8, granule: u64, seq: u32, packet: &[u8]) -> Vec<u8> {
        let mut page = Vec::new();
        page.extend_from_slice(b"OggS");
        page.push(0);
        page.push(header_type);
        page.extend_from_slice(&granule.to_le_bytes());
        page.extend_from_slice(&0x1234_5678u32.to_le_bytes());
        page.extend_from_slice(&seq.to_le_bytes());
        page.extend_from_slice(&[0; 4]);
        let mut lacing = vec![255u8; packet.len() / 255];
        lacing.push((packet.len() % 255) as u8);
        page.push(lacing.len() as u8);
        page.extend_from_slice(&lacing);
        page.extend_from_slice(packet);
        let crc = ogg_crc(&page);
        page[22..26].copy_from_slice(&crc.to_le_bytes());
        page
    }

    /// Ogg Opus stream: OpusHead, OpusTags and one 20 ms packet.
    fn write_ogg_opus(path: &Path) {
        let mut head = b"OpusHead".to_vec();
        head.extend_from_slice(&[1, 1]);
        head.extend_from_slice(&312u16.to_le_bytes());
        head.extend_from_slice(&48000u32.to_le_bytes());
        head.extend_from_slice(&0i16.to_le_bytes());
        head.push(0);

        let mut tags = b"OpusTags".to_vec();
        tags.extend_from_slice(&5u32.to_le_bytes());
        tags.extend_from_slice(b"coral");
        tags.extend_from_slice(&0u32.to_le_bytes());

        let mut bytes = ogg_page(0x02, 0, 0, &head);
        bytes.extend(ogg_page(0x00, 0, 1, &tags));
        bytes.extend(ogg_page(0x04, 960, 2, &[0xf8, 0xff, 0xfe]));
        std::fs::write(path, bytes).unwrap();
    }

    /// RIFF/WAVE header with format tag 0x55 (MPEG layer 3).
    fn write_mp3_in_wav(path: &Path) {
        let data = [0u8; 64];
        let mut b = Vec::new();
        b.extend_from_slice(b"RIFF");
        b.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
        b.extend_from_slice(b"WAVE");
        b.extend_from_slice(b"fmt ");
        b.extend_from_slice(&16u32.to_le_bytes());
        b.extend_from_slice(&0x55u16.to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes());
        b.extend_from_slice(&16000u32.to_le_bytes());
        b.extend_from_slice(&2000u32.to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes());
        b.extend_from_slice(&0u16.to_le_bytes());
        b.extend_from_slice(b"data");
        b.extend_from_slice(&(data.len() as u32).to_le_bytes());
        b.extend_from_slice(&data);
        std::fs::write(path, b).unwrap();
    }

    #[test]
    fn unsupported_codec_in_ogg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.opus");
        write_ogg_opus(&path);

        let err = decode_mono(&path).unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedCodec(_)), "got {err:?}");
        assert!(err.to_string().starts_with("Unsupported codec!"));
    }

    #[test]
    fn unsupported_wave_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mp3_in_wav.wav");
        write_mp3_in_wav(&path);

        let err = decode_mono(&path).unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedCodec(_)), "got {err:?}");
    }

    #[test]
    fn missing_file() {
        let err = decode_mono(Path::new("/nonexistent/missing.wav")).unwrap_err();
        assert!(matches!(err, AudioError::FileNotFound(_)));
        assert!(err.to_string().contains("No such file or directory"));
    }

    #[test]
    fn not_audio() {
        let mut f = tempfile::Builder::new().suffix(".mp3").tempfile().unwrap();
        f.write_all(b"this is definitely not an audio file, just some text")
            .unwrap();
        let err = decode_mono(f.path()).unwrap_err();
        assert!(matches!(err, AudioError::NoStreamInfo(_)), "got {err:?}");
        assert!(err.to_string().contains("Could not find stream information"));
    }

    #[test]
    fn empty_file() {
        let f = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        let err = decode_mono(f.path()).unwrap_err();
        assert!(matches!(err, AudioError::NoStreamInfo(_)), "got {err:?}");
    }

    #[test]
    fn decode_stereo_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 44100, 2, 4410);

        let audio = decode_mono(&path).unwrap();
        assert_eq!(audio.sample_rate, 44100);
        assert_eq!(audio.samples.len(), 4410);
        let peak = audio.samples.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        assert!((peak - 0.5).abs() < 0.01, "peak = {peak}");
    }

    #[test]
    fn load_resamples_to_16k() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.wav");
        write_wav(&path, 44100, 2, 44100);

        let loader = MonoLoader::default();
        assert_eq!(loader.sample_rate(), DEFAULT_SAMPLE_RATE);
        assert_eq!(loader.load(&path).unwrap().len(), 16000);

        let loader = MonoLoader::new(8000, ResampleQuality::SincFastest);
        assert_eq!(loader.sample_rate(), 8000);
        assert_eq!(loader.load(&path).unwrap().len(), 8000);
    }

    #[test]
    fn load_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.wav");
        write_wav(&path, 22050, 1, 22050);

        let loader = MonoLoader::default();
        assert_eq!(loader.load(&path).unwrap(), loader.load(&path).unwrap());
    }

    #[test]
    fn downmix_averages_channels() {
        let mut out = Vec::new();
        downmix_into(&[0.5, -0.5, 1.0, 0.0], 2, &mut out);
        assert_eq!(out, vec![0.0, 0.5]);

        let mut mono = Vec::new();
        downmix_into(&[0.1, 0.2], 1, &mut mono);
        assert_eq!(mono, vec![0.1, 0.2]);
    }
}
