//! Audio container decode/encode behind the [`AudioCodec`] trait.

use std::{
    fmt,
    fs::File,
    io::BufWriter,
    path::Path,
    str::FromStr,
};

use hound::{SampleFormat, WavSpec};
use serde::{Deserialize, Serialize};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{error::CodecError, waveform::Waveform};

/// Input extensions picked up by a directory scan.
pub const INPUT_EXTENSIONS: [&str; 3] = ["mp3", "wav", "flac"];

/// Container and sample encoding for written files. Only WAV is written;
/// compressed formats such as mp3 are decode-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 16-bit PCM WAV.
    Wav,
    /// 32-bit float WAV.
    Wav32,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav | Self::Wav32 => "wav",
        }
    }

    fn wav_spec(&self, sample_rate: u32) -> WavSpec {
        let (bits_per_sample, sample_format) = match self {
            Self::Wav => (16, SampleFormat::Int),
            Self::Wav32 => (32, SampleFormat::Float),
        };
        WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Ok(Self::Wav),
            "wav32" => Ok(Self::Wav32),
            other => Err(CodecError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wav => write!(f, "wav"),
            Self::Wav32 => write!(f, "wav32"),
        }
    }
}

/// Reads and writes audio files. The pipeline only sees waveforms.
pub trait AudioCodec {
    /// Decodes the first audio track into a mono waveform at its own rate.
    fn decode(&self, path: &Path) -> Result<Waveform, CodecError>;

    /// Writes `waveform` to `path`. Nothing appears at `path` unless the
    /// whole file was written.
    fn encode(&self, waveform: &Waveform, path: &Path, format: OutputFormat) -> Result<(), CodecError>;
}

/// Decodes with symphonia, encodes WAV with hound.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCodec;

impl AudioCodec for FileCodec {
    fn decode(&self, path: &Path) -> Result<Waveform, CodecError> {
        let file = File::open(path).map_err(CodecError::Open)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let (track_id, codec_params) = {
            let track = format
                .tracks()
                .iter()
                .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
                .ok_or(CodecError::NoTrack)?;
            (track.id, track.codec_params.clone())
        };
        let sample_rate = codec_params
            .sample_rate
            .ok_or(CodecError::UnknownSampleRate)?;

        let mut decoder =
            symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

        let mut sample_buf: Option<SampleBuffer<f32>> = None;
        let mut mono = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(err) => return Err(err.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // Corrupt frames are skipped, as players do.
                Err(SymphoniaError::DecodeError(msg)) => {
                    debug!(path = %path.display(), msg, "Skipping undecodable packet");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();

            if sample_buf
                .as_ref()
                .map_or(true, |b| b.capacity() < decoded.capacity())
            {
                sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            let frame = Waveform::from_interleaved(buf.samples(), channels, sample_rate);
            mono.extend_from_slice(frame.samples());
        }

        if mono.is_empty() {
            return Err(CodecError::Empty);
        }

        debug!(
            path = %path.display(),
            sample_rate,
            samples = mono.len(),
            "Decoded audio"
        );
        Ok(Waveform::new(mono, sample_rate))
    }

    fn encode(&self, waveform: &Waveform, path: &Path, format: OutputFormat) -> Result<(), CodecError> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;

        {
            let spec = format.wav_spec(waveform.sample_rate());
            let mut writer = hound::WavWriter::new(BufWriter::new(temp.as_file_mut()), spec)?;
            match format {
                OutputFormat::Wav => {
                    for &x in waveform.samples() {
                        let sample = (x * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32);
                        writer.write_sample(sample as i16)?;
                    }
                }
                OutputFormat::Wav32 => {
                    for &x in waveform.samples() {
                        writer.write_sample(x)?;
                    }
                }
            }
            writer.finalize()?;
        }

        temp.persist(path)?;
        debug!(path = %path.display(), %format, samples = waveform.len(), "Encoded audio");
        Ok(())
    }
}
