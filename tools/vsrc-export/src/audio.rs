//! Audio conversion (WAV -> 16-bit PCM WAV)

use std::io::Cursor;

use vsrc_common::{AudioCodec, PcmSound};

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    #[error("WAV has no channels")]
    NoChannels,
}

/// Decodes RIFF WAV files of any integer or float sample format
#[derive(Debug, Clone, Copy, Default)]
pub struct WavCodec;

impl AudioCodec for WavCodec {
    type Error = AudioError;

    fn decode(&self, bytes: &[u8]) -> Result<PcmSound, AudioError> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(AudioError::NoChannels);
        }

        let samples: Vec<i16> = match spec.sample_format {
            hound::SampleFormat::Int => match spec.bits_per_sample {
                16 => reader.samples::<i16>().collect::<Result<_, _>>()?,
                8 => reader
                    .samples::<i8>()
                    .map(|s| s.map(|s| i16::from(s) << 8))
                    .collect::<Result<_, _>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|s| s.map(|s| (s >> (spec.bits_per_sample - 16)) as i16))
                    .collect::<Result<_, _>>()?,
                bits => return Err(AudioError::UnsupportedBitDepth(bits)),
            },
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map(|s| (s.clamp(-1.0, 1.0) * 32767.0) as i16))
                .collect::<Result<_, _>>()?,
        };

        Ok(PcmSound {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

/// Encode PCM as a 16-bit integer WAV
pub fn encode_wav(sound: &PcmSound) -> Result<Vec<u8>, AudioError> {
    let spec = hound::WavSpec {
        channels: sound.channels,
        sample_rate: sound.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut out = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut out, spec)?;
        for &s in &sound.samples {
            writer.write_sample(s)?;
        }
        writer.finalize()?;
    }
    Ok(out.into_inner())
}
