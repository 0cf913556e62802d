//! WAV file I/O utilities.

use std::io;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use launcher_core::{AudioData, LauncherError, LauncherResult};

fn wav_error(e: hound::Error) -> LauncherError {
    match e {
        hound::Error::IoError(io) => LauncherError::Io(io),
        other => LauncherError::Io(io::Error::other(other.to_string())),
    }
}

/// Write mono audio to a 32-bit float WAV file.
///
/// Float samples keep cached audio bit-exact across a write/read cycle.
pub fn write_wav(path: impl AsRef<Path>, audio: &AudioData) -> LauncherResult<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec).map_err(wav_error)?;

    for &sample in &audio.samples {
        writer.write_sample(sample).map_err(wav_error)?;
    }

    writer.finalize().map_err(wav_error)?;

    Ok(())
}

/// Read a WAV file into mono f32 samples.
///
/// Integer PCM is scaled to [-1, 1]; multi-channel files are averaged down to
/// one channel.
pub fn read_wav(path: impl AsRef<Path>) -> LauncherResult<AudioData> {
    let mut reader = hound::WavReader::open(path.as_ref()).map_err(wav_error)?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .map_err(wav_error)?
        }
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(wav_error)?,
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(AudioData::new(samples, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_wav_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let audio = AudioData::new(vec![0.0, 0.123_456_7, -0.999, 1.0], 24000);

        write_wav(&path, &audio).unwrap();
        let back = read_wav(&path).unwrap();

        assert_eq!(back, audio);
    }

    #[test]
    fn test_read_int16_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for sample in [16384i16, 0, -16384, -16384] {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();

        let audio = read_wav(&path).unwrap();
        assert_eq!(audio.sample_rate, 22050);
        assert_eq!(audio.samples, vec![0.25, -0.5]);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_wav("/nonexistent/clip.wav").unwrap_err();
        assert!(matches!(err, LauncherError::Io(_)));
    }
}
