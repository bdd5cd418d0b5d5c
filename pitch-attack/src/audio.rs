use std::path::{Path, PathBuf};

use anyhow::Context;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::utils::float_filename;

pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Location of a clip inside the audio directory: `<dir>/<clip>/<clip>.wav`.
pub fn clip_path(audio_dir: &Path, clip: &str) -> PathBuf {
    audio_dir.join(clip).join(format!("{clip}.wav"))
}

/// Location of a diagnostic copy of a clip shifted by `shift` semitones.
pub fn shifted_clip_path(audio_dir: &Path, clip: &str, shift: f64) -> PathBuf {
    audio_dir.join(clip).join(format!("{clip}{}.wav", float_filename(shift)))
}

/// Decodes the first audio track of a file and mixes it down to mono.
pub fn decode_audio(path: &Path) -> anyhow::Result<AudioData> {
    let src = std::fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .context("unsupported format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("no supported audio tracks")?;

    let dec_opts: DecoderOptions = Default::default();

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .context("unsupported codec")?;

    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.context("missing sample rate")?;
    let channels = track.codec_params.channels.context("missing audio channels")?.count();

    let mut samples = Vec::new();
    let mut sample_buf = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).context("failed to read packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                if sample_buf.is_none() {
                    let spec = *audio_buf.spec();
                    let duration = audio_buf.capacity() as u64;
                    sample_buf = Some(SampleBuffer::<f32>::new(duration, spec));
                }

                if let Some(buf) = &mut sample_buf {
                    buf.copy_interleaved_ref(audio_buf);
                    for frame in buf.samples().chunks_exact(channels) {
                        samples.push(frame.iter().sum::<f32>() / channels as f32);
                    }
                }
            }
            Err(Error::DecodeError(_)) => (),
            Err(e) => return Err(e).context("failed to decode packet"),
        }
    }

    log::info!(
        "decoded {}: {} samples, {} Hz, {:.1}s",
        path.display(),
        samples.len(),
        sample_rate,
        samples.len() as f32 / sample_rate as f32
    );

    Ok(AudioData { samples, sample_rate })
}

/// Writes a mono signal as 16-bit PCM.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).with_context(|| format!("failed to create {}", path.display()))?;
    for sample in samples {
        let value = (sample * f32::from(i16::MAX)).clamp(f32::from(i16::MIN), f32::from(i16::MAX));
        writer.write_sample(value as i16).context("failed to write sample")?;
    }
    writer.finalize().context("failed to finalize wav file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crate::audio::{clip_path, decode_audio, shifted_clip_path, write_wav};

    #[test]
    fn paths() {
        let dir = Path::new("audio_files");
        assert_eq!(Path::new("audio_files/brahms/brahms.wav"), clip_path(dir, "brahms"));
        assert_eq!(Path::new("audio_files/brahms/brahms-1-25.wav"), shifted_clip_path(dir, "brahms", -1.25));
    }

    #[test]
    fn wav_round_trip() {
        let dir = std::env::temp_dir().join(format!("pitch-attack-audio-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tone.wav");

        let samples: Vec<f32> = (0..8000).map(|i| 0.5 * (i as f32 * 0.05).sin()).collect();
        write_wav(&path, &samples, 8000).unwrap();

        let audio = decode_audio(&path).unwrap();
        assert_eq!(8000, audio.sample_rate);
        assert_eq!(samples.len(), audio.samples.len());
        for (a, b) in samples.iter().zip(&audio.samples) {
            assert!((a - b).abs() < 0.001);
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file() {
        assert!(decode_audio(Path::new("does/not/exist.wav")).is_err());
    }
}
