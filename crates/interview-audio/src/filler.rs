use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::IndexedRandom;

use crate::error::AudioError;

/// Prerecorded filler clips discovered in a directory.
#[derive(Debug, Clone, Default)]
pub struct FillerLibrary {
    clips: Vec<PathBuf>,
}

impl FillerLibrary {
    /// Collects every `.wav` file directly inside `dir`.
    ///
    /// A missing or unreadable directory yields an empty library: fillers then
    /// degrade to synthetic silence.
    pub fn scan(dir: &Path) -> Self {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Filler directory {} unavailable: {}", dir.display(), e);
                return Self::default();
            }
        };

        let mut clips: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|s| s.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
            })
            .collect();
        clips.sort();

        if clips.is_empty() {
            tracing::warn!("No filler clips found in {}", dir.display());
        } else {
            tracing::info!("Loaded {} filler clips from {}", clips.len(), dir.display());
        }
        Self { clips }
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn choose(&self) -> Option<&Path> {
        self.clips.choose(&mut rand::rng()).map(PathBuf::as_path)
    }
}

/// A decoded clip, downmixed to mono.
#[derive(Debug, Clone)]
pub struct Clip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl Clip {
    pub fn load(path: &Path) -> Result<Self, AudioError> {
        let clip_err = |source| AudioError::Clip {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = hound::WavReader::open(path).map_err(clip_err)?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(clip_err(hound::Error::Unsupported));
        }

        let interleaved = reader
            .samples::<i16>()
            .collect::<Result<Vec<i16>, _>>()
            .map_err(clip_err)?;

        let channels = spec.channels.max(1) as usize;
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    (sum / frame.len() as i32) as i16
                })
                .collect()
        };

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
        })
    }

    /// Splits the clip into PCM16 little-endian byte chunks of `frames` samples.
    pub fn chunks(&self, frames: usize) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.samples
            .chunks(frames.max(1))
            .map(|chunk| chunk.iter().flat_map(|s| s.to_le_bytes()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_wav(path: &Path, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 24_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn scan_only_picks_wav_files() {
        let dir = tempdir().unwrap();
        write_wav(&dir.path().join("um.wav"), 1, &[1, 2, 3]);
        write_wav(&dir.path().join("hmm.WAV"), 1, &[1]);
        File::create(dir.path().join("notes.txt"))
            .unwrap()
            .write_all(b"not audio")
            .unwrap();
        fs::create_dir(dir.path().join("nested.wav")).unwrap();

        let library = FillerLibrary::scan(dir.path());

        assert_eq!(library.len(), 2);
        let chosen = library.choose().unwrap();
        assert!(chosen.ends_with("um.wav") || chosen.ends_with("hmm.WAV"));
    }

    #[test]
    fn missing_directory_gives_empty_library() {
        let library = FillerLibrary::scan(Path::new("does/not/exist/fillers"));
        assert!(library.is_empty());
        assert!(library.choose().is_none());
    }

    #[test]
    fn stereo_clips_are_downmixed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, &[100, 300, -50, -150]);

        let clip = Clip::load(&path).unwrap();

        assert_eq!(clip.samples, vec![200, -100]);
        assert_eq!(clip.sample_rate, 24_000);
    }

    #[test]
    fn chunks_cover_every_sample() {
        let clip = Clip {
            samples: vec![1, 2, 3, 4, 5],
            sample_rate: 24_000,
        };
        let chunks: Vec<Vec<u8>> = clip.chunks(2).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], 5i16.to_le_bytes().to_vec());
    }

    #[test]
    fn loading_garbage_reports_the_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        File::create(&path).unwrap().write_all(b"RIFFnope").unwrap();

        let err = Clip::load(&path).unwrap_err();
        assert!(matches!(err, AudioError::Clip { path: p, .. } if p == path));
    }
}
