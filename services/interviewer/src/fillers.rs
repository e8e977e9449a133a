//! Builds the directory of prerecorded filler clips the playback engine picks
//! from when it needs to cover a gap.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use futures::StreamExt;
use interview_audio::{SynthesisBackend, SynthesisEvent};

const HESITATIONS: &[&str] = &["mmhmm...", "ahhmmm...", "umm...", "uh...", "hmm..."];
const ACKNOWLEDGEMENTS: &[&str] = &["okay...", "right...", "I see...", "alright..."];
const CONTINUATIONS: &[&str] = &["so...", "well..."];
const PAUSE: &str = " . . . ";
const ELONGATED: &[&str] = &[
    "riiiight... ...",
    "ooookay... ...",
    "weeeell... ...",
    "sooo... ...",
    "hmmmmm... ...",
    "uhhhhh... ...",
    "ummmm... ...",
    "ahhhh... ...",
];

/// Files smaller than this cannot hold a usable clip.
const MIN_WAV_BYTES: u64 = 2048;

/// Every filler phrase worth caching: hesitation then acknowledgement,
/// acknowledgement then continuation, and a few drawn-out single words.
pub fn filler_phrases() -> Vec<String> {
    let mut phrases = BTreeSet::new();
    for h in HESITATIONS {
        for a in ACKNOWLEDGEMENTS {
            phrases.insert(format!("{h}{PAUSE}{a}"));
        }
    }
    for a in ACKNOWLEDGEMENTS {
        for c in CONTINUATIONS {
            phrases.insert(format!("{a}{PAUSE}{c}"));
        }
    }
    phrases.extend(ELONGATED.iter().map(|s| s.to_string()));
    phrases.into_iter().collect()
}

/// `"I see... . . . so..."` becomes `"i_see____so.wav"`.
pub fn file_name(phrase: &str) -> String {
    let safe: String = phrase
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .map(|c| if c == ' ' { '_' } else { c.to_ascii_lowercase() })
        .collect();
    format!("{safe}.wav")
}

/// A readable WAV of at least `MIN_WAV_BYTES` holding at least one frame.
pub fn is_valid_wav(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    if metadata.len() < MIN_WAV_BYTES {
        return false;
    }
    hound::WavReader::open(path).is_ok_and(|reader| reader.duration() > 0)
}

/// Writes little-endian PCM16 mono bytes as a 16-bit WAV file.
pub fn write_wav(path: &Path, pcm: &[u8], sample_rate: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for chunk in pcm.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
    }
    writer.finalize()?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct CacheReport {
    pub created: Vec<PathBuf>,
    pub skipped: usize,
    pub failed: usize,
}

async fn synthesize_all(backend: &dyn SynthesisBackend, text: &str) -> anyhow::Result<Vec<u8>> {
    let mut stream = backend.synthesize(text.to_string()).await?;
    let mut pcm = Vec::new();
    while let Some(event) = stream.next().await {
        match event? {
            SynthesisEvent::Audio(chunk) => pcm.extend_from_slice(&chunk),
            SynthesisEvent::Flushed | SynthesisEvent::Closed => break,
        }
    }
    Ok(pcm)
}

async fn cache_one(
    backend: &dyn SynthesisBackend,
    phrase: &str,
    path: &Path,
    sample_rate: u32,
) -> anyhow::Result<bool> {
    let pcm = synthesize_all(backend, phrase).await?;
    let temp = path.with_extension("wav.tmp");
    write_wav(&temp, &pcm, sample_rate)?;

    if is_valid_wav(&temp) {
        fs::rename(&temp, path)
            .with_context(|| format!("Failed to move clip into {}", path.display()))?;
        Ok(true)
    } else {
        fs::remove_file(&temp).ok();
        Ok(false)
    }
}

/// Synthesizes every filler phrase into `dir`, leaving valid clips that are
/// already there untouched.
///
/// `pause` is slept between requests so the backend does not rate limit us.
pub async fn cache_fillers(
    backend: &dyn SynthesisBackend,
    dir: &Path,
    sample_rate: u32,
    pause: Duration,
) -> anyhow::Result<CacheReport> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;

    let mut report = CacheReport::default();
    let mut requested = false;
    for phrase in filler_phrases() {
        let path = dir.join(file_name(&phrase));
        if is_valid_wav(&path) {
            tracing::info!("Audio for {:?} already exists. Skipping.", phrase);
            report.skipped += 1;
            continue;
        }

        if requested {
            tokio::time::sleep(pause).await;
        }
        requested = true;

        tracing::info!("Generating audio for {:?} -> {}", phrase, path.display());
        match cache_one(backend, &phrase, &path, sample_rate).await {
            Ok(true) => {
                tracing::info!("Saved and verified {}", path.display());
                report.created.push(path);
            }
            Ok(false) => {
                tracing::error!("Generated audio for {:?} is invalid, discarded", phrase);
                report.failed += 1;
            }
            Err(e) => {
                tracing::error!("Failed to generate audio for {:?}: {:#}", phrase, e);
                fs::remove_file(path.with_extension("wav.tmp")).ok();
                report.failed += 1;
            }
        }
    }
    Ok(report)
}
