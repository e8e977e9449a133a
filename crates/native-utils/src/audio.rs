use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Creates a new ring buffer on the heap for shared audio data.
pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size)
}

/// Interprets little-endian PCM16 bytes as samples normalized to [-1.0, 1.0].
/// A trailing odd byte is ignored.
pub fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| {
            let v = i16::from_le_bytes([chunk[0], chunk[1]]);
            (v as f32 / 32768.0).clamp(-1.0, 1.0)
        })
        .collect()
}

/// Averages interleaved frames down to one channel.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// A trait for converting audio sample types to a binary representation (Vec<u8>).
pub trait ToBinary {
    fn to_binary(&self) -> Vec<u8>;
}

impl ToBinary for [i16] {
    fn to_binary(&self) -> Vec<u8> {
        self.iter().flat_map(|&sample| sample.to_le_bytes()).collect()
    }
}

impl ToBinary for [f32] {
    fn to_binary(&self) -> Vec<u8> {
        self.iter()
            .flat_map(|&sample| {
                let v = (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                v.to_le_bytes()
            })
            .collect()
    }
}

/// Resamples a continuous mono stream that arrives in arbitrary-sized pieces.
///
/// The resampler needs fixed-size input chunks, so samples that do not fill
/// a whole chunk are carried over to the next call instead of being padded.
pub struct StreamResampler {
    resampler: Option<FastFixedIn<f32>>,
    pending: Vec<f32>,
}

impl StreamResampler {
    /// Equal rates give a pass-through resampler.
    pub fn new(in_rate: u32, out_rate: u32, chunk_size: usize) -> anyhow::Result<Self> {
        let resampler = if in_rate == out_rate {
            None
        } else {
            Some(create_resampler(in_rate as f64, out_rate as f64, chunk_size)?)
        };
        Ok(Self {
            resampler,
            pending: Vec::with_capacity(chunk_size * 2),
        })
    }

    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            return samples.to_vec();
        };
        self.pending.extend_from_slice(samples);

        let mut out = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let chunk: Vec<f32> = self.pending.drain(..needed).collect();
            match resampler.process(&[chunk.as_slice()], None) {
                Ok(resampled) => {
                    if let Some(channel) = resampled.first() {
                        out.extend_from_slice(channel);
                    }
                }
                Err(e) => tracing::warn!("Failed to resample audio chunk: {}", e),
            }
        }
        out
    }

    /// Resamples whatever is still carried over.
    pub fn flush(&mut self) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Vec::new();
        };
        if self.pending.is_empty() {
            return Vec::new();
        }
        let chunk = std::mem::take(&mut self.pending);
        match resampler.process_partial(Some(&[chunk.as_slice()]), None) {
            Ok(resampled) => resampled.into_iter().next().unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Failed to resample final audio chunk: {}", e);
                Vec::new()
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
