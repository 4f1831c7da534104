//! Sample rate and channel conversion
//!
//! Engines disagree on output format (Pico is fixed at 16 kHz, Piper follows
//! the voice model), so every segment is brought to the job's declared rate
//! and channel count before concatenation.

use super::AudioSegment;
use dasp::interpolate::linear::Linear;
use dasp::{signal, Signal};
use log::debug;

/// Convert a segment to the given rate and channel count
///
/// The output length is `round(frames * to / from)`, so a segment keeps its
/// duration up to one frame of rounding.
pub fn conform(segment: &AudioSegment, sample_rate: u32, channels: u16) -> AudioSegment {
    let rechanneled = rechannel(&segment.samples, segment.channels, channels);
    if segment.sample_rate == sample_rate {
        return AudioSegment::new(rechanneled, sample_rate, channels);
    }

    debug!(
        "Resampling segment {} Hz -> {} Hz ({} ch)",
        segment.sample_rate, sample_rate, channels
    );
    let samples = resample(&rechanneled, channels, segment.sample_rate, sample_rate);
    AudioSegment::new(samples, sample_rate, channels)
}

/// Change the channel count of interleaved samples
///
/// Mono is duplicated into every output channel; anything else is first
/// averaged down to mono.
pub fn rechannel(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let mono: Vec<f32> = if from == 1 {
        samples.to_vec()
    } else {
        samples
            .chunks(from as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    if to == 1 {
        return mono;
    }

    mono.iter()
        .flat_map(|&s| std::iter::repeat(s).take(to as usize))
        .collect()
}

/// Linear-interpolation resampling of interleaved samples
pub fn resample(samples: &[f32], channels: u16, from: u32, to: u32) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if from == to || from == 0 || to == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let frames = samples.len() / channels;
    let out_frames = (frames as f64 * to as f64 / from as f64).round() as usize;

    let resampled: Vec<Vec<f32>> = (0..channels)
        .map(|ch| {
            let channel: Vec<f32> = samples.iter().skip(ch).step_by(channels).copied().collect();
            resample_channel(&channel, from, to, out_frames)
        })
        .collect();

    let mut out = Vec::with_capacity(out_frames * channels);
    for frame in 0..out_frames {
        for channel in &resampled {
            out.push(channel[frame]);
        }
    }
    out
}

fn resample_channel(input: &[f32], from: u32, to: u32, out_frames: usize) -> Vec<f32> {
    let mut source = signal::from_iter(input.iter().copied());
    let first = source.next();
    let second = source.next();
    let interpolator = Linear::new(first, second);

    source
        .from_hz_to_hz(interpolator, from as f64, to as f64)
        .take(out_frames)
        .collect()
}
