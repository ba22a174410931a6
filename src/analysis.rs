use num_complex::Complex32;
use realfft::RealFftPlanner;

use crate::audio::AudioData;
use crate::LoopPoints;

const SILENCE_THRESHOLD: f32 = 0.0005; // Very quiet
const BANDS: usize = 24;
const MIN_BAND_HZ: f32 = 60.0;
const CONTEXT_FRAMES: usize = 8; // Frames compared on each side of a loop point
const BRUTE_FORCE_STRIDE: usize = 2;
const PEAK_RADIUS: usize = 3;
const MEAN_RADIUS: usize = 8;
const ONSET_DELTA: f32 = 0.1; // Fraction of the strongest flux peak

#[derive(Clone, Debug)]
pub struct LoopSearch {
    pub min_duration_multiplier: f64,
    pub brute_force: bool,
    pub max_candidates: usize,
}

impl Default for LoopSearch {
    fn default() -> Self {
        Self {
            min_duration_multiplier: 0.35,
            brute_force: false,
            max_candidates: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FadeOutInfo {
    pub start_frame: usize, // Frame where the fade effectively begins
    pub duration_frames: usize,
}

#[derive(Clone, Debug)]
pub struct FadeOutSettings {
    pub window_ms: u32,           // RMS window
    pub min_duration_ms: u32,     // Shorter tails are not fades
    pub body_ratio: f32,          // Fade starts after the last window this loud, relative to the median
    pub tail_ratio: f32,          // Track must end at most this loud, relative to the median
}

impl Default for FadeOutSettings {
    fn default() -> Self {
        Self {
            window_ms: 100,
            min_duration_ms: 1000,
            body_ratio: 0.9,
            tail_ratio: 0.25,
        }
    }
}

/// Per-frame spectral description of a mono signal.
pub struct Features {
    pub hop: usize,
    /// Log band energies, mean-centered per band and unit-normalized per frame.
    pub frames: Vec<Vec<f32>>,
    /// Positive spectral flux; `flux[t]` is the energy rise from frame `t - 1` to `t`.
    pub flux: Vec<f32>,
}

#[derive(Clone, Debug, Default)]
pub struct AnalysisResult {
    pub candidates: Vec<LoopPoints>, // Best first
    pub fade_out: Option<FadeOutInfo>,
    pub onset_count: usize,
    pub content_end: usize, // Mono frames before trailing silence
}

pub fn content_end(mono: &[f32]) -> usize {
    mono.iter()
        .rposition(|s| s.abs() > SILENCE_THRESHOLD)
        .map_or(0, |i| i + 1)
}

pub fn frame_features(mono: &[f32], sample_rate: u32) -> Features {
    let frame_size = (sample_rate as usize / 25).next_power_of_two().max(256);
    let hop = frame_size / 4;

    if mono.len() < frame_size {
        return Features {
            hop,
            frames: Vec::new(),
            flux: Vec::new(),
        };
    }

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(frame_size);
    let mut input = fft.make_input_vec();
    let mut spectrum: Vec<Complex32> = fft.make_output_vec();

    let window: Vec<f32> = (0..frame_size)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / frame_size as f32).cos())
        .collect();
    let edges = band_edges(frame_size, sample_rate);

    let count = (mono.len() - frame_size) / hop + 1;
    let mut energies: Vec<Vec<f32>> = Vec::with_capacity(count);
    for i in 0..count {
        let start = i * hop;
        for ((dst, s), w) in input.iter_mut().zip(&mono[start..start + frame_size]).zip(&window) {
            *dst = s * w;
        }
        // Buffer lengths come from the plan itself, so this cannot fail.
        if fft.process(&mut input, &mut spectrum).is_err() {
            break;
        }
        energies.push(
            edges
                .windows(2)
                .map(|band| {
                    let e: f32 = spectrum[band[0]..band[1]].iter().map(|c| c.norm_sqr()).sum();
                    e.ln_1p()
                })
                .collect(),
        );
    }

    let mut flux = vec![0.0; energies.len()];
    for t in 1..energies.len() {
        flux[t] = energies[t]
            .iter()
            .zip(&energies[t - 1])
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();
    }

    let bands = edges.len().saturating_sub(1);
    let mut means = vec![0.0f32; bands];
    for frame in &energies {
        for (m, e) in means.iter_mut().zip(frame) {
            *m += e / energies.len() as f32;
        }
    }
    let frames = energies
        .into_iter()
        .map(|mut frame| {
            for (e, m) in frame.iter_mut().zip(&means) {
                *e -= m;
            }
            let norm = frame.iter().map(|e| e * e).sum::<f32>().sqrt();
            if norm > 1e-9 {
                frame.iter_mut().for_each(|e| *e /= norm);
            }
            frame
        })
        .collect();

    Features { hop, frames, flux }
}

// Log-spaced FFT bin boundaries, strictly increasing.
fn band_edges(frame_size: usize, sample_rate: u32) -> Vec<usize> {
    let bins = frame_size / 2 + 1;
    let nyquist = sample_rate as f32 / 2.0;
    let bin_of = |hz: f32| (hz * frame_size as f32 / sample_rate as f32).round() as usize;

    let mut edges = vec![bin_of(MIN_BAND_HZ).max(1)];
    for k in 1..=BANDS {
        let hz = MIN_BAND_HZ * (nyquist / MIN_BAND_HZ).powf(k as f32 / BANDS as f32);
        let prev = edges[edges.len() - 1];
        let edge = bin_of(hz).max(prev + 1).min(bins);
        if edge <= prev {
            break;
        }
        edges.push(edge);
    }
    edges
}

pub fn detect_onsets(flux: &[f32]) -> Vec<usize> {
    let max = flux.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return Vec::new();
    }
    let delta = max * ONSET_DELTA;

    let mut onsets: Vec<usize> = Vec::new();
    for t in 1..flux.len() {
        let peak_lo = t.saturating_sub(PEAK_RADIUS);
        let peak_hi = (t + PEAK_RADIUS + 1).min(flux.len());
        if flux[peak_lo..peak_hi].iter().any(|&v| v > flux[t]) {
            continue;
        }

        let mean_lo = t.saturating_sub(MEAN_RADIUS);
        let mean_hi = (t + MEAN_RADIUS + 1).min(flux.len());
        let local = &flux[mean_lo..mean_hi];
        let mean = local.iter().sum::<f32>() / local.len() as f32;

        if flux[t] > mean + delta && onsets.last().map_or(true, |&p| t - p > PEAK_RADIUS) {
            onsets.push(t);
        }
    }
    onsets
}

pub fn detect_fade_out(
    mono: &[f32],
    sample_rate: u32,
    end: usize,
    settings: &FadeOutSettings,
) -> Option<FadeOutInfo> {
    let window = (settings.window_ms as f32 / 1000.0 * sample_rate as f32) as usize;
    if window == 0 || end < window * 4 {
        return None;
    }

    let rms: Vec<f32> = mono[..end].chunks(window).map(calculate_rms).collect();
    let mut sorted = rms.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let body = sorted[sorted.len() / 2];
    if body <= SILENCE_THRESHOLD {
        return None;
    }

    // A fade must actually end quietly.
    if *rms.last()? > body * settings.tail_ratio {
        return None;
    }

    let last_loud = rms.iter().rposition(|&r| r >= body * settings.body_ratio)?;
    let start_frame = (last_loud + 1) * window;
    let duration_frames = end.saturating_sub(start_frame);
    let min_frames = (settings.min_duration_ms as f32 / 1000.0 * sample_rate as f32) as usize;

    if duration_frames < min_frames {
        return None;
    }

    Some(FadeOutInfo {
        start_frame,
        duration_frames,
    })
}

pub fn run_analysis(audio: &AudioData, search: &LoopSearch) -> AnalysisResult {
    let channels = audio.channels.max(1) as usize;

    // 1. Mix to mono and ignore trailing silence
    let mono = audio.mono();
    let end = content_end(&mono);

    // 2. Loop ends must not fall inside an existing fade-out
    let fade_out = detect_fade_out(&mono, audio.sample_rate, end, &FadeOutSettings::default());
    let search_end = fade_out.as_ref().map_or(end, |f| f.start_frame.min(end));

    // 3. Spectral features and onsets
    let features = frame_features(&mono[..end], audio.sample_rate);
    let onsets = detect_onsets(&features.flux);
    let mut result = AnalysisResult {
        fade_out,
        onset_count: onsets.len(),
        content_end: end,
        ..Default::default()
    };

    let frame_count = features.frames.len();
    if frame_count < 2 * CONTEXT_FRAMES + 2 {
        return result;
    }
    let hop = features.hop;

    let positions: Vec<usize> = if search.brute_force || onsets.len() < 2 {
        (0..frame_count).step_by(BRUTE_FORCE_STRIDE).collect()
    } else {
        onsets
    };

    let min_loop_frames = ((search.min_duration_multiplier * end as f64) / hop as f64).ceil() as usize;
    let min_loop_frames = min_loop_frames.max(2 * CONTEXT_FRAMES);
    let last_end_frame = (search_end / hop).min(frame_count - 1);

    // 4. Best end for every start position
    let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
    for (i, &a) in positions.iter().enumerate() {
        let mut best: Option<(usize, f32)> = None;
        for &b in &positions[i + 1..] {
            if b > last_end_frame {
                break;
            }
            if b - a < min_loop_frames {
                continue;
            }
            let score = pair_score(&features.frames, a, b);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((b, score));
            }
        }
        if let Some((b, score)) = best {
            pairs.push((a, b, score));
        }
    }
    pairs.sort_by(|x, y| y.2.total_cmp(&x.2));

    // 5. Refine the best pairs to sample precision
    for (a, b, score) in pairs {
        if result.candidates.len() >= search.max_candidates {
            break;
        }
        let start = a * hop;
        let loop_end = refine_loop_end(&mono[..end], start, b * hop, audio.sample_rate, hop).min(search_end);
        if loop_end <= start {
            continue;
        }

        let points = LoopPoints {
            start_sample: start * channels,
            end_sample: loop_end * channels,
            confidence: score,
        };
        let duplicate = result
            .candidates
            .iter()
            .any(|c| c.start_sample == points.start_sample && c.end_sample == points.end_sample);
        if !duplicate {
            result.candidates.push(points);
        }
    }

    result
}

// Mean cosine similarity of the frames around `a` and around `b`.
fn pair_score(frames: &[Vec<f32>], a: usize, b: usize) -> f32 {
    let before = CONTEXT_FRAMES.min(a);
    let after = CONTEXT_FRAMES.min(frames.len() - 1 - b);
    let count = before + after + 1;

    let sum: f32 = (0..count)
        .map(|k| {
            let i = a - before + k;
            let j = b - before + k;
            frames[i].iter().zip(&frames[j]).map(|(x, y)| x * y).sum::<f32>()
        })
        .sum();
    sum / count as f32
}

// Move `end` within +/- `radius` to where the waveform best matches the audio at `start`.
fn refine_loop_end(mono: &[f32], start: usize, end: usize, sample_rate: u32, radius: usize) -> usize {
    let window = (sample_rate as usize / 10).max(1);
    if start + window > mono.len() {
        return end;
    }
    let lo = end.saturating_sub(radius).max(start + 1);
    let hi = (end + radius).min(mono.len().saturating_sub(window));
    if hi <= lo {
        return end;
    }

    let (offset, corr) = find_best_match_ncc(&mono[start..start + window], &mono[lo..hi + window]);
    if corr > 0.0 {
        lo + offset
    } else {
        end
    }
}

fn calculate_rms(data: &[f32]) -> f32 {
    let sum_sq: f32 = data.iter().map(|x| x * x).sum();
    (sum_sq / (data.len() as f32 + 1e-9)).sqrt()
}

pub fn find_best_match_ncc(query: &[f32], search_space: &[f32]) -> (usize, f32) {
    let n = query.len();
    if n == 0 || search_space.len() < n {
        return (0, 0.0);
    }

    let query_mean = query.iter().sum::<f32>() / n as f32;
    let query_denom = query.iter().map(|x| (x - query_mean).powi(2)).sum::<f32>().sqrt();

    if query_denom < 1e-9 {
        return (0, 0.0); // Silence or flat line
    }

    let mut best_corr = -1.0;
    let mut best_idx = 0;

    for i in 0..=(search_space.len() - n) {
        let candidate = &search_space[i..i + n];

        let cand_mean = candidate.iter().sum::<f32>() / n as f32;
        let cand_denom = candidate.iter().map(|x| (x - cand_mean).powi(2)).sum::<f32>().sqrt();

        if cand_denom < 1e-9 {
            continue;
        }

        let numer: f32 = query
            .iter()
            .zip(candidate.iter())
            .map(|(q, c)| (q - query_mean) * (c - cand_mean))
            .sum();

        let corr = numer / (query_denom * cand_denom);

        if corr > best_corr {
            best_corr = corr;
            best_idx = i;
        }
    }

    (best_idx, best_corr)
}
