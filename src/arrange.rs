use crate::audio::AudioData;
use crate::LoopPoints;

/// How the extended track is laid out.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Extension {
    /// Intro, `loops` passes of the loop section, then the untouched outro.
    Sections { loops: u32 },
    /// Intro then the loop repeated until exactly `total_frames`, with a
    /// linear ramp to silence over the last `fade_frames`.
    Exact { total_frames: usize, fade_frames: usize },
}

impl Extension {
    /// Choose the layout for a target length in seconds. `fade_secs == None`
    /// treats the target as a minimum and never cuts the outro.
    pub fn plan(data: &AudioData, points: &LoopPoints, target_secs: f64, fade_secs: Option<f64>) -> Self {
        let channels = data.channels.max(1) as usize;
        let rate = data.sample_rate as f64;
        let target_frames = (target_secs * rate).round() as usize;

        match fade_secs {
            None => {
                let intro = points.start_sample / channels;
                let loop_frames = (points.len_samples() / channels).max(1);
                let outro = data.frames().saturating_sub(points.end_sample / channels);
                let needed = target_frames.saturating_sub(intro + outro);
                let loops = needed.div_ceil(loop_frames).max(1);
                Extension::Sections {
                    loops: u32::try_from(loops).unwrap_or(u32::MAX),
                }
            }
            Some(fade) => Extension::Exact {
                total_frames: target_frames,
                fade_frames: ((fade * rate).round() as usize).min(target_frames),
            },
        }
    }

    /// Length in frames of the rendered track.
    pub fn total_frames(&self, data: &AudioData, points: &LoopPoints) -> usize {
        let channels = data.channels.max(1) as usize;
        match *self {
            Extension::Sections { loops } => {
                let loop_frames = points.len_samples() / channels;
                data.frames() + loop_frames * (loops.max(1) as usize - 1)
            }
            Extension::Exact { total_frames, .. } => total_frames,
        }
    }
}

pub struct ExtendedSource<'a> {
    data: &'a AudioData,
    loop_points: LoopPoints,
    extension: Extension,
    cursor: usize,
    emitted: usize,
    loop_count: u32,
}

impl<'a> ExtendedSource<'a> {
    pub fn new(data: &'a AudioData, loop_points: LoopPoints, extension: Extension) -> Self {
        Self {
            data,
            loop_points,
            extension,
            cursor: 0,
            emitted: 0,
            loop_count: 0,
        }
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }
}

impl Iterator for ExtendedSource<'_> {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let channels = self.data.channels.max(1) as usize;

        let gain = match self.extension {
            Extension::Sections { .. } => 1.0,
            Extension::Exact { total_frames, fade_frames } => {
                let frame = self.emitted / channels;
                if frame >= total_frames {
                    return None;
                }
                let remaining = total_frames - frame;
                if remaining <= fade_frames {
                    (remaining - 1) as f32 / fade_frames as f32
                } else {
                    1.0
                }
            }
        };

        if self.cursor >= self.data.samples.len() {
            return None;
        }

        let sample = self.data.samples[self.cursor];
        self.cursor += 1;
        self.emitted += 1;

        let should_loop = match self.extension {
            Extension::Sections { loops } => self.loop_count + 1 < loops,
            Extension::Exact { .. } => true,
        };

        // Loop points are frame-aligned, so the jump always lands on a frame boundary.
        if should_loop && self.cursor == self.loop_points.end_sample {
            self.cursor = self.loop_points.start_sample;
            self.loop_count += 1;
        }

        Some(sample * gain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 10 frames of mono audio: values 0..10, loop over [2, 6).
    fn ramp() -> (AudioData, LoopPoints) {
        let data = AudioData {
            samples: (0..10).map(|i| i as f32).collect(),
            sample_rate: 10,
            channels: 1,
        };
        let points = LoopPoints {
            start_sample: 2,
            end_sample: 6,
            confidence: 1.0,
        };
        (data, points)
    }

    #[test]
    fn sections_keep_intro_and_outro() {
        let (data, points) = ramp();
        let source = ExtendedSource::new(&data, points, Extension::Sections { loops: 3 });
        let out: Vec<f32> = source.collect();

        let expected: Vec<f32> = [0, 1, 2, 3, 4, 5, 2, 3, 4, 5, 2, 3, 4, 5, 6, 7, 8, 9]
            .iter()
            .map(|&v| v as f32)
            .collect();
        assert_eq!(out, expected);
        assert_eq!(
            Extension::Sections { loops: 3 }.total_frames(&data, &points),
            out.len()
        );
    }

    #[test]
    fn single_pass_is_the_original() {
        let (data, points) = ramp();
        let out: Vec<f32> = ExtendedSource::new(&data, points, Extension::Sections { loops: 1 }).collect();
        assert_eq!(out, data.samples);
    }

    #[test]
    fn plan_without_fade_is_a_floor() {
        let (data, points) = ramp();
        // 2.5 s = 25 frames; intro 2 + outro 4 leaves 19, loop is 4 -> 5 passes.
        let plan = Extension::plan(&data, &points, 2.5, None);
        assert_eq!(plan, Extension::Sections { loops: 5 });
        assert!(plan.total_frames(&data, &points) >= 25);

        // Shorter than the track still plays the loop once.
        assert_eq!(Extension::plan(&data, &points, 0.3, None), Extension::Sections { loops: 1 });
    }

    #[test]
    fn exact_plan_hits_target_and_fades_to_silence() {
        let (data, points) = ramp();
        let plan = Extension::plan(&data, &points, 2.0, Some(0.5));
        assert_eq!(
            plan,
            Extension::Exact {
                total_frames: 20,
                fade_frames: 5
            }
        );

        let out: Vec<f32> = ExtendedSource::new(&data, points, plan).collect();
        assert_eq!(out.len(), 20);
        assert_eq!(&out[..6], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(out[6], 2.0);
        assert_eq!(*out.last().unwrap(), 0.0);
        // Last five frames are 3, 4, 5, 2, 3 scaled by 4/5 .. 0/5.
        assert!((out[15] - 3.0 * 0.8).abs() < 1e-6);
        assert!((out[17] - 5.0 * 0.4).abs() < 1e-6);
    }

    #[test]
    fn fade_is_clamped_to_output() {
        let (data, points) = ramp();
        assert_eq!(
            Extension::plan(&data, &points, 1.0, Some(30.0)),
            Extension::Exact {
                total_frames: 10,
                fade_frames: 10
            }
        );
    }

    #[test]
    fn stereo_loops_whole_frames() {
        let data = AudioData {
            samples: vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5],
            sample_rate: 4,
            channels: 2,
        };
        let points = LoopPoints {
            start_sample: 2,
            end_sample: 6,
            confidence: 1.0,
        };
        let mut source = ExtendedSource::new(&data, points, Extension::Sections { loops: 2 });
        let out: Vec<f32> = source.by_ref().collect();
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5]);
        assert_eq!(source.loop_count(), 1);
    }
}
