//! DSP building blocks of the graph: biquad EQ, delay line, reverb tank

use crate::config::ReverbConfig;
use crate::effect::FilterShape;
use crate::types::StereoSample;

/// Q of the peaking band
const PEAKING_Q: f32 = 1.0;
/// Shelf slope S (1.0 = steepest without overshoot)
const SHELF_SLOPE: f32 = 1.0;

/// Biquad filter coefficients (RBJ cookbook, normalized by a0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoeffs {
    pub fn for_shape(shape: FilterShape, freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        if gain_db == 0.0 {
            return Self::passthrough();
        }
        match shape {
            FilterShape::LowShelf => Self::low_shelf(freq, gain_db, sample_rate),
            FilterShape::Peaking => Self::peaking(freq, gain_db, PEAKING_Q, sample_rate),
            FilterShape::HighShelf => Self::high_shelf(freq, gain_db, sample_rate),
        }
    }

    fn shelf_alpha(a: f32, sin_w0: f32) -> f32 {
        sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / SHELF_SLOPE - 1.0) + 2.0).sqrt()
    }

    pub fn low_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = Self::shelf_alpha(a, w0.sin());
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
        Self {
            b0: (a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha)) / a0,
            b1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha)) / a0,
            a1: (-2.0 * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
        }
    }

    pub fn peaking(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    pub fn high_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = Self::shelf_alpha(a, w0.sin());
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
        Self {
            b0: (a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha)) / a0,
            b1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha)) / a0,
            a1: (2.0 * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
        }
    }

    /// Unity gain, no filtering
    pub fn passthrough() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

/// One EQ band: coefficients plus per-channel history
#[derive(Debug, Clone)]
pub struct EqFilter {
    shape: FilterShape,
    coeffs: BiquadCoeffs,
    /// (frequency, gain) the coefficients were computed for
    current: (f32, f32),
    x1: StereoSample,
    x2: StereoSample,
    y1: StereoSample,
    y2: StereoSample,
}

impl EqFilter {
    pub fn new(shape: FilterShape) -> Self {
        Self {
            shape,
            coeffs: BiquadCoeffs::passthrough(),
            current: (0.0, 0.0),
            x1: StereoSample::silence(),
            x2: StereoSample::silence(),
            y1: StereoSample::silence(),
            y2: StereoSample::silence(),
        }
    }

    /// Recompute coefficients if frequency or gain changed. Filter history is kept.
    pub fn set(&mut self, frequency_hz: f32, gain_db: f32, sample_rate: u32) {
        if self.current == (frequency_hz, gain_db) {
            return;
        }
        self.current = (frequency_hz, gain_db);
        self.coeffs = BiquadCoeffs::for_shape(self.shape, frequency_hz, gain_db, sample_rate as f32);
    }

    #[inline]
    pub fn process(&mut self, input: StereoSample) -> StereoSample {
        let c = &self.coeffs;
        let out = StereoSample::new(
            c.b0 * input.left + c.b1 * self.x1.left + c.b2 * self.x2.left
                - c.a1 * self.y1.left
                - c.a2 * self.y2.left,
            c.b0 * input.right + c.b1 * self.x1.right + c.b2 * self.x2.right
                - c.a1 * self.y1.right
                - c.a2 * self.y2.right,
        );
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = out;
        out
    }
}

/// Stereo ring buffer with a variable read offset
///
/// Reading and writing are separate steps: the graph reads the delayed
/// sample first, evaluates everything downstream (including the feedback
/// gain), then writes input plus feedback back in.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<StereoSample>,
    write_pos: usize,
    delay_samples: usize,
}

impl DelayLine {
    pub fn new(max_delay_samples: usize) -> Self {
        Self {
            buffer: vec![StereoSample::silence(); max_delay_samples.max(1) + 1],
            write_pos: 0,
            delay_samples: 1,
        }
    }

    /// Delay in samples; at least one sample so the feedback loop stays causal
    pub fn set_delay_samples(&mut self, samples: usize) {
        self.delay_samples = samples.clamp(1, self.buffer.len() - 1);
    }

    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    #[inline]
    pub fn read(&self) -> StereoSample {
        let len = self.buffer.len();
        self.buffer[(self.write_pos + len - self.delay_samples) % len]
    }

    #[inline]
    pub fn write(&mut self, sample: StereoSample) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }
}

/// Comb filter delay line lengths (in samples at 44.1kHz)
const COMB_LENGTHS: [usize; 8] = [1557, 1617, 1491, 1422, 1277, 1356, 1188, 1116];
const ALLPASS_LENGTHS: [usize; 4] = [225, 556, 441, 341];
/// Right channel offset for stereo spread
const STEREO_SPREAD: usize = 23;
const ALLPASS_FEEDBACK: f32 = 0.5;
/// Gain compensation for summing eight combs
const COMB_GAIN: f32 = 0.2;

#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    pos: usize,
    filter_state: f32,
}

impl CombFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length.max(1)],
            pos: 0,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.pos];
        // one-pole lowpass in the loop darkens the tail
        self.filter_state = output * (1.0 - damp) + self.filter_state * damp;
        self.buffer[self.pos] = input + self.filter_state * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }
}

#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    pos: usize,
}

impl AllpassFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length.max(1)],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.pos];
        let output = -input + buffered;
        self.buffer[self.pos] = input + buffered * ALLPASS_FEEDBACK;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }
}

/// Freeverb-style tank producing only the wet signal
///
/// The branch level is applied by the reverb send downstream.
#[derive(Debug, Clone)]
pub struct ReverbTank {
    combs_l: Vec<CombFilter>,
    combs_r: Vec<CombFilter>,
    allpass_l: Vec<AllpassFilter>,
    allpass_r: Vec<AllpassFilter>,
    feedback: f32,
    damping: f32,
}

impl ReverbTank {
    pub fn new(config: &ReverbConfig, sample_rate: u32) -> Self {
        let scale = sample_rate as f32 / 44100.0;
        let scaled = |len: usize| (len as f32 * scale) as usize;

        Self {
            combs_l: COMB_LENGTHS.iter().map(|&len| CombFilter::new(scaled(len))).collect(),
            combs_r: COMB_LENGTHS
                .iter()
                .map(|&len| CombFilter::new(scaled(len + STEREO_SPREAD)))
                .collect(),
            allpass_l: ALLPASS_LENGTHS.iter().map(|&len| AllpassFilter::new(scaled(len))).collect(),
            allpass_r: ALLPASS_LENGTHS
                .iter()
                .map(|&len| AllpassFilter::new(scaled(len + STEREO_SPREAD)))
                .collect(),
            // room size maps to comb feedback 0.7-0.98
            feedback: 0.7 + config.room_size.clamp(0.0, 1.0) * 0.28,
            damping: config.damping.clamp(0.0, 1.0),
        }
    }

    #[inline]
    pub fn process(&mut self, input: StereoSample) -> StereoSample {
        let mono = (input.left + input.right) * 0.5;

        let mut out_l: f32 = 0.0;
        let mut out_r: f32 = 0.0;
        for comb in &mut self.combs_l {
            out_l += comb.process(mono, self.feedback, self.damping);
        }
        for comb in &mut self.combs_r {
            out_r += comb.process(mono, self.feedback, self.damping);
        }
        out_l *= COMB_GAIN;
        out_r *= COMB_GAIN;

        for ap in &mut self.allpass_l {
            out_l = ap.process(out_l);
        }
        for ap in &mut self.allpass_r {
            out_r = ap.process(out_r);
        }

        StereoSample::new(out_l, out_r)
    }
}
