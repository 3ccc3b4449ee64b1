use microfft::real::rfft_1024;

use crate::FFT_SIZE;
use crate::io::SpectrumAnalyzer;

/// 1024-point real FFT producing bin energies `|X_k|² / N²`.
///
/// Samples stay in raw i16 units, so a full-scale sine centred on a bin reads
/// 0 dBFS against `32767² / 2`.
pub struct RealFft {
    input: [f32; FFT_SIZE],
}

impl RealFft {
    pub const fn new() -> Self {
        Self {
            input: [0.0; FFT_SIZE],
        }
    }
}

impl Default for RealFft {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer for RealFft {
    /// Fewer than `FFT_SIZE` samples are centred and zero-padded; extra output
    /// slots past the Nyquist bin are zeroed.
    fn transform(&mut self, samples: &[i16], windowed: bool, out: &mut [f32]) {
        let sample_count = samples.len().min(FFT_SIZE);
        let left_padding = (FFT_SIZE - sample_count) / 2;

        self.input.fill(0.0);
        let populated = &mut self.input[left_padding..left_padding + sample_count];
        for (slot, &sample) in populated.iter_mut().zip(samples) {
            *slot = sample as f32;
        }
        if windowed {
            hann_window(populated);
        }

        let spectrum = rfft_1024(&mut self.input);
        const NORM: f32 = 1.0 / (FFT_SIZE as f32 * FFT_SIZE as f32);

        // microfft packs the real Nyquist value into the imaginary part of bin 0
        let nyquist = spectrum[0].im;
        spectrum[0].im = 0.0;

        out.fill(0.0);
        for (energy, bin) in out.iter_mut().zip(spectrum.iter()) {
            *energy = bin.norm_sqr() * NORM;
        }
        if let Some(energy) = out.get_mut(FFT_SIZE / 2) {
            *energy = nyquist * nyquist * NORM;
        }
    }
}

pub fn hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let denom = (n - 1) as f32;
    for (i, v) in buffer.iter_mut().enumerate() {
        // w[n] = 0.5 * (1 - cos(2π n / (N-1)))
        let phase = (i as f32) / denom;
        let w = 0.5 * (1.0 - libm::cosf(2.0 * core::f32::consts::PI * phase));
        *v *= w;
    }
}
