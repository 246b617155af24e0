// Scope display modes, after scope-tui (https://github.com/alemi/scope-tui).
// Each mode turns a matrix of PCM channels into chart datasets.

use ratatui::{
    style::{Color, Style},
    symbols::Marker,
    widgets::{Dataset, GraphType},
};
use rustfft::{num_complex::Complex, FftPlanner};

pub type Matrix = Vec<Vec<f64>>;

#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub samples: u32,
    pub scale: f64,
    pub scatter: bool,
    /// Horizontal cells available; spectrum bands follow it.
    pub columns: u16,
    pub marker_type: Marker,
    pub palette: Vec<Color>,
    pub axis_color: Color,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            samples: 2048,
            scale: 1.0,
            scatter: false,
            columns: 80,
            marker_type: Marker::Braille,
            palette: vec![Color::Cyan],
            axis_color: Color::DarkGray,
        }
    }
}

impl GraphConfig {
    pub fn palette(&self, index: usize) -> Color {
        *self.palette.get(index % self.palette.len().max(1)).unwrap_or(&Color::White)
    }
}

pub trait DisplayMode: Send {
    /// `(x_bounds, y_bounds)` of the chart this mode draws into.
    fn bounds(&self, cfg: &GraphConfig) -> ([f64; 2], [f64; 2]);
    fn process(&mut self, cfg: &GraphConfig, data: &Matrix) -> Vec<DataSet>;
    fn references(&self, _cfg: &GraphConfig) -> Vec<DataSet> {
        vec![]
    }
}

#[derive(Debug, Clone)]
pub struct DataSet {
    pub data: Vec<(f64, f64)>,
    pub marker_type: Marker,
    pub graph_type: GraphType,
    pub color: Color,
}

impl DataSet {
    pub fn new(data: Vec<(f64, f64)>, marker_type: Marker, graph_type: GraphType, color: Color) -> Self {
        Self {
            data,
            marker_type,
            graph_type,
            color,
        }
    }
}

impl<'a> From<&'a DataSet> for Dataset<'a> {
    fn from(ds: &'a DataSet) -> Dataset<'a> {
        Dataset::default()
            .marker(ds.marker_type)
            .graph_type(ds.graph_type)
            .style(Style::default().fg(ds.color))
            .data(&ds.data)
    }
}

// ── oscilloscope ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Oscilloscope {
    pub peaks: bool,
}

impl DisplayMode for Oscilloscope {
    fn bounds(&self, cfg: &GraphConfig) -> ([f64; 2], [f64; 2]) {
        ([0.0, cfg.samples as f64], [-cfg.scale, cfg.scale])
    }

    fn references(&self, cfg: &GraphConfig) -> Vec<DataSet> {
        vec![DataSet::new(
            vec![(0.0, 0.0), (cfg.samples as f64, 0.0)],
            cfg.marker_type,
            GraphType::Line,
            cfg.axis_color,
        )]
    }

    fn process(&mut self, cfg: &GraphConfig, data: &Matrix) -> Vec<DataSet> {
        let mut out = Vec::new();

        for (n, channel) in data.iter().enumerate().rev() {
            let (mut min, mut max) = (0.0_f64, 0.0_f64);
            let mut pts = Vec::with_capacity(channel.len());
            for (i, &s) in channel.iter().enumerate() {
                min = min.min(s);
                max = max.max(s);
                pts.push((i as f64, s));
            }

            if self.peaks {
                out.push(DataSet::new(
                    vec![(0.0, min), (0.0, max)],
                    cfg.marker_type,
                    GraphType::Scatter,
                    cfg.palette(n + 1),
                ));
            }

            out.push(DataSet::new(
                pts,
                cfg.marker_type,
                if cfg.scatter {
                    GraphType::Scatter
                } else {
                    GraphType::Line
                },
                cfg.palette(n),
            ));
        }

        out
    }
}

// ── phase scatter ────────────────────────────────────────────────────────────

/// Plots each sample against the next one; tonal material draws ellipses,
/// noise fills the square.
#[derive(Default)]
pub struct PhaseScatter;

impl DisplayMode for PhaseScatter {
    fn bounds(&self, cfg: &GraphConfig) -> ([f64; 2], [f64; 2]) {
        ([-cfg.scale, cfg.scale], [-cfg.scale, cfg.scale])
    }

    fn process(&mut self, cfg: &GraphConfig, data: &Matrix) -> Vec<DataSet> {
        data.iter()
            .enumerate()
            .map(|(n, channel)| {
                let pts = channel.windows(2).map(|w| (w[0], w[1])).collect();
                DataSet::new(pts, cfg.marker_type, GraphType::Scatter, cfg.palette(n))
            })
            .collect()
    }
}

// ── spectrum ─────────────────────────────────────────────────────────────────

const SPECTRUM_FLOOR_DB: f64 = -80.0;

/// Hann-windowed FFT folded into log-spaced bands, one per column.
pub struct Spectrum {
    planner: FftPlanner<f64>,
}

impl Default for Spectrum {
    fn default() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }
}

impl Spectrum {
    fn magnitudes(&mut self, channel: &[f64]) -> Vec<f64> {
        let fft_size = channel.len().next_power_of_two().max(64);
        let fft = self.planner.plan_fft_forward(fft_size);

        let len = channel.len();
        let mut buf: Vec<Complex<f64>> = channel
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                let w = 0.5
                    * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (len.max(2) - 1) as f64).cos());
                Complex::new(s * w, 0.0)
            })
            .collect();
        buf.resize(fft_size, Complex::new(0.0, 0.0));
        fft.process(&mut buf);

        buf[..fft_size / 2]
            .iter()
            .map(|c| c.norm() / fft_size as f64)
            .collect()
    }
}

/// Fold `magnitudes` into `bands` log-spaced buckets, normalised to 0..1.
pub fn fold_bands(magnitudes: &[f64], bands: usize) -> Vec<f64> {
    if magnitudes.len() < 2 || bands == 0 {
        return vec![0.0; bands];
    }
    let max_bin = magnitudes.len() as f64;
    (0..bands)
        .map(|b| {
            let lo = max_bin.powf(b as f64 / bands as f64).floor() as usize;
            let hi = (max_bin.powf((b + 1) as f64 / bands as f64).ceil() as usize)
                .clamp(lo + 1, magnitudes.len());
            let peak = magnitudes[lo.min(magnitudes.len() - 1)..hi]
                .iter()
                .cloned()
                .fold(0.0_f64, f64::max);
            let db = 20.0 * (peak + 1e-12).log10();
            ((db - SPECTRUM_FLOOR_DB) / -SPECTRUM_FLOOR_DB).clamp(0.0, 1.0)
        })
        .collect()
}

impl DisplayMode for Spectrum {
    fn bounds(&self, cfg: &GraphConfig) -> ([f64; 2], [f64; 2]) {
        ([0.0, cfg.columns.max(1) as f64], [0.0, 1.0])
    }

    fn process(&mut self, cfg: &GraphConfig, data: &Matrix) -> Vec<DataSet> {
        let Some(channel) = data.first() else {
            return vec![];
        };
        let bands = fold_bands(&self.magnitudes(channel), cfg.columns.max(1) as usize);
        let pts = bands
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i as f64 + 0.5, v))
            .collect();
        vec![DataSet::new(pts, Marker::HalfBlock, GraphType::Bar, cfg.palette(0))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq_bins: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq_bins * i as f64 / n as f64).sin())
            .collect()
    }

    #[test]
    fn test_oscilloscope_points_and_peaks() {
        let cfg = GraphConfig::default();
        let mut osc = Oscilloscope { peaks: true };
        let out = osc.process(&cfg, &vec![vec![0.1, -0.5, 0.7]]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].data, vec![(0.0, -0.5), (0.0, 0.7)]);
        assert_eq!(out[1].data.len(), 3);
        assert_eq!(out[1].graph_type, GraphType::Line);
    }

    #[test]
    fn test_scatter_pairs_neighbours() {
        let cfg = GraphConfig::default();
        let out = PhaseScatter.process(&cfg, &vec![vec![0.1, 0.2, 0.3]]);
        assert_eq!(out[0].data, vec![(0.1, 0.2), (0.2, 0.3)]);
    }

    #[test]
    fn test_spectrum_band_count_follows_columns() {
        let cfg = GraphConfig {
            columns: 24,
            ..GraphConfig::default()
        };
        let mut spectrum = Spectrum::default();
        let out = spectrum.process(&cfg, &vec![sine(64.0, 1024)]);
        assert_eq!(out[0].data.len(), 24);
        assert!(out[0].data.iter().all(|&(_, y)| (0.0..=1.0).contains(&y)));
    }

    #[test]
    fn test_spectrum_peak_lands_in_right_band() {
        let mut spectrum = Spectrum::default();
        let mags = spectrum.magnitudes(&sine(100.0, 1024));
        let loudest = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(loudest, 100);
    }

    #[test]
    fn test_fold_bands_silence_is_floor() {
        let bands = fold_bands(&vec![0.0; 512], 16);
        assert_eq!(bands.len(), 16);
        assert!(bands.iter().all(|&v| v == 0.0));
    }
}
