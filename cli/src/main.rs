use clap::{Parser, Subcommand, ValueEnum};
use morsewave_core::fit::fit_segment;
use morsewave_core::morse::{decode_from_morse, encode_to_morse};
use morsewave_core::window::{normalize, padded_limits, rectify, sample_times};
use morsewave_core::{
    read_wav, write_wav, Decoder, Encoder, Figure, FitOptions, LineStyle, Series, SinusoidFit,
    TimeWindow, ToneConfig, WavData,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "morsewave")]
#[command(about = "Morse code tone synthesis and received sound analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the Morse code for a message and decode it back
    Morse {
        /// Message text
        text: String,
    },

    /// Encode a message as a keyed tone and write it to a WAV file
    Encode {
        /// Message text
        text: String,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Keying scheme
        #[arg(long, value_enum, default_value_t = Scheme::Pulse)]
        scheme: Scheme,

        #[command(flatten)]
        tone: ToneArgs,

        /// Also plot the whole signal to this PNG
        #[arg(long, value_name = "PNG")]
        envelope_png: Option<PathBuf>,

        /// Also plot a few samples of one pulse to this PNG
        #[arg(long, value_name = "PNG")]
        period_png: Option<PathBuf>,

        /// Start of the period plot in seconds
        #[arg(long, default_value_t = morsewave_core::FIT_WINDOW_START_SECS)]
        period_start: f64,

        /// Number of samples in the period plot
        #[arg(long, default_value_t = morsewave_core::PERIOD_PLOT_SAMPLES)]
        period_samples: usize,
    },

    /// Decode a keyed tone WAV file back to text
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Pulse duration in seconds (must match the encoder)
        #[arg(short, long, default_value_t = morsewave_core::PULSE_DURATION_SECS)]
        pulse_duration: f64,

        /// Fraction of the loudest slot a slot must reach to count as on
        #[arg(short, long, default_value_t = morsewave_core::DEFAULT_THRESHOLD_RATIO)]
        threshold: f32,

        /// Slice slots from the first sample instead of the first loud one
        #[arg(long)]
        no_align: bool,
    },

    /// Plot a time window of a WAV file
    Plot {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Output PNG file
        #[arg(value_name = "OUTPUT.PNG")]
        output: PathBuf,

        /// Window start in seconds (default: start of file)
        #[arg(long)]
        start: Option<f64>,

        /// Window end in seconds (default: end of file)
        #[arg(long)]
        end: Option<f64>,

        /// Plot title
        #[arg(long, default_value = "Sound Envelope")]
        title: String,

        /// X axis label
        #[arg(long, default_value = "Time (s)")]
        x_label: String,

        /// Y axis label
        #[arg(long, default_value = "Amplitude")]
        y_label: String,

        #[command(flatten)]
        style: PlotArgs,
    },

    /// Fit a sinusoid to a short window of a WAV file
    Fit {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Window start in seconds
        #[arg(long, default_value_t = morsewave_core::FIT_WINDOW_START_SECS)]
        start: f64,

        /// Window end in seconds
        #[arg(long, default_value_t = morsewave_core::FIT_WINDOW_END_SECS)]
        end: f64,

        /// Starting frequency in Hz (default: estimated from the spectrum)
        #[arg(long)]
        guess_frequency: Option<f64>,

        /// Fit the raw samples instead of the normalized signal
        #[arg(long)]
        raw: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Plot the window with the fitted curve to this PNG
        #[arg(long, value_name = "PNG")]
        png: Option<PathBuf>,

        /// Plot resolution
        #[arg(long, default_value_t = 100)]
        dpi: u32,
    },

    /// Produce the standard set of plots and fit for a received recording
    Analyse {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Directory for the PNG and JSON outputs
        #[arg(value_name = "OUT_DIR")]
        out_dir: PathBuf,

        /// Plot resolution
        #[arg(long, default_value_t = 100)]
        dpi: u32,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Scheme {
    /// Absolute-time carrier keyed by pulse slots
    Pulse,
    /// Dot/dash elements, each tone restarting at phase zero
    Element,
}

#[derive(clap::Args)]
struct ToneArgs {
    /// Sample rate in Hz
    #[arg(long, default_value_t = morsewave_core::SAMPLE_RATE)]
    sample_rate: u32,

    /// Pulse (dot) duration in seconds
    #[arg(short, long, default_value_t = morsewave_core::PULSE_DURATION_SECS)]
    pulse_duration: f64,

    /// Carrier frequency in Hz (default depends on the scheme)
    #[arg(short, long)]
    frequency: Option<f64>,

    /// Peak amplitude in 16-bit units (default depends on the scheme)
    #[arg(short, long)]
    amplitude: Option<f64>,
}

impl ToneArgs {
    fn config(&self, scheme: Scheme) -> ToneConfig {
        let base = match scheme {
            Scheme::Pulse => ToneConfig::default(),
            Scheme::Element => ToneConfig::element_defaults(),
        };
        ToneConfig {
            sample_rate: self.sample_rate,
            pulse_duration: self.pulse_duration,
            frequency: self.frequency.unwrap_or(base.frequency),
            amplitude: self.amplitude.unwrap_or(base.amplitude),
        }
    }
}

#[derive(clap::Args, Clone, Copy, Default)]
struct PlotArgs {
    /// Only plot samples inside the window, on absolute time, with grid and tight limits
    #[arg(long)]
    zoom: bool,

    /// Scale samples so the peak is 1.0
    #[arg(long)]
    normalize: bool,

    /// Plot the magnitude envelope
    #[arg(long)]
    rectify: bool,

    /// Plot resolution
    #[arg(long, default_value_t = 100)]
    dpi: u32,
}

#[derive(Serialize)]
struct FitReport {
    window_start: f64,
    window_end: f64,
    samples: usize,
    amplitude: f64,
    frequency: f64,
    phase: f64,
    period: f64,
    rms_residual: f64,
    iterations: usize,
}

impl FitReport {
    fn new(window: TimeWindow, samples: usize, fit: &SinusoidFit) -> Self {
        Self {
            window_start: window.start,
            window_end: window.end,
            samples,
            amplitude: fit.amplitude,
            frequency: fit.frequency,
            phase: fit.phase,
            period: fit.period(),
            rms_residual: fit.rms_residual,
            iterations: fit.iterations,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Morse { text } => morse_command(&text)?,
        Commands::Encode {
            text,
            output,
            scheme,
            tone,
            envelope_png,
            period_png,
            period_start,
            period_samples,
        } => {
            let config = tone.config(scheme);
            let samples = encode_command(&text, &output, scheme, config)?;
            if let Some(png) = envelope_png {
                envelope_png_command(&samples, config.sample_rate, &png)?;
            }
            if let Some(png) = period_png {
                period_png_command(&samples, config.sample_rate, period_start, period_samples, &png)?;
            }
        }
        Commands::Decode { input, pulse_duration, threshold, no_align } => {
            decode_command(&input, pulse_duration, threshold, !no_align)?
        }
        Commands::Plot { input, output, start, end, title, x_label, y_label, style } => {
            let labels = AxisLabels { title, x_label, y_label };
            plot_command(&input, &output, start, end, &labels, style)?
        }
        Commands::Fit { input, start, end, guess_frequency, raw, json, png, dpi } => {
            let data = read_wav(&input)?;
            let data = if raw { data } else { data.normalized() };
            let window = TimeWindow::new(start, end)?;
            let options = FitOptions {
                frequency_guess: guess_frequency,
                ..FitOptions::default()
            };
            let (report, fit) = fit_window(&data, window, &options)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Amplitude: {:.6}", report.amplitude);
                println!("Frequency: {:.3} Hz", report.frequency);
                println!("Phase: {:.6} rad", report.phase);
                println!("RMS residual: {:.6}", report.rms_residual);
            }

            if let Some(png) = png {
                fitted_figure(&data, window, &fit, dpi).save(&png)?;
                println!("Wrote fit plot to {}", png.display());
            }
        }
        Commands::Analyse { input, out_dir, dpi } => analyse_command(&input, &out_dir, dpi)?,
    }

    Ok(())
}

fn morse_command(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let morse = encode_to_morse(text)?;
    println!("Morse code: {}", morse);
    println!("Decoded message: {}", decode_from_morse(&morse)?);
    Ok(())
}

fn encode_command(
    text: &str,
    output_path: &Path,
    scheme: Scheme,
    config: ToneConfig,
) -> Result<Vec<i16>, Box<dyn std::error::Error>> {
    let mut encoder = Encoder::new(config)?;

    let samples = match scheme {
        Scheme::Pulse => {
            let pulses = encoder.pulses(text)?;
            println!("Pulse train: {}", pulses);
            encoder.encode(text)?
        }
        Scheme::Element => {
            let morse = encode_to_morse(text.trim())?;
            println!("Morse code: {}", morse);
            encoder.encode_elements(&morse)?
        }
    };

    write_wav(output_path, config.sample_rate, &samples)?;
    println!(
        "Wrote {} samples ({:.2}s) to {}",
        samples.len(),
        samples.len() as f64 / config.sample_rate as f64,
        output_path.display()
    );
    Ok(samples)
}

fn envelope_png_command(
    samples: &[i16],
    sample_rate: u32,
    png: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let times = sample_times(samples.len(), sample_rate, 0.0);
    AxisLabels::new("Transmitted sound envelope")
        .figure()
        .add_series(Series::from_samples(&times, samples))
        .save(png)?;
    println!("Wrote envelope plot to {}", png.display());
    Ok(())
}

fn period_png_command(
    samples: &[i16],
    sample_rate: u32,
    start: f64,
    count: usize,
    png: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let first = ((start * sample_rate as f64).round().max(0.0) as usize).min(samples.len());
    let last = (first + count).min(samples.len());
    let times = sample_times(last - first, sample_rate, 0.0);

    AxisLabels::new("Transmitted sound period")
        .figure()
        .add_series(Series::from_samples(&times, &samples[first..last]))
        .save(png)?;
    println!("Wrote period plot ({} samples) to {}", last - first, png.display());
    Ok(())
}

fn decode_command(
    input_path: &Path,
    pulse_duration: f64,
    threshold: f32,
    align: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_wav(input_path)?;
    tracing::info!(
        "Read WAV: {} Hz, {} channel(s), {:.2}s",
        data.sample_rate,
        data.channels,
        data.duration()
    );

    let config = ToneConfig {
        sample_rate: data.sample_rate,
        pulse_duration,
        ..ToneConfig::default()
    };
    let mut decoder = Decoder::new(config)?;
    decoder.set_threshold_ratio(threshold);
    decoder.set_align(align);

    let message = decoder.decode(&data.samples, data.sample_rate)?;
    println!("Decoded message: {}", message);
    Ok(())
}

fn plot_command(
    input_path: &Path,
    output_path: &Path,
    start: Option<f64>,
    end: Option<f64>,
    labels: &AxisLabels,
    style: PlotArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_wav(input_path)?;
    let window = TimeWindow::new(start.unwrap_or(0.0), end.unwrap_or_else(|| data.duration()))?;

    window_figure(&data, window, labels, style).save(output_path)?;
    println!(
        "Wrote plot of {:.3}s..{:.3}s to {}",
        window.start,
        window.end,
        output_path.display()
    );
    Ok(())
}

struct AxisLabels {
    title: String,
    x_label: String,
    y_label: String,
}

impl AxisLabels {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            x_label: "Time (s)".to_string(),
            y_label: "Amplitude".to_string(),
        }
    }

    fn figure(&self) -> Figure {
        Figure::new(&self.title)
            .x_label(&self.x_label)
            .y_label(&self.y_label)
    }
}

/// Plot `window` of `data` with time counted from the window start. Zoomed plots
/// instead keep every sample whose timestamp lies in the closed window, on
/// absolute time, with a grid and y limits padded around the data.
fn window_figure(data: &WavData, window: TimeWindow, labels: &AxisLabels, style: PlotArgs) -> Figure {
    let samples = if style.normalize {
        normalize(&data.samples)
    } else {
        data.samples.clone()
    };
    let samples = if style.rectify { rectify(&samples) } else { samples };

    let fs = data.sample_rate;
    if !style.zoom {
        let segment = window.slice(&samples, fs);
        let times = sample_times(segment.len(), fs, 0.0);
        return labels
            .figure()
            .dpi(style.dpi)
            .add_series(Series::from_samples(&times, segment));
    }

    let range = window.inclusive_range(fs, samples.len());
    let segment = &samples[range.clone()];
    let times = sample_times(segment.len(), fs, range.start as f64 / fs as f64);
    let (lo, hi) = padded_limits(segment);

    labels
        .figure()
        .dpi(style.dpi)
        .grid(true)
        .x_limits(window.start, window.end)
        .y_limits(lo, hi)
        .add_series(Series::from_samples(&times, segment))
}

fn fit_window(
    data: &WavData,
    window: TimeWindow,
    options: &FitOptions,
) -> Result<(FitReport, SinusoidFit), Box<dyn std::error::Error>> {
    let segment = window.slice(&data.samples, data.sample_rate);
    tracing::debug!("Fitting {} samples in {:?}", segment.len(), window);
    let fit = fit_segment(segment, data.sample_rate, options)?;
    Ok((FitReport::new(window, segment.len(), &fit), fit))
}

/// Window samples (solid) against the fitted model (dashed), timed from the window start
fn fitted_figure(data: &WavData, window: TimeWindow, fit: &SinusoidFit, dpi: u32) -> Figure {
    let segment = window.slice(&data.samples, data.sample_rate);
    let times = sample_times(segment.len(), data.sample_rate, 0.0);

    AxisLabels::new("Fitted Sinusoidal Wave")
        .figure()
        .dpi(dpi)
        .add_series(Series::from_samples(&times, segment).with_label("Original"))
        .add_series(
            Series::from_samples(&times, &fit.curve(&times))
                .with_label("Fitted")
                .with_style(LineStyle::Dashed),
        )
}

fn analyse_command(input_path: &Path, out_dir: &Path, dpi: u32) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_wav(input_path)?.normalized();
    fs::create_dir_all(out_dir)?;
    println!(
        "Analysing {} ({} Hz, {:.2}s)",
        input_path.display(),
        data.sample_rate,
        data.duration()
    );

    let style = PlotArgs { dpi, ..PlotArgs::default() };
    let labels = AxisLabels::new("Sound Envelope");
    let window = TimeWindow::new(morsewave_core::FIT_WINDOW_START_SECS, morsewave_core::FIT_WINDOW_END_SECS)?;

    let plots = [
        ("08a Received sound envelope - 1st word.png", TimeWindow::new(0.0, 1.0)?),
        ("08b Received sound envelope - 2nd word.png", TimeWindow::new(1.0, 2.0)?),
        ("09a Received sound period.png", window),
    ];

    for (file, plot_window) in plots {
        let path = out_dir.join(file);
        window_figure(&data, plot_window, &labels, style).save(&path)?;
        println!("Wrote {}", path.display());
    }

    let (report, fit) = fit_window(&data, window, &FitOptions::default())?;

    let path = out_dir.join("09b Received sound period - Fitted sinusoid.png");
    fitted_figure(&data, window, &fit, dpi).save(&path)?;
    println!("Wrote {}", path.display());

    let path = out_dir.join("fit.json");
    fs::write(&path, serde_json::to_string_pretty(&report)?)?;
    println!("Wrote {}", path.display());

    println!(
        "Fitted sinusoid: A={:.4}, f={:.2} Hz, phi={:.4} rad",
        report.amplitude, report.frequency, report.phase
    );
    Ok(())
}
