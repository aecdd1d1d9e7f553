use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_morsewave"))
        .args(args)
        .output()
        .expect("Failed to execute morsewave")
}

fn run_morsewave(args: &[&str]) -> String {
    let output = run(args);
    String::from_utf8_lossy(&output.stderr).to_string() + &String::from_utf8_lossy(&output.stdout)
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("Temp path is not valid UTF-8")
}

#[test]
fn test_morse_subcommand() {
    let output = run(&["morse", "ethan goon"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains(". - .... .- -. / --. --- --- -."),
        "Unexpected Morse output: {}",
        stdout
    );
    assert!(stdout.contains("ETHAN GOON"), "Missing decoded text: {}", stdout);
}

#[test]
fn test_morse_rejects_unknown_character() {
    let output = run(&["morse", "hi!"]);
    assert!(!output.status.success(), "Expected failure for '!'");
}

#[test]
fn test_encode_then_decode() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("message.wav");

    let output_text = run_morsewave(&["encode", "  ethan goon  ", path_str(&wav)]);
    assert!(output_text.contains("Wrote"), "Expected successful encoding but got: {}", output_text);
    assert!(wav.exists(), "Output file was not created");

    // 16-bit mono at 44.1 kHz, 0.1 s per slot
    let size = fs::metadata(&wav).unwrap().len();
    assert!(size > 44 + 2 * 4410 * 40, "File too small: {} bytes", size);

    let output = run(&["decode", path_str(&wav)]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ETHAN GOON"), "Decode mismatch: {}", stdout);
}

#[test]
fn test_encode_element_scheme_decodes() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("sos.wav");

    let output = run(&["encode", "--scheme", "element", "sos", path_str(&wav)]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let decoded = run_morsewave(&["decode", path_str(&wav)]);
    assert!(decoded.contains("SOS"), "Decode mismatch: {}", decoded);
}

#[test]
fn test_encode_with_plots() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("message.wav");
    let envelope = dir.path().join("envelope.png");
    let period = dir.path().join("period.png");

    let output = run(&[
        "encode",
        "ethan",
        path_str(&wav),
        "--envelope-png",
        path_str(&envelope),
        "--period-png",
        path_str(&period),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(envelope.exists(), "Envelope plot was not created");
    assert!(period.exists(), "Period plot was not created");
}

#[test]
fn test_plot_zoom() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("message.wav");
    let png = dir.path().join("zoom.png");

    assert!(run(&["encode", "ethan goon", path_str(&wav)]).status.success());

    let output = run(&[
        "plot",
        path_str(&wav),
        path_str(&png),
        "--start",
        "0.5",
        "--end",
        "0.505",
        "--zoom",
        "--normalize",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(png.exists(), "Zoom plot was not created");
}

#[test]
fn test_plot_rejects_inverted_window() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("message.wav");
    let png = dir.path().join("bad.png");

    assert!(run(&["encode", "e", path_str(&wav)]).status.success());

    let output = run(&["plot", path_str(&wav), path_str(&png), "--start", "0.2", "--end", "0.1"]);
    assert!(!output.status.success(), "Expected failure for inverted window");
    assert!(!png.exists());
}

#[test]
fn test_fit_json() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("message.wav");

    assert!(run(&["encode", "ethan goon", path_str(&wav)]).status.success());

    let output = run(&["fit", path_str(&wav), "--json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("Invalid JSON");
    let frequency = report["frequency"].as_f64().unwrap();
    let amplitude = report["amplitude"].as_f64().unwrap();
    assert!((frequency - 1760.0).abs() < 1.0, "Frequency {}", frequency);
    assert!((amplitude - 1.0).abs() < 0.01, "Amplitude {}", amplitude);
}

#[test]
fn test_analyse_writes_all_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("received.wav");
    let out_dir = dir.path().join("analysis");

    assert!(run(&["encode", "ethan goon", path_str(&wav)]).status.success());

    let output_text = run_morsewave(&["analyse", path_str(&wav), path_str(&out_dir)]);
    assert!(output_text.contains("Fitted sinusoid"), "Unexpected output: {}", output_text);

    for name in [
        "08a Received sound envelope - 1st word.png",
        "08b Received sound envelope - 2nd word.png",
        "09a Received sound period.png",
        "09b Received sound period - Fitted sinusoid.png",
        "fit.json",
    ] {
        assert!(out_dir.join(name).exists(), "Missing {}", name);
    }
}

fn encode_fixture(dir: &Path) -> std::path::PathBuf {
    let wav = dir.join("message.wav");
    assert!(run(&["encode", "ethan goon", path_str(&wav)]).status.success());
    wav
}

fn fit_json(args: &[&str]) -> serde_json::Value {
    let output = run(args);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("Invalid JSON")
}

#[test]
fn test_fit_raw_keeps_sample_units() {
    let dir = tempfile::tempdir().unwrap();
    let wav = encode_fixture(dir.path());

    let report = fit_json(&["fit", path_str(&wav), "--raw", "--json"]);
    let amplitude = report["amplitude"].as_f64().unwrap();
    assert!((amplitude - 10000.0).abs() < 20.0, "Amplitude {}", amplitude);
}

#[test]
fn test_fit_with_frequency_guess() {
    let dir = tempfile::tempdir().unwrap();
    let wav = encode_fixture(dir.path());

    let report = fit_json(&["fit", path_str(&wav), "--guess-frequency", "1750", "--json"]);
    let frequency = report["frequency"].as_f64().unwrap();
    assert!((frequency - 1760.0).abs() < 1.0, "Frequency {}", frequency);
}

#[test]
fn test_fit_png_at_high_dpi() {
    let dir = tempfile::tempdir().unwrap();
    let wav = encode_fixture(dir.path());
    let png = dir.path().join("fitted.png");

    let output = run(&["fit", path_str(&wav), "--png", path_str(&png), "--dpi", "300"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(image::image_dimensions(&png).expect("Fit plot not readable"), (3000, 1200));
}

#[test]
fn test_plot_dpi() {
    let dir = tempfile::tempdir().unwrap();
    let wav = encode_fixture(dir.path());
    let png = dir.path().join("envelope.png");

    let output = run(&["plot", path_str(&wav), path_str(&png), "--end", "1.0", "--dpi", "300"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(image::image_dimensions(&png).unwrap(), (3000, 1200));

    let default_png = dir.path().join("default.png");
    assert!(run(&["plot", path_str(&wav), path_str(&default_png)]).status.success());
    assert_eq!(image::image_dimensions(&default_png).unwrap(), (1000, 400));
}

#[test]
fn test_plot_rectify_with_labels() {
    let dir = tempfile::tempdir().unwrap();
    let wav = encode_fixture(dir.path());
    let png = dir.path().join("rectified.png");

    let output = run(&[
        "plot",
        path_str(&wav),
        path_str(&png),
        "--start",
        "1.4",
        "--end",
        "1.41",
        "--rectify",
        "--zoom",
        "--title",
        "Zoom into an On-Pulse Segment",
        "--y-label",
        "Signal (arbitrary units)",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(image::image_dimensions(&png).unwrap(), (1000, 400));
}

#[test]
fn test_decode_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let wav = encode_fixture(dir.path());

    let output = run(&["decode", path_str(&wav), "--threshold", "0.3"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("ETHAN GOON"));
}

#[test]
fn test_decode_without_alignment() {
    let dir = tempfile::tempdir().unwrap();
    let wav = encode_fixture(dir.path());

    // the encoder starts on a slot boundary, so the fixed grid still lines up
    let output = run(&["decode", path_str(&wav), "--no-align"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("ETHAN GOON"));
}
