use std::fmt::Write;

use crate::emotion::{Emotion, EmotionResult};

const BAR_WIDTH: usize = 30;

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Horizontal bar proportional to `percent` (0..=100)
pub fn bar(percent: u8) -> String {
    let filled = usize::from(percent.min(100)) * BAR_WIDTH / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

fn line(out: &mut String, emotion: Emotion, percent: u8) {
    let _ = writeln!(
        out,
        "  {:<9} {} {:>3}%",
        capitalize(emotion.as_str()),
        bar(percent),
        percent
    );
}

/// Dominant emotion headline followed by all emotions, highest first
pub fn render(result: &EmotionResult) -> String {
    let (dominant, pct) = result.dominant();
    let mut out = String::new();

    let _ = writeln!(out, "Dominant Emotion Detected: {} ({}%)", capitalize(dominant.as_str()), pct);
    let _ = writeln!(out, "  {}", bar(pct));
    let _ = writeln!(out);
    let _ = writeln!(out, "All Detected Emotions");
    for (emotion, percent) in result.ranked() {
        line(&mut out, emotion, percent);
    }

    out
}
