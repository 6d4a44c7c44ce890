use colored::*;
use indicatif::ProgressStyle;
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;

const TIPS: &[&str] = &["You can press 'q' to finish early"];

/// Spinner used for every progress span.
pub fn style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&[
            "▁▁▁▁▁",
            "▁▂▂▂▁",
            "▁▄▂▄▁",
            "▂▄▆▄▂",
            "▄▆█▆▄",
            "▂▄▆▄▂",
            "▁▄▂▄▁",
            "▁▂▂▂▁",
        ])
}

/// Shows a hint until the first job completes.
pub fn start_probe_spinner(span: &Span, interactive: bool) {
    let message = if interactive {
        format!("{}", TIPS[0].italic().white())
    } else {
        String::from("Waiting for replies...")
    };
    span.pb_set_message(&message);
}

pub fn report_probe_progress(span: &Span, done: usize, total: usize, open: usize) {
    span.pb_set_message(&format!(
        "Probed {done}/{total} ports, {} open so far...",
        open.to_string().green().bold()
    ));
}
