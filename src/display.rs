//! Display sinks for meter readings.

use crate::audio::{Reading, WAITING_TEXT};
use serde::Serialize;
use std::io::{self, Write};

const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

pub trait DisplaySink {
    /// Show one reading. `progress` is already clamped to `[0, 1]`.
    fn render(&mut self, text: &str, progress: f32, over_threshold: bool) -> io::Result<()>;

    /// Surface a one-off notice to the user (permission refusal, device errors).
    fn notify(&mut self, message: &str) -> io::Result<()>;
}

/// Push the latest reading into a sink, or the waiting placeholder.
pub fn show_reading(sink: &mut dyn DisplaySink, reading: Option<Reading>) -> io::Result<()> {
    match reading {
        Some(reading) => sink.render(&reading.text(), reading.progress, reading.over_threshold),
        None => sink.render(WAITING_TEXT, 0.0, false),
    }
}

/// Horizontal bar of `width` cells filled proportionally to `progress`.
#[must_use]
pub fn format_bar(progress: f32, width: usize) -> String {
    let progress = if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    };
    let filled = (progress * width as f32).round() as usize;
    let mut bar = String::with_capacity(width * 3);
    for i in 0..width {
        bar.push(if i < filled { BAR_FULL } else { BAR_EMPTY });
    }
    bar
}

/// One line per reading, for pipes and dumb terminals.
pub struct LineSink<W: Write> {
    out: W,
    width: usize,
}

impl<W: Write> LineSink<W> {
    pub fn new(out: W, width: usize) -> Self {
        Self { out, width }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DisplaySink for LineSink<W> {
    fn render(&mut self, text: &str, progress: f32, over_threshold: bool) -> io::Result<()> {
        let warning = if over_threshold { "  !" } else { "" };
        writeln!(
            self.out,
            "Sound Meter: {text:>10} {}{warning}",
            format_bar(progress, self.width)
        )?;
        self.out.flush()
    }

    fn notify(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{message}")?;
        self.out.flush()
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum JsonEvent<'a> {
    Reading {
        text: &'a str,
        progress: f32,
        over_threshold: bool,
    },
    Notice {
        message: &'a str,
    },
}

/// JSON lines, one object per event, for external front ends.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, event: &JsonEvent<'_>) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write> DisplaySink for JsonSink<W> {
    fn render(&mut self, text: &str, progress: f32, over_threshold: bool) -> io::Result<()> {
        self.emit(&JsonEvent::Reading {
            text,
            progress,
            over_threshold,
        })
    }

    fn notify(&mut self, message: &str) -> io::Result<()> {
        self.emit(&JsonEvent::Notice { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn bar_fills_proportionally() {
        assert_eq!(format_bar(0.5, 4), "██░░");
        assert_eq!(format_bar(0.0, 3), "░░░");
        assert_eq!(format_bar(1.0, 3), "███");
        assert_eq!(format_bar(7.0, 2), "██");
        assert_eq!(format_bar(f32::NAN, 2), "░░");
    }

    #[test]
    fn line_sink_marks_warning() {
        let mut sink = LineSink::new(Vec::new(), 4);
        show_reading(&mut sink, Some(Reading::from_db(60.0))).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.contains("60.0 dB"));
        assert!(out.contains("██░░"));
        assert!(out.trim_end().ends_with('!'));
    }

    #[test]
    fn line_sink_shows_waiting_placeholder() {
        let mut sink = LineSink::new(Vec::new(), 2);
        show_reading(&mut sink, None).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.contains(WAITING_TEXT));
        assert!(!out.contains('!'));
    }

    #[test]
    fn json_sink_emits_reading_objects() {
        let mut sink = JsonSink::new(Vec::new());
        show_reading(&mut sink, Some(Reading::from_db(30.0))).unwrap();
        sink.notify("hello").unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<Value> = out
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines[0]["event"], "reading");
        assert_eq!(lines[0]["text"], "30.0 dB");
        assert_eq!(lines[0]["progress"], 0.25);
        assert_eq!(lines[0]["over_threshold"], false);
        assert_eq!(lines[1]["event"], "notice");
        assert_eq!(lines[1]["message"], "hello");
    }
}
