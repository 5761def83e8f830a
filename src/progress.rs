//! Preload progress reporting.
//!
//! Reports observable progress during `libflix preload` so users see how
//! many covers have been resolved and how many are left. Progress is
//! emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for preload.
#[derive(Clone, Debug)]
pub enum PreloadProgressEvent {
    /// Preload is starting over `total` items.
    Started { total: u64 },
    /// One item finished: `n` items done out of `total`.
    Resolved {
        id: String,
        ok: bool,
        n: u64,
        total: u64,
    },
}

/// Reports preload progress. Implementations write to stderr (human or JSON).
pub trait PreloadProgressReporter: Send + Sync {
    fn report(&self, event: PreloadProgressEvent);
}

/// Human-friendly progress on stderr: "preload  1,234 / 5,000 items  (hp1 ok)".
pub struct StderrProgress;

impl PreloadProgressReporter for StderrProgress {
    fn report(&self, event: PreloadProgressEvent) {
        let line = match &event {
            PreloadProgressEvent::Started { total } => {
                format!("preload  starting  {} items\n", format_number(*total))
            }
            PreloadProgressEvent::Resolved { id, ok, n, total } => format!(
                "preload  {} / {} items  ({} {})\n",
                format_number(*n),
                format_number(*total),
                id,
                if *ok { "ok" } else { "missing" }
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl PreloadProgressReporter for JsonProgress {
    fn report(&self, event: PreloadProgressEvent) {
        let obj = match &event {
            PreloadProgressEvent::Started { total } => serde_json::json!({
                "event": "progress",
                "phase": "started",
                "total": total
            }),
            PreloadProgressEvent::Resolved { id, ok, n, total } => serde_json::json!({
                "event": "progress",
                "phase": "resolving",
                "id": id,
                "ok": ok,
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl PreloadProgressReporter for NoProgress {
    fn report(&self, _event: PreloadProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Box<dyn PreloadProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
