//! Call notification signal
//!
//! A best-effort audible cue played when the display notices new calls.
//! Firing never blocks the caller: the tone schedule runs on a short-lived
//! thread, and every failure is logged and swallowed.

use crate::config::{NotificationConfig, SignalKind};
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A single sine tone with an exponential decay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: u32,
    /// Start offset from the beginning of the pattern
    pub offset: Duration,
    /// Time for the gain to decay from `peak_gain` to `floor_gain`
    pub duration: Duration,
    pub peak_gain: f32,
    pub floor_gain: f32,
}

/// The fixed two-tone call chime
#[derive(Debug, Clone, PartialEq)]
pub struct ChimePattern {
    tones: Vec<Tone>,
}

impl ChimePattern {
    /// 800Hz, then 1000Hz starting 200ms later; each decays over 0.5s
    pub fn standard() -> Self {
        let tone = |frequency_hz, offset_ms| Tone {
            frequency_hz,
            offset: Duration::from_millis(offset_ms),
            duration: Duration::from_millis(500),
            peak_gain: 0.3,
            floor_gain: 0.01,
        };
        Self {
            tones: vec![tone(800, 0), tone(1000, 200)],
        }
    }

    pub fn tones(&self) -> &[Tone] {
        &self.tones
    }

    /// Time from the first tone's start to the last tone's end
    pub fn total_duration(&self) -> Duration {
        self.tones
            .iter()
            .map(|t| t.offset + t.duration)
            .max()
            .unwrap_or_default()
    }
}

impl Default for ChimePattern {
    fn default() -> Self {
        Self::standard()
    }
}

/// Something that alerts onlookers that a ticket was called
pub trait NotificationSignal: Send + Sync {
    /// Play the cue; must return promptly and never fail
    fn fire(&self);

    fn name(&self) -> &'static str;
}

/// Run `play` once per tone at its offset on a detached thread
fn schedule(pattern: &ChimePattern, label: &'static str, play: impl Fn(&Tone) + Send + 'static) {
    let tones = pattern.tones().to_vec();
    let spawned = std::thread::Builder::new()
        .name(format!("chime-{}", label))
        .spawn(move || {
            let start = Instant::now();
            for tone in &tones {
                if let Some(wait) = tone.offset.checked_sub(start.elapsed()) {
                    std::thread::sleep(wait);
                }
                play(tone);
            }
        });

    if let Err(e) = spawned {
        tracing::warn!(signal = label, error = %e, "Failed to schedule notification");
    }
}

/// Rings the terminal bell once per tone
#[derive(Debug, Clone, Default)]
pub struct BellSignal {
    pattern: ChimePattern,
}

impl BellSignal {
    pub fn new(pattern: ChimePattern) -> Self {
        Self { pattern }
    }
}

impl NotificationSignal for BellSignal {
    fn fire(&self) {
        schedule(&self.pattern, "bell", |tone| {
            let mut stderr = std::io::stderr();
            if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
                tracing::debug!(frequency_hz = tone.frequency_hz, error = %e, "Bell unavailable");
            }
        });
    }

    fn name(&self) -> &'static str {
        "bell"
    }
}

/// Runs an external tone generator once per tone
///
/// The template is split on whitespace; `{freq}` and `{duration}` (seconds)
/// are substituted per tone, e.g. `play -q -n synth {duration} sine {freq}`.
#[derive(Debug, Clone)]
pub struct CommandSignal {
    template: String,
    pattern: ChimePattern,
}

impl CommandSignal {
    pub fn new(template: impl Into<String>, pattern: ChimePattern) -> Self {
        Self {
            template: template.into(),
            pattern,
        }
    }

    /// Program and arguments for one tone
    pub fn render(&self, tone: &Tone) -> Vec<String> {
        let freq = tone.frequency_hz.to_string();
        let duration = format!("{:.3}", tone.duration.as_secs_f64());
        self.template
            .split_whitespace()
            .map(|part| part.replace("{freq}", &freq).replace("{duration}", &duration))
            .collect()
    }
}

impl NotificationSignal for CommandSignal {
    fn fire(&self) {
        let this = self.clone();
        schedule(&self.pattern, "command", move |tone| {
            let argv = this.render(tone);
            let Some((program, args)) = argv.split_first() else {
                tracing::warn!("Notification command template is empty");
                return;
            };
            match Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
            {
                Ok(mut child) => {
                    std::thread::spawn(move || {
                        let _ = child.wait();
                    });
                }
                Err(e) => {
                    tracing::warn!(program = %program, error = %e, "Notification command failed");
                }
            }
        });
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

/// Logs the call cue instead of playing it
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSignal;

impl NotificationSignal for LogSignal {
    fn fire(&self) {
        tracing::info!("New call");
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSignal;

impl NotificationSignal for SilentSignal {
    fn fire(&self) {}

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Counts fires; shareable between the code under test and its assertions
#[derive(Debug, Clone, Default)]
pub struct CountingSignal {
    fired: Arc<AtomicUsize>,
}

impl CountingSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }
}

impl NotificationSignal for CountingSignal {
    fn fire(&self) {
        self.fired.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// Build the signal selected by the configuration
pub fn from_config(config: &NotificationConfig) -> Arc<dyn NotificationSignal> {
    let pattern = ChimePattern::standard();
    match config.kind {
        SignalKind::Bell => Arc::new(BellSignal::new(pattern)),
        SignalKind::Command => match config.command.as_deref() {
            Some(template) if !template.trim().is_empty() => {
                Arc::new(CommandSignal::new(template, pattern))
            }
            _ => {
                tracing::warn!("Notification kind 'command' has no template, falling back to log");
                Arc::new(LogSignal)
            }
        },
        SignalKind::Log => Arc::new(LogSignal),
        SignalKind::None => Arc::new(SilentSignal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_pattern() {
        let pattern = ChimePattern::standard();
        let tones = pattern.tones();

        assert_eq!(tones.len(), 2);
        assert_eq!(tones[0].frequency_hz, 800);
        assert_eq!(tones[1].frequency_hz, 1000);
        assert_eq!(tones[1].offset - tones[0].offset, Duration::from_millis(200));
        assert!(tones.iter().all(|t| t.duration == Duration::from_millis(500)));
        assert_eq!(pattern.total_duration(), Duration::from_millis(700));
    }

    #[test]
    fn test_command_render() {
        let signal = CommandSignal::new(
            "play -q -n synth {duration} sine {freq}",
            ChimePattern::standard(),
        );
        let argv = signal.render(&ChimePattern::standard().tones()[1]);
        assert_eq!(
            argv,
            vec!["play", "-q", "-n", "synth", "0.500", "sine", "1000"]
        );
    }

    #[test]
    fn test_missing_command_never_panics() {
        let signal = CommandSignal::new(
            "definitely-not-a-real-tone-player {freq}",
            ChimePattern::standard(),
        );
        signal.fire();
        std::thread::sleep(Duration::from_millis(300));
    }

    #[test]
    fn test_counting_signal_shares_state() {
        let signal = CountingSignal::new();
        let handle = signal.clone();
        signal.fire();
        signal.fire();
        assert_eq!(handle.count(), 2);
    }

    #[test]
    fn test_from_config() {
        let mut config = NotificationConfig::default();
        assert_eq!(from_config(&config).name(), "bell");

        config.kind = SignalKind::Command;
        config.command = None;
        assert_eq!(from_config(&config).name(), "log");

        config.command = Some("play {freq}".to_string());
        assert_eq!(from_config(&config).name(), "command");

        config.kind = SignalKind::None;
        assert_eq!(from_config(&config).name(), "none");
    }
}
