// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use tracing::{debug, info, span, warn, Level};

use super::{InputEvent, Key};
use crate::keymap::KeyIdentifier;

/// How long a key may go without a repeat before it counts as released, on
/// terminals that only report presses. Longer than the usual OS repeat delay.
pub const RELEASE_TIMEOUT: Duration = Duration::from_millis(600);

/// Set while this process holds the terminal in raw mode.
static RAW_MODE: AtomicBool = AtomicBool::new(false);

/// Puts the terminal back the way it was found.
struct RawModeGuard {
    enhanced: bool,
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        }
        if let Err(e) = terminal::disable_raw_mode() {
            warn!(err = %e, "Unable to restore terminal");
        }
        RAW_MODE.store(false, Ordering::SeqCst);
    }
}

/// Log output that stays readable while the terminal is in raw mode, where a
/// bare newline no longer returns the cursor to the first column.
pub struct LogWriter<W> {
    inner: W,
    raw: bool,
}

impl LogWriter<io::Stderr> {
    /// Standard error, translating newlines only while the keyboard driver
    /// holds raw mode.
    pub fn stderr() -> LogWriter<io::Stderr> {
        LogWriter::new(io::stderr(), RAW_MODE.load(Ordering::SeqCst))
    }
}

impl<W: Write> LogWriter<W> {
    pub fn new(inner: W, raw: bool) -> LogWriter<W> {
        LogWriter { inner, raw }
    }
}

impl<W: Write> Write for LogWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.raw {
            return self.inner.write(buf);
        }
        for (i, line) in buf.split(|b| *b == b'\n').enumerate() {
            if i > 0 {
                self.inner.write_all(b"\r\n")?;
            }
            self.inner.write_all(line)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Turns terminal key events into input events.
///
/// Terminals that report key releases are passed through. Everywhere else a
/// held key shows up as a stream of presses from auto-repeat, so the first
/// press sounds the key and the key is released once its presses stop for
/// [RELEASE_TIMEOUT].
struct Translator {
    releases: bool,
    held: HashMap<KeyIdentifier, Instant>,
}

impl Translator {
    fn new(releases: bool) -> Translator {
        Translator {
            releases,
            held: HashMap::new(),
        }
    }

    fn translate(&mut self, event: KeyEvent, now: Instant) -> Option<InputEvent> {
        let pressed = matches!(event.kind, KeyEventKind::Press | KeyEventKind::Repeat);
        match event.code {
            KeyCode::Char('c') | KeyCode::Char('C')
                if event.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                pressed.then_some(InputEvent::Quit)
            }
            KeyCode::Esc => pressed.then_some(InputEvent::KeyDown(Key::Escape)),
            KeyCode::Char(c) => {
                let key = KeyIdentifier::new(c);
                if self.releases {
                    return Some(if pressed {
                        InputEvent::KeyDown(Key::Char(key))
                    } else {
                        InputEvent::KeyUp(Key::Char(key))
                    });
                }
                if !pressed {
                    return None;
                }
                match self.held.insert(key, now) {
                    None => Some(InputEvent::KeyDown(Key::Char(key))),
                    Some(_) => None,
                }
            }
            _ => None,
        }
    }

    /// Releases every held key whose last press is at least [RELEASE_TIMEOUT] old.
    fn expire(&mut self, now: Instant) -> Vec<InputEvent> {
        let mut expired: Vec<KeyIdentifier> = self
            .held
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(**last) >= RELEASE_TIMEOUT)
            .map(|(key, _)| *key)
            .collect();
        expired.sort();
        expired
            .into_iter()
            .map(|key| {
                self.held.remove(&key);
                InputEvent::KeyUp(Key::Char(key))
            })
            .collect()
    }

    /// Time until the next held key expires, or None when nothing is held.
    fn next_timeout(&self, now: Instant) -> Option<Duration> {
        self.held
            .values()
            .map(|last| RELEASE_TIMEOUT.saturating_sub(now.saturating_duration_since(*last)))
            .min()
    }
}

/// Plays the piano from the terminal keyboard.
///
/// Raw mode is held for as long as the driver exists.
pub struct Driver {
    releases: bool,
    _guard: RawModeGuard,
}

impl Driver {
    /// Switches the terminal to raw mode and asks for key release reporting.
    pub fn new() -> Result<Driver, io::Error> {
        let releases = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if !releases {
            info!(
                timeout = ?RELEASE_TIMEOUT,
                "Terminal does not report key releases, keys release once auto-repeat stops"
            );
        }
        terminal::enable_raw_mode()?;
        RAW_MODE.store(true, Ordering::SeqCst);
        let guard = RawModeGuard {
            enhanced: releases,
        };
        if releases {
            execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        Ok(Driver {
            releases,
            _guard: guard,
        })
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<InputEvent>) -> JoinHandle<Result<(), io::Error>> {
        let releases = self.releases;
        thread::spawn(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!(releases, "Keyboard driver started.");
            let mut translator = Translator::new(releases);
            let send = |input: InputEvent| {
                debug!(event = ?input, "Key event");
                events_tx.send(input).is_ok()
            };
            loop {
                let ready = match translator.next_timeout(Instant::now()) {
                    Some(timeout) => event::poll(timeout)?,
                    None => true,
                };
                if ready {
                    if let Event::Key(key_event) = event::read()? {
                        if let Some(input) = translator.translate(key_event, Instant::now()) {
                            if !send(input) {
                                return Ok(());
                            }
                        }
                    }
                }
                for input in translator.expire(Instant::now()) {
                    if !send(input) {
                        return Ok(());
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, kind)
    }

    fn press(c: char) -> KeyEvent {
        key(KeyCode::Char(c), KeyEventKind::Press)
    }

    fn down(c: char) -> Option<InputEvent> {
        Some(InputEvent::KeyDown(Key::from(c)))
    }

    fn up(c: char) -> Option<InputEvent> {
        Some(InputEvent::KeyUp(Key::from(c)))
    }

    #[test]
    fn test_release_reporting_terminal() {
        let mut translator = Translator::new(true);
        let now = Instant::now();
        assert_eq!(
            translator.translate(key(KeyCode::Char('A'), KeyEventKind::Press), now),
            down('a')
        );
        assert_eq!(
            translator.translate(key(KeyCode::Char('a'), KeyEventKind::Repeat), now),
            down('a')
        );
        assert_eq!(
            translator.translate(key(KeyCode::Char('a'), KeyEventKind::Release), now),
            up('a')
        );
        assert_eq!(translator.next_timeout(now), None);
        assert!(translator.expire(now + RELEASE_TIMEOUT).is_empty());
    }

    #[test]
    fn test_auto_repeat_holds_one_note() {
        let mut translator = Translator::new(false);
        let start = Instant::now();
        assert_eq!(translator.translate(press('s'), start), down('s'));

        // Initial repeat delay, then the repeat stream.
        let mut last = start + Duration::from_millis(500);
        for _ in 0..20 {
            assert_eq!(translator.translate(press('s'), last), None);
            assert!(translator.expire(last).is_empty());
            last += Duration::from_millis(30);
        }
        last -= Duration::from_millis(30);

        let almost = last + RELEASE_TIMEOUT - Duration::from_millis(1);
        assert_eq!(
            translator.next_timeout(almost),
            Some(Duration::from_millis(1))
        );
        assert!(translator.expire(almost).is_empty());
        assert_eq!(
            translator.expire(last + RELEASE_TIMEOUT),
            vec![InputEvent::KeyUp(Key::from('s'))]
        );
        assert_eq!(translator.next_timeout(last + RELEASE_TIMEOUT), None);

        // Once released the key can sound again.
        let again = last + RELEASE_TIMEOUT * 2;
        assert_eq!(translator.translate(press('s'), again), down('s'));
    }

    #[test]
    fn test_held_keys_expire_independently() {
        let mut translator = Translator::new(false);
        let start = Instant::now();
        assert_eq!(translator.translate(press('s'), start), down('s'));
        let later = start + Duration::from_millis(200);
        assert_eq!(translator.translate(press('d'), later), down('d'));

        assert_eq!(
            translator.next_timeout(later),
            Some(RELEASE_TIMEOUT - Duration::from_millis(200))
        );
        assert_eq!(
            translator.expire(start + RELEASE_TIMEOUT),
            vec![InputEvent::KeyUp(Key::from('s'))]
        );
        assert_eq!(
            translator.expire(later + RELEASE_TIMEOUT),
            vec![InputEvent::KeyUp(Key::from('d'))]
        );
    }

    #[test]
    fn test_control_keys() {
        let mut translator = Translator::new(true);
        let now = Instant::now();
        assert_eq!(
            translator.translate(
                KeyEvent::new_with_kind(
                    KeyCode::Char('c'),
                    KeyModifiers::CONTROL,
                    KeyEventKind::Press
                ),
                now
            ),
            Some(InputEvent::Quit)
        );
        assert_eq!(
            translator.translate(key(KeyCode::Esc, KeyEventKind::Press), now),
            Some(InputEvent::KeyDown(Key::Escape))
        );
        assert_eq!(
            translator.translate(key(KeyCode::Esc, KeyEventKind::Release), now),
            None
        );
        assert_eq!(
            translator.translate(key(KeyCode::F(1), KeyEventKind::Press), now),
            None
        );
    }

    #[test]
    fn test_log_writer_in_raw_mode() {
        let mut writer = LogWriter::new(Vec::new(), true);
        writer.write_all(b"Stopping playback\nDone\n").unwrap();
        assert_eq!(writer.inner, b"Stopping playback\r\nDone\r\n");

        let mut writer = LogWriter::new(Vec::new(), false);
        writer.write_all(b"Stopping playback\n").unwrap();
        assert_eq!(writer.inner, b"Stopping playback\n");
    }
}
