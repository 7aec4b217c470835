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
use std::io;
use std::thread;
use std::time::Duration;

use tracing::{info, span, warn, Level};

use crate::input::{KeyRouter, NoteSink};

const QUIT: &str = "quit";

/// Plays keys typed on the terminal.
///
/// Each line holds whitespace separated groups of key symbols. The symbols of a
/// group are pressed together, held, then released before the next group:
/// "1 qe 5" plays C3, then F4 and A4 together, then G3.
pub struct Driver<S: NoteSink> {
    router: KeyRouter<S>,
    hold: Duration,
}

impl<S: NoteSink> Driver<S> {
    pub fn new(router: KeyRouter<S>, hold: Duration) -> Driver<S> {
        Driver { router, hold }
    }

    /// Reads stdin until it closes or the user quits.
    pub fn run(&mut self) -> Result<(), io::Error> {
        let span = span!(Level::INFO, "terminal driver");
        let _enter = span.enter();

        info!("Terminal driver started.");
        while self.monitor_io(io::stdin().lock(), io::stdout())? {}
        self.router.release_all();
        info!("Terminal driver stopped.");
        Ok(())
    }

    /// Handles one line of input. Returns false once there's nothing more to read.
    fn monitor_io<R, W>(&mut self, mut reader: R, mut writer: W) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "Keys (separate chords with spaces, {} to exit): ", QUIT)?;
        writer.flush()?;

        let mut input = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }
        if input.trim().eq_ignore_ascii_case(QUIT) {
            return Ok(false);
        }

        for chord in input.split_whitespace() {
            self.play_chord(chord, &mut writer)?;
        }
        Ok(true)
    }

    fn play_chord<W: io::Write>(&mut self, chord: &str, writer: &mut W) -> Result<(), io::Error> {
        let mut held: Vec<String> = Vec::new();
        for symbol in chord.chars().map(String::from) {
            let Some(label) = self
                .router
                .keymap()
                .resolve_symbol(&symbol)
                .map(|note| note.display_label().to_string())
            else {
                warn!(symbol, "Unknown key");
                continue;
            };

            if self.router.press(&symbol) {
                writeln!(writer, "{} -> {}", symbol, label)?;
                held.push(symbol);
            }
        }

        if held.is_empty() {
            return Ok(());
        }
        if !self.hold.is_zero() {
            thread::sleep(self.hold);
        }
        for symbol in held.iter() {
            self.router.release(symbol);
        }
        Ok(())
    }
}
