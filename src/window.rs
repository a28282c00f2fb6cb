//! Contains the source of window events, through which the student asks to quit.

use std::{
    io::{self, BufRead, BufReader},
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
};

/// An event sent by the window system.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WindowEvent {
    /// The student closed the window or asked to quit.
    Quit,

    /// Any other event, which the session ignores.
    Other(String),
}

/// A source of window events.
pub trait WindowEvents {
    /// Returns all the events received since the last call. Never blocks.
    fn poll(&mut self) -> Vec<WindowEvent>;
}

/// Window events read from lines of text, such as the standard input of a terminal. A line
/// containing `q` or `quit`, or the end of the input, closes the window.
pub struct LineWindow {
    /// The lines read by the background reader. Disconnected once the input ends.
    lines: Receiver<String>,

    /// Whether the end of the input was already reported.
    closed: bool,
}

impl LineWindow {
    /// Starts reading lines from the given input in the background. Reading a line blocks, so it
    /// cannot happen on the thread running the session.
    pub fn spawn<R: BufRead + Send + 'static>(input: R) -> Self {
        let (sender, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in input.lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
        });
        Self {
            lines,
            closed: false,
        }
    }

    /// Reads window events from the standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::spawn(BufReader::new(io::stdin()))
    }
}

impl WindowEvents for LineWindow {
    fn poll(&mut self) -> Vec<WindowEvent> {
        let mut events = Vec::new();
        if self.closed {
            events.push(WindowEvent::Quit);
            return events;
        }

        loop {
            match self.lines.try_recv() {
                Ok(line) => match line.trim() {
                    "q" | "quit" => events.push(WindowEvent::Quit),
                    other => events.push(WindowEvent::Other(other.to_string())),
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    events.push(WindowEvent::Quit);
                    break;
                }
            }
        }
        events
    }
}
