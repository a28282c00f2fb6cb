//! Contains the input side of sightkeys: the events produced by a MIDI keyboard, the devices from
//! which they are read, and the lookup from note names to the key codes carried by those events.
//!
//! Devices are read from raw MIDI nodes, such as the `/dev/snd/midiC1D0` nodes exposed by ALSA.
//! The node is opened in non-blocking mode, so polling a device returns immediately with whatever
//! bytes have arrived since the last poll. The bytes are decoded with `midly`, which takes care of
//! running status and of messages split across two reads.

use midly::{MidiMessage, live::LiveEvent, stream::MidiStream};
use std::{
    fs::{File, OpenOptions},
    io::{ErrorKind, Read},
    path::{Path, PathBuf},
    time::Instant,
};
use walkdir::WalkDir;

use crate::{data::music::notes::Pitch, error::DeviceError};

/// The prefix of the file names of raw MIDI nodes.
const RAW_MIDI_PREFIX: &str = "midi";

/// The number of bytes read from a device at once.
const READ_BUFFER_SIZE: usize = 256;

/// Whether a key was pressed or released.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyAction {
    /// The key was pressed.
    NoteOn,

    /// The key was released.
    NoteOff,
}

/// A key event read from an input device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeviceEvent {
    /// The MIDI key number.
    pub key_code: u8,

    /// The velocity with which the key was pressed or released.
    pub velocity: u8,

    /// The time at which the event was decoded, in milliseconds since the device was opened.
    pub timestamp_ms: u64,

    /// Whether the key was pressed or released.
    pub action: KeyAction,
}

impl DeviceEvent {
    /// Returns a key press event with a timestamp of zero.
    #[must_use]
    pub fn note_on(key_code: u8) -> Self {
        Self {
            key_code,
            velocity: 64,
            timestamp_ms: 0,
            action: KeyAction::NoteOn,
        }
    }

    /// Returns a key release event with a timestamp of zero.
    #[must_use]
    pub fn note_off(key_code: u8) -> Self {
        Self {
            key_code,
            velocity: 0,
            timestamp_ms: 0,
            action: KeyAction::NoteOff,
        }
    }

    /// Classifies a decoded MIDI event. Returns `None` for anything other than a note message. A
    /// note-on message with zero velocity is a release, as sent by keyboards using running status.
    #[must_use]
    pub fn from_live_event(event: &LiveEvent, timestamp_ms: u64) -> Option<Self> {
        let LiveEvent::Midi { message, .. } = event else {
            return None;
        };
        let (key, vel, action) = match *message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => (key, vel, KeyAction::NoteOff),
            MidiMessage::NoteOn { key, vel } => (key, vel, KeyAction::NoteOn),
            MidiMessage::NoteOff { key, vel } => (key, vel, KeyAction::NoteOff),
            _ => return None,
        };
        Some(Self {
            key_code: key.as_int(),
            velocity: vel.as_int(),
            timestamp_ms,
            action,
        })
    }
}

/// A source of key events.
pub trait InputDevice {
    /// Returns all the events received since the last call. Never blocks.
    fn poll(&mut self) -> Result<Vec<DeviceEvent>, DeviceError>;
}

/// An input device that decodes a stream of raw MIDI bytes.
pub struct MidiByteInput<R: Read> {
    /// The source of the raw bytes. Reads must not block.
    reader: R,

    /// The decoder, which keeps partial messages and the running status between reads.
    stream: MidiStream,

    /// The time at which the device was opened.
    opened_at: Instant,
}

impl<R: Read> MidiByteInput<R> {
    /// Creates a device reading from the given source.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            stream: MidiStream::new(),
            opened_at: Instant::now(),
        }
    }
}

impl<R: Read> InputDevice for MidiByteInput<R> {
    fn poll(&mut self) -> Result<Vec<DeviceEvent>, DeviceError> {
        let mut events = Vec::new();
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        loop {
            let read = match self.reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(DeviceError::Read(e)),
            };

            let timestamp_ms = self.opened_at.elapsed().as_millis() as u64;
            self.stream.feed(&buffer[..read], |event| {
                if let Some(event) = DeviceEvent::from_live_event(&event, timestamp_ms) {
                    events.push(event);
                }
            });
        }
        Ok(events)
    }
}

/// A MIDI device found on the system.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceInfo {
    /// The ID of the device, its index in the sorted list of discovered devices.
    pub id: usize,

    /// The file name of the device node.
    pub name: String,

    /// The path to the device node.
    pub path: PathBuf,

    /// Whether the node can be opened for reading.
    pub input: bool,
}

/// Lists the raw MIDI nodes in the given directory, sorted by name.
pub fn discover_devices(directory: &Path) -> Vec<DeviceInfo> {
    let mut paths: Vec<PathBuf> = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(RAW_MIDI_PREFIX))
        })
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();

    paths
        .into_iter()
        .enumerate()
        .map(|(id, path)| DeviceInfo {
            id,
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            input: File::open(&path).is_ok(),
            path,
        })
        .collect()
}

/// Selects the device to read from. If an ID is given, that device must exist and accept input.
/// Otherwise, the first device that accepts input is selected.
pub fn select_device(
    devices: &[DeviceInfo],
    device_id: Option<usize>,
) -> Result<DeviceInfo, DeviceError> {
    match device_id {
        Some(id) => {
            let device = devices
                .iter()
                .find(|d| d.id == id)
                .ok_or(DeviceError::NotFound(id))?;
            if !device.input {
                return Err(DeviceError::NoInputCapableDevice);
            }
            Ok(device.clone())
        }
        None => devices
            .iter()
            .find(|d| d.input)
            .cloned()
            .ok_or(DeviceError::NoInputCapableDevice),
    }
}

/// Opens a raw MIDI node for non-blocking reads.
pub fn open_raw_midi(path: &Path) -> Result<MidiByteInput<File>, DeviceError> {
    let mut options = OpenOptions::new();
    options.read(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.custom_flags(libc::O_NONBLOCK);
    }
    let file = options
        .open(path)
        .map_err(|e| DeviceError::Open(path.to_path_buf(), e))?;
    Ok(MidiByteInput::new(file))
}

/// Resolves note names to the key codes carried by device events.
pub trait KeyLookup {
    /// Returns the key code of the note with the given name.
    fn key_code(&self, note_name: &str) -> Option<u8>;
}

/// Resolves note names written in scientific pitch notation to MIDI key numbers. Middle C (`C4`)
/// is key 60.
#[derive(Clone, Copy, Debug, Default)]
pub struct MidiKeyLookup;

impl KeyLookup for MidiKeyLookup {
    fn key_code(&self, note_name: &str) -> Option<u8> {
        note_name.parse::<Pitch>().ok()?.midi_key()
    }
}

#[cfg(test)]
mod test {
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use std::io::{self, Cursor, Read};
    use tempfile::TempDir;

    use super::*;

    fn without_timestamps(events: Vec<DeviceEvent>) -> Vec<DeviceEvent> {
        events
            .into_iter()
            .map(|e| DeviceEvent {
                timestamp_ms: 0,
                ..e
            })
            .collect()
    }

    /// Verifies decoding note messages from a byte stream.
    #[test]
    fn decode_note_messages() -> Result<()> {
        let bytes = vec![
            0x90, 60, 100, // Note on, channel 1.
            64, 90, // Running status.
            0xB0, 64, 127, // Sustain pedal, ignored.
            0x80, 60, 0, // Note off.
            0x90, 64, 0, // Note on with zero velocity.
        ];
        let mut device = MidiByteInput::new(Cursor::new(bytes));
        let events = without_timestamps(device.poll()?);
        assert_eq!(
            events,
            vec![
                DeviceEvent {
                    velocity: 100,
                    ..DeviceEvent::note_on(60)
                },
                DeviceEvent {
                    velocity: 90,
                    ..DeviceEvent::note_on(64)
                },
                DeviceEvent::note_off(60),
                DeviceEvent::note_off(64),
            ]
        );

        // The stream is exhausted.
        assert!(device.poll()?.is_empty());
        Ok(())
    }

    /// A reader that returns its chunks one read at a time and then reports that it would block.
    struct ChunkedReader {
        chunks: Vec<Vec<u8>>,
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Err(io::Error::from(ErrorKind::WouldBlock));
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    /// Verifies that a message split across two reads is decoded once complete.
    #[test]
    fn decode_split_message() -> Result<()> {
        let mut device = MidiByteInput::new(ChunkedReader {
            chunks: vec![vec![0x91, 67], vec![80]],
        });
        let events = without_timestamps(device.poll()?);
        assert_eq!(
            events,
            vec![DeviceEvent {
                velocity: 80,
                ..DeviceEvent::note_on(67)
            }]
        );
        Ok(())
    }

    /// Verifies that read errors other than blocking are reported.
    #[test]
    fn read_error() {
        struct BrokenReader;
        impl Read for BrokenReader {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::from(ErrorKind::BrokenPipe))
            }
        }
        let mut device = MidiByteInput::new(BrokenReader);
        assert!(matches!(device.poll(), Err(DeviceError::Read(_))));
    }

    /// Verifies discovering and selecting devices.
    #[test]
    fn discover_and_select() -> Result<()> {
        let temp_dir = TempDir::new()?;
        std::fs::write(temp_dir.path().join("midiC1D0"), b"")?;
        std::fs::write(temp_dir.path().join("midiC0D0"), b"")?;
        std::fs::write(temp_dir.path().join("pcmC0D0p"), b"")?;

        let devices = discover_devices(temp_dir.path());
        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["midiC0D0", "midiC1D0"]);
        assert!(devices.iter().all(|d| d.input));

        assert_eq!(select_device(&devices, None)?.name, "midiC0D0");
        assert_eq!(select_device(&devices, Some(1))?.name, "midiC1D0");
        assert!(matches!(
            select_device(&devices, Some(5)),
            Err(DeviceError::NotFound(5))
        ));
        Ok(())
    }

    /// Verifies that selection fails when no device accepts input.
    #[test]
    fn no_input_capable_device() {
        assert!(matches!(
            select_device(&[], None),
            Err(DeviceError::NoInputCapableDevice)
        ));

        let output_only = DeviceInfo {
            id: 0,
            name: "midiC0D0".to_string(),
            path: PathBuf::from("/nonexistent/midiC0D0"),
            input: false,
        };
        assert!(matches!(
            select_device(&[output_only.clone()], None),
            Err(DeviceError::NoInputCapableDevice)
        ));
        assert!(matches!(
            select_device(&[output_only], Some(0)),
            Err(DeviceError::NoInputCapableDevice)
        ));
    }

    /// Verifies opening a raw MIDI node from disk.
    #[test]
    fn open_node() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("midiC0D0");
        std::fs::write(&path, [0x90, 72, 50])?;

        let mut device = open_raw_midi(&path)?;
        let events = device.poll()?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key_code, 72);
        assert!(matches!(
            open_raw_midi(&temp_dir.path().join("midiC9D9")),
            Err(DeviceError::Open(..))
        ));
        Ok(())
    }

    /// Verifies that a node with no data and no writer neither blocks on open nor on read.
    #[cfg(unix)]
    #[test]
    fn open_node_without_data() -> Result<()> {
        use std::{ffi::CString, io::Write, os::unix::ffi::OsStrExt};

        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("midiC0D0");
        let c_path = CString::new(path.as_os_str().as_bytes())?;
        // SAFETY: the path is a valid NUL-terminated string.
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

        let mut device = open_raw_midi(&path)?;
        assert!(device.poll()?.is_empty());

        let mut writer = OpenOptions::new().write(true).open(&path)?;
        assert!(device.poll()?.is_empty());
        writer.write_all(&[0x90, 60, 70])?;
        writer.flush()?;
        let events = device.poll()?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key_code, 60);
        Ok(())
    }

    /// Verifies resolving note names to key codes.
    #[test]
    fn key_lookup() {
        let lookup = MidiKeyLookup;
        assert_eq!(lookup.key_code("C4"), Some(60));
        assert_eq!(lookup.key_code("F#3"), Some(54));
        assert_eq!(lookup.key_code("B♭5"), Some(82));
        assert_eq!(lookup.key_code("middle C"), None);
    }
}
