use crate::types::Pointer;

/// Buffer list request sent during the handshake.
const BUFFER_LIST_KEYS: &[&str] = &[
    "number",
    "name",
    "full_name",
    "short_name",
    "hidden",
    "title",
    "local_variables",
];

/// All text commands the client sends to the relay.
///
/// Commands are fire-and-forget: replies are matched by the shape of the
/// hdata that comes back, never by an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Authenticate and refuse compression.
    Init { password: String },

    /// Generic hdata request, e.g. `buffer:gui_buffers(*)`.
    HData { path: String, keys: Vec<String> },

    /// Backfill the last `count` lines of a buffer.
    FetchLines { buffer: Pointer, count: usize },

    /// Submit a line of input to a buffer, verbatim.
    Input { buffer: Pointer, text: String },

    /// Subscribe to every sync event.
    Sync,

    /// Request the nicklists of all buffers.
    Nicklist,

    /// Close the session.
    Quit,
}

impl Command {
    /// The commands sent right after the transport connects.
    pub fn handshake(password: &str, initial_lines: usize) -> Vec<Command> {
        vec![
            Command::Init {
                password: password.to_string(),
            },
            Command::HData {
                path: "buffer:gui_buffers(*)".to_string(),
                keys: BUFFER_LIST_KEYS.iter().map(|k| k.to_string()).collect(),
            },
            Command::HData {
                path: format!("buffer:gui_buffers(*)/lines/last_line(-{initial_lines})/data"),
                keys: Vec::new(),
            },
            Command::HData {
                path: "hotlist:gui_hotlist(*)".to_string(),
                keys: Vec::new(),
            },
            Command::Sync,
            Command::Nicklist,
        ]
    }

    /// Render the command line, newline included.
    pub fn to_line(&self) -> String {
        match self {
            Command::Init { password } => {
                format!("init password={password},compression=off\n")
            }
            Command::HData { path, keys } if keys.is_empty() => format!("hdata {path}\n"),
            Command::HData { path, keys } => format!("hdata {path} {}\n", keys.join(",")),
            Command::FetchLines { buffer, count } => {
                format!("hdata buffer:{buffer}/lines/last_line(-{count})/data\n")
            }
            Command::Input { buffer, text } => format!("input {buffer} {text}\n"),
            Command::Sync => "sync\n".to_string(),
            Command::Nicklist => "nicklist\n".to_string(),
            Command::Quit => "quit\n".to_string(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_line().into_bytes()
    }
}
