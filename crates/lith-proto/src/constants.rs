/// Frame preamble: 4-byte big-endian total length plus 1-byte compression flag.
pub const FRAME_PREAMBLE_LEN: usize = 5;

/// Default largest frame the reader will buffer (32 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 32 * 1024 * 1024;

/// Length field value marking an absent string or buffer.
pub const ABSENT_LEN: u32 = u32::MAX;

/// Deepest array/table nesting accepted inside one object.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Default relay port.
pub const DEFAULT_RELAY_PORT: u16 = 9001;

/// Lines requested per history page, and per buffer during the handshake.
pub const HISTORY_PAGE_SIZE: usize = 25;

/// The only hdata path with more than two segments the client accepts.
pub const LINE_DATA_PATH: &str = "buffer/lines/line/line_data";

/// Path segment names carrying structural meaning.
pub const SEGMENT_BUFFER: &str = "buffer";
pub const SEGMENT_LINE_DATA: &str = "line_data";
pub const SEGMENT_NICKLIST_ITEM: &str = "nicklist_item";
pub const SEGMENT_HOTLIST: &str = "hotlist";

/// Message ids of relay events the store treats specially.
pub const EVENT_NICKLIST: &str = "_nicklist";
pub const EVENT_NICKLIST_DIFF: &str = "_nicklist_diff";
