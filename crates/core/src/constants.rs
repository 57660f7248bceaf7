//! Fixed values shared across the sharing and disclosure services.

/// Alphabet used for share-token generation. 62 symbols keeps tokens
/// URL-safe without encoding.
pub const TOKEN_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default length of a generated share token.
pub const DEFAULT_TOKEN_LENGTH: usize = 40;

/// Minimum accepted share-token length. 32 symbols over a 62-symbol
/// alphabet gives ~190 bits, far beyond guessing range.
pub const MIN_TOKEN_LENGTH: usize = 32;

/// Lower clamp for a share link's time to live.
pub const TTL_MIN_HOURS: i64 = 4;

/// Upper clamp for a share link's time to live (one week).
pub const TTL_MAX_HOURS: i64 = 168;

/// TTL applied when a share request does not specify one.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Relative path a share link points at. The query string carries the
/// token and nothing else.
pub const SHARE_LINK_BASE: &str = "/provider/preview";

/// Longest provider note accepted through the portal, in characters.
pub const MAX_NOTE_CHARS: usize = 4000;

/// Default rate-limit window.
pub const DEFAULT_RATE_WINDOW_SECS: i64 = 900;

/// Default number of requests allowed per window per caller.
pub const DEFAULT_RATE_MAX_REQUESTS: u32 = 100;

/// Default and maximum number of events returned by an audit query.
pub const DEFAULT_AUDIT_QUERY_LIMIT: usize = 100;
