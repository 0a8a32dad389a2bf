// https://www.rfc-editor.org/rfc/rfc9113.html#name-settings
use std::num::NonZeroU32;

/// HTTP/2 Settings.
///
/// Streams read `initial_window_size` once, when they become active.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// This setting allows the sender to inform the remote endpoint of the maximum size of the
    /// compression table used to decode field blocks, in units of octets.
    pub header_table_size: u32,
    /// This setting can be used to enable or disable server push.
    pub enable_push: bool,
    /// This setting indicates the maximum number of concurrent streams that the sender will allow.
    pub max_concurrent_streams: u32,
    /// This setting indicates the sender's initial window size (in units of octets) for
    /// stream-level flow control
    pub initial_window_size: u32,
    /// This setting indicates the size of the largest frame payload that the sender is willing to
    /// receive, in units of octets.
    pub max_frame_size: u32,
    /// This advisory setting informs a peer of the maximum field section size that the sender is
    /// prepared to accept, in units of octets.
    pub max_header_list_size: Option<NonZeroU32>,
}

impl Settings {
    pub const DEFAULT_WINDOW_SIZE: u32 = 65_535;
    pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16_384;

    /// Creates new [`Settings`].
    pub fn new() -> Self {
        Self {
            header_table_size: 4096,
            enable_push: true,
            max_concurrent_streams: 100,
            initial_window_size: Self::DEFAULT_WINDOW_SIZE,
            max_frame_size: Self::DEFAULT_MAX_FRAME_SIZE,
            max_header_list_size: None, // default is unlimited
        }
    }
}

impl Default for Settings {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::Settings;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.initial_window_size, 65_535);
        assert_eq!(settings.max_frame_size, 16_384);
        assert!(settings.enable_push);
        assert_eq!(settings.max_header_list_size, None);
    }
}
