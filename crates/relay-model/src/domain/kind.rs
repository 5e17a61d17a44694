use std::fmt;

/// The four pluggable backend roles a worker is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Queue,
    Uploader,
    Downloader,
    Heartbeater,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Queue,
        BackendKind::Uploader,
        BackendKind::Downloader,
        BackendKind::Heartbeater,
    ];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Queue => "queue",
            BackendKind::Uploader => "uploader",
            BackendKind::Downloader => "downloader",
            BackendKind::Heartbeater => "heartbeater",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
