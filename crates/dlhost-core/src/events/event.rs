//! Lifecycle event vocabulary and payloads.

use serde::Serialize;

use crate::jobs::{JobId, PackageId};

/// The fixed, non-extensible event vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DownloadStart,
    DownloadFinished,
    DownloadFailed,
    DownloadProcessed,
    PackageProcessed,
    PackageDeleted,
    PackageFailed,
    LinksAdded,
    ConfigChanged,
    BeforeReconnect,
    AfterReconnect,
    CaptchaTask,
    CaptchaCorrect,
    CaptchaInvalid,
    AllDownloadsFinished,
    AllDownloadsProcessed,
}

impl EventKind {
    pub const ALL: [EventKind; 16] = [
        EventKind::DownloadStart,
        EventKind::DownloadFinished,
        EventKind::DownloadFailed,
        EventKind::DownloadProcessed,
        EventKind::PackageProcessed,
        EventKind::PackageDeleted,
        EventKind::PackageFailed,
        EventKind::LinksAdded,
        EventKind::ConfigChanged,
        EventKind::BeforeReconnect,
        EventKind::AfterReconnect,
        EventKind::CaptchaTask,
        EventKind::CaptchaCorrect,
        EventKind::CaptchaInvalid,
        EventKind::AllDownloadsFinished,
        EventKind::AllDownloadsProcessed,
    ];

    /// Canonical snake_case event name.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::DownloadStart => "download_start",
            EventKind::DownloadFinished => "download_finished",
            EventKind::DownloadFailed => "download_failed",
            EventKind::DownloadProcessed => "download_processed",
            EventKind::PackageProcessed => "package_processed",
            EventKind::PackageDeleted => "package_deleted",
            EventKind::PackageFailed => "package_failed",
            EventKind::LinksAdded => "links_added",
            EventKind::ConfigChanged => "config_changed",
            EventKind::BeforeReconnect => "before_reconnect",
            EventKind::AfterReconnect => "after_reconnect",
            EventKind::CaptchaTask => "captcha_task",
            EventKind::CaptchaCorrect => "captcha_correct",
            EventKind::CaptchaInvalid => "captcha_invalid",
            EventKind::AllDownloadsFinished => "all_downloads_finished",
            EventKind::AllDownloadsProcessed => "all_downloads_processed",
        }
    }

    /// Look up a kind by its canonical name. Unknown names return `None`;
    /// subscription paths turn that into a hard error.
    pub fn from_name(name: &str) -> Option<EventKind> {
        EventKind::ALL.iter().copied().find(|k| k.as_str() == name)
    }
}

/// A published lifecycle event with its payload.
///
/// Serialized form is used verbatim for remote notification push, tagged by
/// the canonical event name.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    DownloadStart { job: JobId },
    DownloadFinished { job: JobId, filename: String, bytes: u64 },
    DownloadFailed { job: JobId, reason: String },
    DownloadProcessed { job: JobId },
    PackageProcessed { package: PackageId },
    PackageDeleted { package: PackageId },
    PackageFailed { package: PackageId, reason: String },
    LinksAdded { package: PackageId, count: usize },
    ConfigChanged { key: String, value: String },
    BeforeReconnect,
    AfterReconnect,
    CaptchaTask { id: u64 },
    CaptchaCorrect { id: u64 },
    CaptchaInvalid { id: u64 },
    AllDownloadsFinished,
    AllDownloadsProcessed,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::DownloadStart { .. } => EventKind::DownloadStart,
            Event::DownloadFinished { .. } => EventKind::DownloadFinished,
            Event::DownloadFailed { .. } => EventKind::DownloadFailed,
            Event::DownloadProcessed { .. } => EventKind::DownloadProcessed,
            Event::PackageProcessed { .. } => EventKind::PackageProcessed,
            Event::PackageDeleted { .. } => EventKind::PackageDeleted,
            Event::PackageFailed { .. } => EventKind::PackageFailed,
            Event::LinksAdded { .. } => EventKind::LinksAdded,
            Event::ConfigChanged { .. } => EventKind::ConfigChanged,
            Event::BeforeReconnect => EventKind::BeforeReconnect,
            Event::AfterReconnect => EventKind::AfterReconnect,
            Event::CaptchaTask { .. } => EventKind::CaptchaTask,
            Event::CaptchaCorrect { .. } => EventKind::CaptchaCorrect,
            Event::CaptchaInvalid { .. } => EventKind::CaptchaInvalid,
            Event::AllDownloadsFinished => EventKind::AllDownloadsFinished,
            Event::AllDownloadsProcessed => EventKind::AllDownloadsProcessed,
        }
    }
}
