//! Remote API surface: a closed set of commands and replies.
//!
//! The dispatcher matches on this enum, so a remote client can reach exactly
//! these operations and nothing else.

use serde::{Deserialize, Serialize};

use crate::jobs::{JobId, PackageId};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ApiRequest {
    Version,
    Status,
    AddLinks { package: String, urls: Vec<String> },
    /// Stops a running job (alias of cancel at the transfer level; progress
    /// in the `.part` file is kept).
    Pause { job: JobId },
    Cancel { job: JobId },
    DeletePackage { package: PackageId },
    SetConfig { key: String, value: String },
    Reconnect,
    /// Switch this connection to asynchronous notification push: every bus
    /// event is forwarded as one JSON line.
    Subscribe,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ApiResponse {
    Ok,
    Version { version: String },
    Status { packages: Vec<PackageStatus> },
    Added { jobs: Vec<JobId>, unsupported: Vec<String> },
    Error { message: String },
}

impl ApiResponse {
    pub fn error(message: impl Into<String>) -> Self {
        ApiResponse::Error {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PackageStatus {
    pub id: PackageId,
    pub name: String,
    pub jobs: Vec<JobLine>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobLine {
    pub id: JobId,
    pub url: String,
    pub status: String,
    pub filename: Option<String>,
    pub error: Option<String>,
}
