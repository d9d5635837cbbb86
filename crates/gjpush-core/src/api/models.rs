//! Wire models shared by the push endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const ERR_MISSING_AUTH: i64 = 1;
pub const ERR_INVALID_AUTH: i64 = 2;
pub const ERR_INVALID_FIELDS: i64 = 3;
pub const ERR_CANT_CLEAN_TEMP_FILE: i64 = 4;
pub const ERR_CANT_ATTACH_BUILD: i64 = 5;
pub const ERR_UNKNOWN: i64 = 1000;

/// Error object returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    /// Missing or invalid request fields (code 3).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    /// Echo of the HTTP status for otherwise unclassified errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_error: Option<u32>,
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self.code, ERR_MISSING_AUTH | ERR_INVALID_AUTH)
    }

    fn describe(&self) -> &'static str {
        match self.code {
            ERR_MISSING_AUTH => "missing auth token",
            ERR_INVALID_AUTH => "invalid auth token",
            ERR_INVALID_FIELDS => "invalid fields",
            ERR_CANT_CLEAN_TEMP_FILE => "could not clean up the temporary file",
            ERR_CANT_ATTACH_BUILD => "could not attach the build",
            _ => "unknown error",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = if self.message.is_empty() {
            self.describe()
        } else {
            self.message.as_str()
        };
        write!(f, "server error {}: {}", self.code, message)?;
        if !self.fields.is_empty() {
            write!(f, " ({})", self.fields.join(", "))?;
        }
        Ok(())
    }
}

/// Account the auth token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: u64,
    pub url: String,
    pub username: String,
    pub display_name: String,
    pub created_on: i64,
}

impl User {
    /// Display name, or the username when none is set.
    pub fn name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }
}

impl std::error::Error for ApiError {}

/// Build created once the last chunk lands.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameBuild {
    pub file: Option<GameBuildFile>,
    pub launch_options: Vec<GameBuildLaunchOption>,
    pub archive_type: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub os_windows: bool,
    pub os_windows_64: bool,
    pub os_mac: bool,
    pub os_mac_64: bool,
    pub os_linux: bool,
    pub os_linux_64: bool,
    pub os_other: bool,
    pub emulator_type: String,
    pub embed_width: u32,
    pub embed_height: u32,
    pub browser_disable_right_click: bool,
    pub errors: String,
    pub created_on: i64,
    pub updated_on: i64,
    pub status: String,
}

impl GameBuild {
    /// Platforms the build was detected for, in display order.
    pub fn platforms(&self) -> Vec<&'static str> {
        [
            (self.os_windows, "windows"),
            (self.os_windows_64, "windows-64"),
            (self.os_mac, "mac"),
            (self.os_mac_64, "mac-64"),
            (self.os_linux, "linux"),
            (self.os_linux_64, "linux-64"),
            (self.os_other, "other"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameBuildFile {
    pub id: u64,
    pub filename: String,
    pub filesize: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameBuildLaunchOption {
    pub id: u64,
    pub os: String,
    pub executable_path: String,
}
