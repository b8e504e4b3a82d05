//! Device information structures

use std::fmt;

use bytes::Buf;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Device information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Device serial number
    pub serial_number: String,

    /// Firmware version
    pub firmware_version: String,

    /// Platform name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Device name (user-assigned)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    /// Record counts and capacities
    #[serde(flatten)]
    pub sizes: StorageSizes,
}

impl DeviceInfo {
    pub fn new(serial_number: String, firmware_version: String) -> Self {
        Self {
            serial_number,
            firmware_version,
            platform: None,
            device_name: None,
            sizes: StorageSizes::default(),
        }
    }

    pub fn with_sizes(mut self, sizes: StorageSizes) -> Self {
        self.sizes = sizes;
        self
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device[SN: {}, FW: {}, users: {}, records: {}]",
            self.serial_number, self.firmware_version, self.sizes.user_count, self.sizes.record_count
        )
    }
}

/// Storage usage reported by `CMD_GET_FREE_SIZES`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSizes {
    pub user_count: u32,
    pub fingerprint_count: u32,
    pub record_count: u32,
    pub user_capacity: u32,
    pub fingerprint_capacity: u32,
    pub record_capacity: u32,
}

impl StorageSizes {
    /// Size of the mandatory part of the free-sizes reply (20 little-endian i32)
    pub const WIRE_SIZE: usize = 80;

    /// Decode the free-sizes table
    ///
    /// Newer firmware appends face template counters after the first 80
    /// bytes; they are ignored.
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::WIRE_SIZE {
            return Err(Error::Parse(format!(
                "free sizes reply too short: {} bytes",
                buf.len()
            )));
        }

        let mut fields = [0u32; 20];
        for field in fields.iter_mut() {
            *field = buf.get_i32_le().max(0) as u32;
        }

        Ok(Self {
            user_count: fields[4],
            fingerprint_count: fields[6],
            record_count: fields[8],
            fingerprint_capacity: fields[14],
            user_capacity: fields[15],
            record_capacity: fields[16],
        })
    }
}
