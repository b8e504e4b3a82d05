//! User table records

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::read_text;

/// A user enrolled on the terminal
///
/// `uid` is the device slot number; `user_id` is the free-form identifier
/// printed on reports. Enrolling an existing `uid` overwrites the slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub uid: u16,
    pub user_id: String,
    pub name: String,
    /// Never echoed back over the API
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Privilege level (0 = normal user, 14 = administrator)
    #[serde(default)]
    pub role: u8,
    /// Card number (0 = none)
    #[serde(default)]
    pub card_number: u32,
}

impl UserRecord {
    /// Record size used by current firmware
    pub const WIRE_SIZE: usize = 72;

    /// Record size used by old (pre 6.60) firmware
    pub const LEGACY_WIRE_SIZE: usize = 28;

    pub const MAX_NAME_LEN: usize = 24;
    pub const MAX_USER_ID_LEN: usize = 24;
    pub const MAX_PASSWORD_LEN: usize = 8;

    /// Privilege level of a device administrator
    pub const ROLE_ADMIN: u8 = 14;

    pub fn new(uid: u16, user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid,
            user_id: user_id.into(),
            name: name.into(),
            password: None,
            role: 0,
            card_number: 0,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_role(mut self, role: u8) -> Self {
        self.role = role;
        self
    }

    pub fn with_card_number(mut self, card_number: u32) -> Self {
        self.card_number = card_number;
        self
    }

    /// Check that every text field fits its fixed-width slot
    pub fn validate(&self) -> Result<()> {
        if self.user_id.is_empty() {
            return Err(Error::Validation("userid must not be empty".into()));
        }
        if self.name.is_empty() {
            return Err(Error::Validation("name must not be empty".into()));
        }
        check_len("userid", &self.user_id, Self::MAX_USER_ID_LEN)?;
        check_len("name", &self.name, Self::MAX_NAME_LEN)?;
        if let Some(password) = &self.password {
            check_len("password", password, Self::MAX_PASSWORD_LEN)?;
        }
        Ok(())
    }

    /// Encode as a 72-byte `CMD_USER_WRQ` payload
    ///
    /// Layout: `uid u16 | role u8 | password [8] | name [24] | card u32 |
    /// pad | group [7] | pad | user_id [24]`
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::WIRE_SIZE);

        buf.put_u16_le(self.uid);
        buf.put_u8(self.role);
        put_text(&mut buf, self.password.as_deref().unwrap_or(""), 8);
        put_text(&mut buf, &self.name, 24);
        buf.put_u32_le(self.card_number);
        buf.put_u8(0);
        put_text(&mut buf, "", 7);
        buf.put_u8(0);
        put_text(&mut buf, &self.user_id, 24);

        buf
    }

    /// Decode one record of either supported size
    pub fn decode(raw: &[u8]) -> Result<Self> {
        match raw.len() {
            Self::WIRE_SIZE => Ok(Self::decode_current(raw)),
            Self::LEGACY_WIRE_SIZE => Ok(Self::decode_legacy(raw)),
            n => Err(Error::Parse(format!("unexpected user record size {n}"))),
        }
    }

    /// Decode a user table as returned by a buffered read
    ///
    /// `expected` is the user count reported by the device, used to pick the
    /// record size. Without it, current firmware is assumed whenever the
    /// table length allows it.
    pub fn decode_table(data: &[u8], expected: Option<usize>) -> Result<Vec<Self>> {
        let body = crate::split_table(data)?;
        let size = crate::record_size(
            body.len(),
            expected,
            &[Self::WIRE_SIZE, Self::LEGACY_WIRE_SIZE],
        )?;

        body.chunks_exact(size).map(Self::decode).collect()
    }

    fn decode_current(mut raw: &[u8]) -> Self {
        let uid = raw.get_u16_le();
        let role = raw.get_u8();
        let password = read_text(&raw[..8]);
        let name = read_text(&raw[8..32]);
        raw.advance(32);
        let card_number = raw.get_u32_le();
        // pad, group id, pad
        raw.advance(9);
        let user_id = read_text(&raw[..24]);

        Self::from_parts(uid, user_id, name, password, role, card_number)
    }

    fn decode_legacy(mut raw: &[u8]) -> Self {
        let uid = raw.get_u16_le();
        let role = raw.get_u8();
        let password = read_text(&raw[..5]);
        let name = read_text(&raw[5..13]);
        raw.advance(13);
        let card_number = raw.get_u32_le();
        // pad, group id, timezone
        raw.advance(4);
        let user_id = raw.get_u32_le().to_string();

        Self::from_parts(uid, user_id, name, password, role, card_number)
    }

    fn from_parts(
        uid: u16,
        user_id: String,
        name: String,
        password: String,
        role: u8,
        card_number: u32,
    ) -> Self {
        // Old firmware leaves the name empty for users enrolled on the keypad
        let name = if name.is_empty() { format!("NN-{user_id}") } else { name };

        Self {
            uid,
            user_id,
            name,
            password: (!password.is_empty()).then_some(password),
            role,
            card_number,
        }
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.len() > max {
        return Err(Error::Validation(format!(
            "{field} must be at most {max} bytes, got {}",
            value.len()
        )));
    }
    Ok(())
}

fn put_text(buf: &mut BytesMut, value: &str, width: usize) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(width);
    buf.put_slice(&bytes[..n]);
    buf.put_bytes(0, width - n);
}
