//! ZKTeco protocol command definitions

use std::fmt;

use crate::error::{Error, Result};

macro_rules! commands {
    ($($(#[$doc:meta])* $variant:ident = $code:literal => $name:literal,)+) => {
        /// Protocol command codes used by the bridge
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum Command {
            $($(#[$doc])* $variant = $code,)+
        }

        impl Command {
            /// Protocol manual name of the command
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl TryFrom<u16> for Command {
            type Error = Error;

            fn try_from(value: u16) -> Result<Self> {
                match value {
                    $($code => Ok(Self::$variant),)+
                    _ => Err(Error::UnknownCommand(value)),
                }
            }
        }
    };
}

commands! {
    // Session
    Connect = 1000 => "CMD_CONNECT",
    Exit = 1001 => "CMD_EXIT",
    EnableDevice = 1002 => "CMD_ENABLEDEVICE",
    DisableDevice = 1003 => "CMD_DISABLEDEVICE",
    Restart = 1004 => "CMD_RESTART",
    RefreshData = 1013 => "CMD_REFRESHDATA",
    Auth = 1102 => "CMD_AUTH",

    // Device information
    GetVersion = 1100 => "CMD_GET_VERSION",
    OptionsRrq = 11 => "CMD_OPTIONS_RRQ",
    GetFreeSizes = 50 => "CMD_GET_FREE_SIZES",

    // Buffered data transfer
    PrepareData = 1500 => "CMD_PREPARE_DATA",
    Data = 1501 => "CMD_DATA",
    FreeData = 1502 => "CMD_FREE_DATA",
    PrepareBuffer = 1503 => "CMD_PREPARE_BUFFER",
    ReadBuffer = 1504 => "CMD_READ_BUFFER",

    // User and attendance tables
    UserWrq = 8 => "CMD_USER_WRQ",
    UserTempRrq = 9 => "CMD_USERTEMP_RRQ",
    AttLogRrq = 13 => "CMD_ATTLOG_RRQ",
    ClearData = 14 => "CMD_CLEAR_DATA",
    ClearAttLog = 15 => "CMD_CLEAR_ATTLOG",
    DeleteUser = 18 => "CMD_DELETE_USER",

    /// Register for real-time events; also the command code of every push
    RegEvent = 500 => "CMD_REG_EVENT",

    // Responses (device to client)
    AckOk = 2000 => "CMD_ACK_OK",
    AckError = 2001 => "CMD_ACK_ERROR",
    AckData = 2002 => "CMD_ACK_DATA",
    AckRetry = 2003 => "CMD_ACK_RETRY",
    AckRepeat = 2004 => "CMD_ACK_REPEAT",
    AckUnauth = 2005 => "CMD_ACK_UNAUTH",
    AckUnknown = 0xFFFF => "CMD_ACK_UNKNOWN",
    AckErrorCmd = 0xFFFD => "CMD_ACK_ERROR_CMD",
    AckErrorInit = 0xFFFC => "CMD_ACK_ERROR_INIT",
    AckErrorData = 0xFFFB => "CMD_ACK_ERROR_DATA",
}

impl Command {
    /// Check if this is a response command (from device to client)
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Self::AckOk
                | Self::AckData
                | Self::AckRetry
                | Self::AckRepeat
                | Self::AckUnauth
                | Self::AckUnknown
        ) || self.is_error()
    }

    /// Check if this is a success response
    pub fn is_success(self) -> bool {
        matches!(self, Self::AckOk | Self::AckData)
    }

    /// Check if this is an error response
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::AckError | Self::AckErrorCmd | Self::AckErrorInit | Self::AckErrorData
        )
    }
}

impl From<Command> for u16 {
    fn from(cmd: Command) -> u16 {
        cmd as u16
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u16)
    }
}
