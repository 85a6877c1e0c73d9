//! Reply codes sent by the server, and the reply classes they fall in.

// 1xx: Positive Preliminary Reply
pub const ALREADY_OPEN: u32 = 125;
pub const ABOUT_TO_SEND: u32 = 150;

// 2xx: Positive Completion Reply
pub const COMMAND_OK: u32 = 200;
pub const FILE: u32 = 213;
pub const NAME: u32 = 215;
pub const READY: u32 = 220;
pub const CLOSING: u32 = 221;
pub const CLOSING_DATA_CONNECTION: u32 = 226;
pub const PASSIVE_MODE: u32 = 227;
pub const LOGGED_IN: u32 = 230;
pub const REQUESTED_FILE_ACTION_OK: u32 = 250;
pub const PATH_CREATED: u32 = 257;

// 3xx: Positive intermediate Reply
pub const NEED_PASSWORD: u32 = 331;
pub const REQUEST_FILE_PENDING: u32 = 350;

// 4xx: Transient Negative Completion Reply
pub const NOT_AVAILABLE: u32 = 421;
pub const CANNOT_OPEN_DATA_CONNECTION: u32 = 425;
pub const REQUEST_FILE_ACTION_IGNORED: u32 = 450;

// 5xx: Permanent Negative Completion Reply
pub const NOT_IMPLEMENTED: u32 = 502;
pub const NOT_LOGGED_IN: u32 = 530;
pub const STORING_NEED_ACCOUNT: u32 = 532;
pub const FILE_UNAVAILABLE: u32 = 550;
pub const BAD_FILENAME: u32 = 553;

/// The first digit of a reply code, as laid out in RFC 959 section 4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    PositivePreliminary,
    PositiveCompletion,
    PositiveIntermediate,
    TransientNegative,
    PermanentNegative,
}

/// Returns the class of `code`, or `None` when it is outside 100..=599.
pub fn class(code: u32) -> Option<Class> {
    match code / 100 {
        1 => Some(Class::PositivePreliminary),
        2 => Some(Class::PositiveCompletion),
        3 => Some(Class::PositiveIntermediate),
        4 => Some(Class::TransientNegative),
        5 => Some(Class::PermanentNegative),
        _ => None,
    }
}

/// A negative reply that may succeed if the command is sent again later.
pub fn is_transient(code: u32) -> bool {
    class(code) == Some(Class::TransientNegative)
}
