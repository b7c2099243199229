//! Structured error kinds raised by handlers, converted to numeric replies
//! at the dispatcher's single conversion point (`hub::Hub::handle_message`).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IrcError {
    #[error("not enough parameters for {command}")]
    NeedMoreParams { command: String },

    #[error("not registered")]
    NotRegistered,

    #[error("unknown command {command}")]
    UnknownCommand { command: String },

    #[error("nickname {nick} already in use")]
    NicknameInUse { nick: String },

    #[error("erroneous nickname {nick}")]
    ErroneousNick { nick: String },

    #[error("no such channel {channel}")]
    NoSuchChannel { channel: String },

    #[error("incorrect encoding")]
    IncorrectEncoding,

    #[error("malformed message")]
    Malformed,
}
