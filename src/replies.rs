//! Numeric reply codes and canonical parameter shapes.
//!
//! Each numeric is rendered via [`Reply::into_message`], which takes the
//! server name and the target's current nick (or `"*"` for unregistered
//! clients) as parameters rather than baking a server name in as a constant,
//! since the server name is configuration (`config.rs`), not a compile-time
//! fact.

use crate::message::{Command, Message};

pub const RPL_WELCOME: u16 = 1;
pub const RPL_YOURHOST: u16 = 2;
pub const RPL_CREATED: u16 = 3;
pub const RPL_MYINFO: u16 = 4;
pub const RPL_ISUPPORT: u16 = 5;
pub const RPL_NAMREPLY: u16 = 353;
pub const RPL_ENDOFNAMES: u16 = 366;
pub const RPL_MOTD: u16 = 372;
pub const RPL_MOTDSTART: u16 = 375;
pub const RPL_ENDOFMOTD: u16 = 376;
pub const ERR_NOSUCHCHANNEL: u16 = 403;
pub const ERR_UNKNOWNCOMMAND: u16 = 421;
pub const ERR_NONICKNAMEGIVEN: u16 = 431;
pub const ERR_ERRONEUSNICKNAME: u16 = 432;
pub const ERR_NICKNAMEINUSE: u16 = 433;
pub const ERR_NOTREGISTERED: u16 = 451;
pub const ERR_NEEDMOREPARAMS: u16 = 461;
pub const ERR_BADMASK: u16 = 475;
/// Non-standard, used only by this server.
pub const ERR_INCORRECTENCODING: u16 = 980;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply<'a> {
    Welcome {
        mask: &'a str,
    },
    YourHost {
        servername: &'a str,
        version: &'a str,
    },
    Created,
    MyInfo {
        servername: &'a str,
        version: &'a str,
    },
    ISupport {
        network: &'a str,
    },
    MotdStart {
        servername: &'a str,
    },
    Motd {
        line: &'a str,
    },
    EndOfMotd,
    NamReply {
        channel: &'a str,
        names: &'a [String],
    },
    EndOfNames {
        channel: &'a str,
    },
    NoSuchChannel {
        channel: &'a str,
    },
    UnknownCommand {
        command: &'a str,
    },
    NoNicknameGiven,
    ErroneousNickname {
        nick: &'a str,
    },
    NicknameInUse {
        nick: &'a str,
    },
    NotRegistered,
    NeedMoreParams {
        command: &'a str,
    },
    BadMask {
        mask: &'a str,
    },
    IncorrectEncoding,
}

impl<'a> Reply<'a> {
    pub fn code(&self) -> u16 {
        match self {
            Reply::Welcome { .. } => RPL_WELCOME,
            Reply::YourHost { .. } => RPL_YOURHOST,
            Reply::Created => RPL_CREATED,
            Reply::MyInfo { .. } => RPL_MYINFO,
            Reply::ISupport { .. } => RPL_ISUPPORT,
            Reply::MotdStart { .. } => RPL_MOTDSTART,
            Reply::Motd { .. } => RPL_MOTD,
            Reply::EndOfMotd => RPL_ENDOFMOTD,
            Reply::NamReply { .. } => RPL_NAMREPLY,
            Reply::EndOfNames { .. } => RPL_ENDOFNAMES,
            Reply::NoSuchChannel { .. } => ERR_NOSUCHCHANNEL,
            Reply::UnknownCommand { .. } => ERR_UNKNOWNCOMMAND,
            Reply::NoNicknameGiven => ERR_NONICKNAMEGIVEN,
            Reply::ErroneousNickname { .. } => ERR_ERRONEUSNICKNAME,
            Reply::NicknameInUse { .. } => ERR_NICKNAMEINUSE,
            Reply::NotRegistered => ERR_NOTREGISTERED,
            Reply::NeedMoreParams { .. } => ERR_NEEDMOREPARAMS,
            Reply::BadMask { .. } => ERR_BADMASK,
            Reply::IncorrectEncoding => ERR_INCORRECTENCODING,
        }
    }

    /// Builds the full parameter list for this reply, `target` being the
    /// recipient's current nick (or `"*"` pre-registration).
    pub fn params(&self, target: &str) -> Vec<String> {
        match self {
            Reply::Welcome { mask } => vec![
                target.to_string(),
                format!("Welcome to the Internet Relay Network {mask}"),
            ],
            Reply::YourHost {
                servername,
                version,
            } => vec![
                target.to_string(),
                format!("Your host is {servername}, running version {version}"),
            ],
            Reply::Created => vec![target.to_string(), "This server was created today".to_string()],
            Reply::MyInfo {
                servername,
                version,
            } => vec![
                target.to_string(),
                servername.to_string(),
                version.to_string(),
                "o".to_string(),
                "o".to_string(),
            ],
            Reply::ISupport { network } => vec![
                target.to_string(),
                format!("NETWORK={network}"),
                "PREFIX=(ov)@+".to_string(),
                "are supported by this server".to_string(),
            ],
            Reply::MotdStart { servername } => vec![
                target.to_string(),
                format!("{servername} Message Of The Day"),
            ],
            Reply::Motd { line } => vec![target.to_string(), format!("- {line}")],
            Reply::EndOfMotd => vec![target.to_string(), "End of Message Of The Day".to_string()],
            Reply::NamReply { channel, names } => vec![
                target.to_string(),
                "=".to_string(),
                channel.to_string(),
                names.join(" "),
            ],
            Reply::EndOfNames { channel } => {
                vec![target.to_string(), channel.to_string(), "End of /NAMES".to_string()]
            }
            Reply::NoSuchChannel { channel } => {
                vec![target.to_string(), channel.to_string(), "No such channel".to_string()]
            }
            Reply::UnknownCommand { command } => vec![
                target.to_string(),
                command.to_string(),
                "Unknown command".to_string(),
            ],
            Reply::NoNicknameGiven => {
                vec![target.to_string(), "No nickname given".to_string()]
            }
            Reply::ErroneousNickname { nick } => vec![
                target.to_string(),
                nick.to_string(),
                "Erroneous nickname".to_string(),
            ],
            Reply::NicknameInUse { nick } => vec![
                target.to_string(),
                nick.to_string(),
                "Nickname already in use".to_string(),
            ],
            Reply::NotRegistered => {
                vec![target.to_string(), "You are not registered.".to_string()]
            }
            Reply::NeedMoreParams { command } => vec![
                target.to_string(),
                command.to_string(),
                "Not enough parameters".to_string(),
            ],
            Reply::BadMask { mask } => {
                vec![target.to_string(), mask.to_string(), "Bad Server/host mask".to_string()]
            }
            Reply::IncorrectEncoding => vec![
                target.to_string(),
                "Incorrect encoding. You must use UTF-8.".to_string(),
            ],
        }
    }

    /// Builds the full numeric reply message: `:server NNN target ...params`.
    pub fn into_message(&self, server: &str, target: &str) -> Message {
        Message {
            prefix: Some(server.to_string()),
            command: Command::Numeric(self.code()),
            params: self.params(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_shape() {
        let r = Reply::Welcome {
            mask: "alice!alice@host",
        };
        assert_eq!(r.code(), 1);
        assert_eq!(
            r.params("alice"),
            vec![
                "alice".to_string(),
                "Welcome to the Internet Relay Network alice!alice@host".to_string()
            ]
        );
    }

    #[test]
    fn nickname_in_use_targets_star_when_unregistered() {
        let r = Reply::NicknameInUse { nick: "bob" };
        assert_eq!(r.code(), 433);
        assert_eq!(
            r.params("*"),
            vec![
                "*".to_string(),
                "bob".to_string(),
                "Nickname already in use".to_string()
            ]
        );
    }
}
