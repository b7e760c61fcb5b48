//! STOMP 1.2 frame codec
//!
//! A frame is a command line, a block of `name:value` header lines, a blank
//! line, a body and a NUL octet. Over WebSocket each message carries one
//! frame, or a bare end-of-line when it is only a heart-beat.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// STOMP 1.2 frame commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // Client frames
    Connect,
    Stomp,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    // Server frames
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Connected => "CONNECTED",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// CONNECT and CONNECTED headers are sent verbatim
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "DISCONNECT" => Command::Disconnect,
            "CONNECTED" => Command::Connected,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            other => return Err(FrameError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

/// A single STOMP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    headers: Vec<(String, String)>,
    pub body: String,
}

/// What one WebSocket message decoded to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Bare end-of-line keep-alive
    HeartBeat,
    Frame(Frame),
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header value
    ///
    /// When a header is repeated only the first occurrence counts.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Serialize to wire text, adding `content-length` for non-empty bodies
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());

        out.push_str(self.command.as_str());
        out.push('\n');

        for (name, value) in &self.headers {
            push_header_part(&mut out, name, escape);
            out.push(':');
            push_header_part(&mut out, value, escape);
            out.push('\n');
        }

        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }

        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decode one WebSocket message
    pub fn decode(input: &[u8]) -> Result<Inbound, FrameError> {
        let input = skip_eols(input);
        if input.is_empty() {
            return Ok(Inbound::HeartBeat);
        }

        let (command_line, mut rest) = split_line(input).ok_or(FrameError::Truncated)?;
        let command: Command = as_utf8(command_line)?.parse()?;
        let escaped = command.escapes_headers();

        let mut headers = Vec::new();
        loop {
            let (line, remaining) = split_line(rest).ok_or(FrameError::Truncated)?;
            rest = remaining;
            if line.is_empty() {
                break;
            }

            let line = as_utf8(line)?;
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;

            if escaped {
                headers.push((unescape(name)?, unescape(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let frame = Frame {
            command,
            headers,
            body: String::new(),
        };

        let body = match frame.get("content-length") {
            Some(raw) => {
                let length: usize = raw
                    .trim()
                    .parse()
                    .map_err(|_| FrameError::InvalidContentLength(raw.to_string()))?;
                if rest.len() <= length {
                    return Err(FrameError::MissingTerminator);
                }
                if rest[length] != 0 {
                    return Err(FrameError::MissingTerminator);
                }
                &rest[..length]
            }
            None => {
                let end = rest
                    .iter()
                    .position(|b| *b == 0)
                    .ok_or(FrameError::MissingTerminator)?;
                &rest[..end]
            }
        };

        Ok(Inbound::Frame(Frame {
            body: as_utf8(body)?.to_string(),
            ..frame
        }))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        if let Some(destination) = self.get("destination") {
            write!(f, " {destination}")?;
        }
        Ok(())
    }
}

fn push_header_part(out: &mut String, raw: &str, escape: bool) {
    if !escape {
        out.push_str(raw);
        return;
    }
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
}

fn unescape(raw: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}

fn skip_eols(mut input: &[u8]) -> &[u8] {
    loop {
        match input {
            [b'\r', b'\n', rest @ ..] | [b'\n', rest @ ..] => input = rest,
            _ => return input,
        }
    }
}

/// Split off one line, dropping the `\n` (and a preceding `\r`)
fn split_line(input: &[u8]) -> Option<(&[u8], &[u8])> {
    let end = input.iter().position(|b| *b == b'\n')?;
    let line = &input[..end];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Some((line, &input[end + 1..]))
}

fn as_utf8(bytes: &[u8]) -> Result<&str, FrameError> {
    std::str::from_utf8(bytes).map_err(|_| FrameError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decode_frame(raw: &str) -> Frame {
        match Frame::decode(raw.as_bytes()).unwrap() {
            Inbound::Frame(frame) => frame,
            Inbound::HeartBeat => panic!("Expected a frame, got a heart-beat"),
        }
    }

    #[test]
    fn test_encode_subscribe() {
        let frame = Frame::new(Command::Subscribe)
            .header("id", "sub-0")
            .header("destination", "/topic/line-suspensions")
            .header("ack", "auto");

        assert_eq!(
            frame.encode(),
            "SUBSCRIBE\nid:sub-0\ndestination:/topic/line-suspensions\nack:auto\n\n\0"
        );
    }

    #[test]
    fn test_encode_adds_content_length() {
        let frame = Frame::new(Command::Send)
            .header("destination", "/app/echo")
            .body("héllo");

        let encoded = frame.encode();
        assert!(encoded.contains("content-length:6\n"));
        assert!(encoded.ends_with("\n\nhéllo\0"));
    }

    #[test]
    fn test_connect_headers_are_not_escaped() {
        let frame = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", "broker:61613");

        assert!(frame.encode().contains("host:broker:61613\n"));
    }

    #[test]
    fn test_header_escaping_round_trips() {
        let frame = Frame::new(Command::Send).header("note", "a:b\\c\nd");
        let encoded = frame.encode();
        assert!(encoded.contains("note:a\\cb\\\\c\\nd\n"));

        let decoded = decode_frame(&encoded);
        assert_eq!(decoded.get("note"), Some("a:b\\c\nd"));
    }

    #[test]
    fn test_decode_message_with_content_length() {
        let body = r#"{"id":"s1"}"#;
        let raw = format!(
            "MESSAGE\nsubscription:sub-0\nmessage-id:7\ndestination:/topic/line-suspensions\ncontent-length:{}\n\n{}\0",
            body.len(),
            body
        );

        let frame = decode_frame(&raw);
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("subscription"), Some("sub-0"));
        assert_eq!(frame.get("destination"), Some("/topic/line-suspensions"));
        assert_eq!(frame.body, body);
    }

    #[test]
    fn test_content_length_allows_embedded_nul() {
        let raw = b"MESSAGE\ncontent-length:3\n\na\0b\0";
        match Frame::decode(raw).unwrap() {
            Inbound::Frame(frame) => assert_eq!(frame.body, "a\0b"),
            Inbound::HeartBeat => panic!("Expected a frame"),
        }
    }

    #[test]
    fn test_decode_without_content_length_stops_at_nul() {
        let frame = decode_frame("ERROR\nmessage:denied\n\nno access\0\n");
        assert_eq!(frame.command, Command::Error);
        assert_eq!(frame.get("message"), Some("denied"));
        assert_eq!(frame.body, "no access");
    }

    #[test]
    fn test_decode_crlf_lines() {
        let frame = decode_frame("CONNECTED\r\nversion:1.2\r\nheart-beat:0,0\r\n\r\n\0");
        assert_eq!(frame.command, Command::Connected);
        assert_eq!(frame.get("version"), Some("1.2"));
        assert_eq!(frame.get("heart-beat"), Some("0,0"));
    }

    #[test]
    fn test_repeated_header_first_wins() {
        let frame = decode_frame("MESSAGE\nfoo:first\nfoo:second\n\n\0");
        assert_eq!(frame.get("foo"), Some("first"));
        assert_eq!(frame.headers().len(), 2);
    }

    #[test]
    fn test_leading_eols_are_skipped() {
        let frame = decode_frame("\n\r\nRECEIPT\nreceipt-id:77\n\n\0");
        assert_eq!(frame.command, Command::Receipt);
    }

    #[rstest]
    #[case::lf("\n")]
    #[case::crlf("\r\n")]
    #[case::several("\n\n\r\n")]
    #[case::empty("")]
    fn test_heart_beats(#[case] raw: &str) {
        assert_eq!(Frame::decode(raw.as_bytes()).unwrap(), Inbound::HeartBeat);
    }

    #[rstest]
    #[case::unknown_command("PUBLISH\n\n\0", FrameError::UnknownCommand("PUBLISH".to_string()))]
    #[case::no_colon("MESSAGE\nbroken\n\n\0", FrameError::MalformedHeader("broken".to_string()))]
    #[case::bad_escape("MESSAGE\nk:\\t\n\n\0", FrameError::InvalidEscape("\\t".to_string()))]
    #[case::bad_length("MESSAGE\ncontent-length:x\n\n\0", FrameError::InvalidContentLength("x".to_string()))]
    #[case::short_body("MESSAGE\ncontent-length:10\n\nabc\0", FrameError::MissingTerminator)]
    #[case::no_nul("MESSAGE\n\nabc", FrameError::MissingTerminator)]
    #[case::no_blank_line("MESSAGE\nk:v", FrameError::Truncated)]
    fn test_decode_errors(#[case] raw: &str, #[case] expected: FrameError) {
        assert_eq!(Frame::decode(raw.as_bytes()).unwrap_err(), expected);
    }

    #[test]
    fn test_invalid_utf8_body() {
        let raw = b"MESSAGE\n\n\xff\xfe\0";
        assert_eq!(Frame::decode(raw).unwrap_err(), FrameError::InvalidUtf8);
    }

    #[test]
    fn test_display_includes_destination() {
        let frame = Frame::new(Command::Message).header("destination", "/topic/x");
        assert_eq!(frame.to_string(), "MESSAGE /topic/x");
    }

    #[test]
    fn test_command_parse_matches_as_str() {
        for command in [
            Command::Connect,
            Command::Subscribe,
            Command::Disconnect,
            Command::Connected,
            Command::Message,
            Command::Error,
        ] {
            assert_eq!(command.as_str().parse::<Command>().unwrap(), command);
        }
    }

    proptest::proptest! {
        #[test]
        fn prop_decode_never_panics(raw in proptest::collection::vec(proptest::num::u8::ANY, 0..256)) {
            let _ = Frame::decode(&raw);
        }

        #[test]
        fn prop_escaped_header_values_survive(value in r"[a-z:\\\r\n]{0,24}") {
            let encoded = Frame::new(Command::Message).header("k", value.clone()).encode();
            let decoded = decode_frame(&encoded);
            proptest::prop_assert_eq!(decoded.get("k"), Some(value.as_str()));
        }
    }
}
