//! Heart-beat negotiation
//!
//! Both sides advertise `heart-beat:<outgoing>,<incoming>` in milliseconds.
//! A direction is active only when the sender can send and the receiver
//! wants to receive; the agreed period is the larger of the two values.

use std::time::Duration;

use crate::error::FrameError;

/// One side's advertised heart-beat capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    /// Smallest interval at which this side can send heart-beats (zero = never)
    pub outgoing: Duration,
    /// Interval at which this side wants to receive heart-beats (zero = never)
    pub incoming: Duration,
}

/// Heart-beat periods agreed for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Negotiated {
    /// How often the client must send something
    pub send_every: Option<Duration>,
    /// How often the client should hear from the broker
    pub expect_every: Option<Duration>,
}

impl HeartBeat {
    pub fn new(outgoing: Duration, incoming: Duration) -> Self {
        Self { outgoing, incoming }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Parse a `heart-beat` header value such as `10000,10000`
    pub fn parse(value: &str) -> Result<Self, FrameError> {
        let invalid = || FrameError::InvalidHeartBeat(value.to_string());

        let (outgoing, incoming) = value.split_once(',').ok_or_else(invalid)?;
        let outgoing: u64 = outgoing.trim().parse().map_err(|_| invalid())?;
        let incoming: u64 = incoming.trim().parse().map_err(|_| invalid())?;

        Ok(Self {
            outgoing: Duration::from_millis(outgoing),
            incoming: Duration::from_millis(incoming),
        })
    }

    /// Render as a `heart-beat` header value
    pub fn to_header(&self) -> String {
        format!("{},{}", self.outgoing.as_millis(), self.incoming.as_millis())
    }

    /// Agree on periods between this client and the broker's CONNECTED header
    pub fn negotiate(&self, server: &HeartBeat) -> Negotiated {
        let agree = |a: Duration, b: Duration| {
            if a.is_zero() || b.is_zero() {
                None
            } else {
                Some(a.max(b))
            }
        };

        Negotiated {
            send_every: agree(self.outgoing, server.incoming),
            expect_every: agree(self.incoming, server.outgoing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_parse_and_render() {
        let hb = HeartBeat::parse("10000, 5000").unwrap();
        assert_eq!(hb, HeartBeat::new(ms(10_000), ms(5_000)));
        assert_eq!(hb.to_header(), "10000,5000");
    }

    #[rstest]
    #[case("")]
    #[case("10000")]
    #[case("a,b")]
    #[case("-1,0")]
    fn test_parse_rejects(#[case] raw: &str) {
        assert_eq!(
            HeartBeat::parse(raw).unwrap_err(),
            FrameError::InvalidHeartBeat(raw.to_string())
        );
    }

    #[rstest]
    #[case::both_ways((10_000, 10_000), (5_000, 20_000), Some(20_000), Some(10_000))]
    #[case::server_silent((10_000, 10_000), (0, 0), None, None)]
    #[case::client_silent((0, 0), (10_000, 10_000), None, None)]
    #[case::receive_only((0, 4_000), (8_000, 0), None, Some(8_000))]
    fn test_negotiate(
        #[case] client: (u64, u64),
        #[case] server: (u64, u64),
        #[case] send: Option<u64>,
        #[case] expect: Option<u64>,
    ) {
        let client = HeartBeat::new(ms(client.0), ms(client.1));
        let server = HeartBeat::new(ms(server.0), ms(server.1));

        let negotiated = client.negotiate(&server);
        assert_eq!(negotiated.send_every, send.map(ms));
        assert_eq!(negotiated.expect_every, expect.map(ms));
    }
}
