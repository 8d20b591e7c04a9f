//! Connectivity check: every ping is answered with the next counter value

use huddle_proto::rooms::{Ping, Pong};

#[must_use]
pub const fn pong(ping: Ping) -> Pong {
    Pong {
        counter: ping.counter.wrapping_add(1),
    }
}
