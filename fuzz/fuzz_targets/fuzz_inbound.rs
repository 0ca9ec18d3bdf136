//! Fuzz target: inbound message routing
//!
//! The first byte picks a subscribed topic; the rest is the payload.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - An acknowledgment is only ever decoded to a kind whose token matches
//!   the decoded command word
//!
//! cargo fuzz run fuzz_inbound

#![no_main]

use libfuzzer_sys::fuzz_target;
use solarstation::app::commands::AppCommand;
use solarstation::protocol;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let (topic, _qos) = protocol::SUBSCRIPTIONS[selector as usize % protocol::SUBSCRIPTIONS.len()];

    if let Ok(Some(AppCommand::Ack(kind))) = AppCommand::parse(topic, payload) {
        assert_eq!(protocol::command_word(payload), Ok(kind.token()));
    }
    let _ = protocol::parse_switch(payload);
});
