#![allow(dead_code)]

use std::sync::Once;

static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}

pub const EVENT_NS: &str = "http://schemas.microsoft.com/win/2004/08/events/event";

/// A minimal record with the given event id and payload markup.
pub fn record(event_id: &str, payload: &str) -> String {
    format!(
        r#"<Event xmlns="{EVENT_NS}">
             <System>
               <Provider Name="Microsoft-Windows-Security-Auditing"/>
               <EventID>{event_id}</EventID>
               <Level>4</Level>
               <TimeCreated SystemTime="2019-03-07T12:26:51.681640Z"/>
               <EventRecordID>1</EventRecordID>
               <Channel>Security</Channel>
               <Computer>WIN-HV8M0BB4L4E</Computer>
             </System>
             {payload}
           </Event>"#
    )
}

pub fn record_with_named_data(event_id: &str, pairs: &[(&str, &str)]) -> String {
    let data: String = pairs
        .iter()
        .map(|(name, value)| format!(r#"<Data Name="{name}">{value}</Data>"#))
        .collect();
    record(event_id, &format!("<EventData>{data}</EventData>"))
}
