//! Extraction of the fixed-schema `System` block fields.
//!
//! Every field is a string with `""` as its absent representation, so a row
//! always carries the full fixed column set no matter how sparse the source
//! record is. Extraction never fails; an unexpected shape (e.g. a non-numeric
//! `Level`) degrades to passing the raw text through.

use crate::flat_row::FlatRow;
use crate::xml_record::XmlNode;

/// The fixed header fields shared by (almost) every event record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixedFields {
    pub event_id: String,
    pub event_id_qualifiers: String,
    pub version: String,
    pub time_created: String,
    pub channel: String,
    pub computer: String,
    pub level: String,
    pub level_text: String,
    pub task: String,
    pub opcode: String,
    pub keywords: String,
    pub provider: String,
    pub provider_guid: String,
    pub event_record_id: String,
    pub correlation_activity_id: String,
    pub correlation_related_activity_id: String,
    pub process_id: String,
    pub thread_id: String,
    pub user_id: String,
}

/// Standard ETW level values. Anything else (including non-numeric garbage)
/// is passed through as-is rather than treated as an error.
pub fn level_display_name(level: &str) -> &str {
    match level {
        "0" => "LogAlways",
        "1" => "Critical",
        "2" => "Error",
        "3" => "Warning",
        "4" => "Information",
        "5" => "Verbose",
        other => other,
    }
}

fn descendant_text(event: &XmlNode, name: &str) -> String {
    event
        .find_descendant(name)
        .map(|node| node.text.trim().to_string())
        .unwrap_or_default()
}

fn descendant_attr(event: &XmlNode, name: &str, attr: &str) -> String {
    event
        .find_descendant(name)
        .and_then(|node| node.attr(attr))
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

impl FixedFields {
    pub fn from_event(event: &XmlNode) -> Self {
        let level = descendant_text(event, "Level");
        let level_text = level_display_name(&level).to_string();

        FixedFields {
            event_id: descendant_text(event, "EventID"),
            event_id_qualifiers: descendant_attr(event, "EventID", "Qualifiers"),
            version: descendant_text(event, "Version"),
            time_created: descendant_attr(event, "TimeCreated", "SystemTime"),
            channel: descendant_text(event, "Channel"),
            computer: descendant_text(event, "Computer"),
            level,
            level_text,
            task: descendant_text(event, "Task"),
            opcode: descendant_text(event, "Opcode"),
            keywords: descendant_text(event, "Keywords"),
            provider: descendant_attr(event, "Provider", "Name"),
            provider_guid: descendant_attr(event, "Provider", "Guid"),
            event_record_id: descendant_text(event, "EventRecordID"),
            correlation_activity_id: descendant_attr(event, "Correlation", "ActivityID"),
            correlation_related_activity_id: descendant_attr(
                event,
                "Correlation",
                "RelatedActivityID",
            ),
            process_id: descendant_attr(event, "Execution", "ProcessID"),
            thread_id: descendant_attr(event, "Execution", "ThreadID"),
            user_id: descendant_attr(event, "Security", "UserID"),
        }
    }

    /// Writes the fixed columns into `row`, in the base column order.
    pub fn write_into(&self, row: &mut FlatRow) {
        row.insert("EventID", self.event_id.clone());
        row.insert("EventIDQualifiers", self.event_id_qualifiers.clone());
        row.insert("Version", self.version.clone());
        row.insert("TimeCreated", self.time_created.clone());
        row.insert("Channel", self.channel.clone());
        row.insert("Computer", self.computer.clone());
        row.insert("Level", self.level.clone());
        row.insert("LevelText", self.level_text.clone());
        row.insert("Task", self.task.clone());
        row.insert("Opcode", self.opcode.clone());
        row.insert("Keywords", self.keywords.clone());
        row.insert("Provider", self.provider.clone());
        row.insert("ProviderGUID", self.provider_guid.clone());
        row.insert("EventRecordID", self.event_record_id.clone());
        row.insert("Correlation_ActivityID", self.correlation_activity_id.clone());
        row.insert(
            "Correlation_RelatedActivityID",
            self.correlation_related_activity_id.clone(),
        );
        row.insert("ProcessID", self.process_id.clone());
        row.insert("ThreadID", self.thread_id.clone());
        row.insert("UserID", self.user_id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml_record::parse_record;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
        <Event xmlns="http://schemas.microsoft.com/win/2004/08/events/event">
          <System>
            <Provider Name="Microsoft-Windows-Security-Auditing" Guid="{54849625-5478-4994-a5ba-3e3b0328c30d}"/>
            <EventID>4624</EventID>
            <Version>2</Version>
            <Level>0</Level>
            <Task>12544</Task>
            <Opcode>0</Opcode>
            <Keywords>0x8020000000000000</Keywords>
            <TimeCreated SystemTime="2019-03-07T12:26:51.681640Z"/>
            <EventRecordID>1234</EventRecordID>
            <Correlation ActivityID="{a7a6c5f8-0000-0000-0000-000000000000}"/>
            <Execution ProcessID="716" ThreadID="4524"/>
            <Channel>Security</Channel>
            <Computer>WIN-HV8M0BB4L4E</Computer>
            <Security UserID="S-1-5-18"/>
          </System>
        </Event>"#;

    #[test]
    fn test_extracts_system_block() {
        let event = parse_record(SAMPLE).unwrap();
        let fields = FixedFields::from_event(&event);

        assert_eq!(fields.event_id, "4624");
        assert_eq!(fields.time_created, "2019-03-07T12:26:51.681640Z");
        assert_eq!(fields.channel, "Security");
        assert_eq!(fields.computer, "WIN-HV8M0BB4L4E");
        assert_eq!(fields.level, "0");
        assert_eq!(fields.level_text, "LogAlways");
        assert_eq!(fields.provider, "Microsoft-Windows-Security-Auditing");
        assert_eq!(fields.process_id, "716");
        assert_eq!(fields.thread_id, "4524");
        assert_eq!(fields.user_id, "S-1-5-18");
        assert_eq!(fields.event_record_id, "1234");
    }

    #[test]
    fn test_absent_fields_are_empty_strings() {
        let event = parse_record("<Event><System><EventID>1</EventID></System></Event>").unwrap();
        let fields = FixedFields::from_event(&event);

        assert_eq!(fields.event_id, "1");
        assert_eq!(fields.channel, "");
        assert_eq!(fields.user_id, "");
        assert_eq!(fields.correlation_activity_id, "");
        // An absent level has an empty display name, not an error.
        assert_eq!(fields.level_text, "");
    }

    #[test]
    fn test_level_display_names() {
        assert_eq!(level_display_name("1"), "Critical");
        assert_eq!(level_display_name("2"), "Error");
        assert_eq!(level_display_name("3"), "Warning");
        assert_eq!(level_display_name("4"), "Information");
        assert_eq!(level_display_name("5"), "Verbose");
        // Unknown and non-numeric levels pass through untouched.
        assert_eq!(level_display_name("17"), "17");
        assert_eq!(level_display_name("bogus"), "bogus");
    }
}
