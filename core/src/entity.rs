use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder rendered when an upstream record lacks its display field.
pub const UNKNOWN_DISPLAY: &str = "(unknown)";

/// Closed set of catalog entity categories served by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Report,
    Actor,
    Source,
}

impl EntityKind {
    /// Fixed listing order: reports, then actors, then sources.
    pub const ALL: [EntityKind; 3] = [EntityKind::Report, EntityKind::Actor, EntityKind::Source];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Report => "report",
            EntityKind::Actor => "actor",
            EntityKind::Source => "source",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "report" => Some(EntityKind::Report),
            "actor" => Some(EntityKind::Actor),
            "source" => Some(EntityKind::Source),
            _ => None,
        }
    }

    /// Field of the raw upstream record used when rendering the entity.
    pub fn display_field(self) -> &'static str {
        match self {
            EntityKind::Report => "title",
            EntityKind::Actor => "main_name",
            EntityKind::Source => "name",
        }
    }

    /// Human label prefixed to resource names, e.g. `Threat Report: ...`.
    pub fn display_label(self) -> &'static str {
        match self {
            EntityKind::Report => "Threat Report",
            EntityKind::Actor => "Threat Actor",
            EntityKind::Source => "Source",
        }
    }

    /// Column label used in list-tool summary lines.
    pub fn summary_label(self) -> &'static str {
        match self {
            EntityKind::Report => "Title",
            EntityKind::Actor | EntityKind::Source => "Name",
        }
    }
}

/// Value of the entity's display field, or a placeholder when the upstream
/// record omitted it.
pub fn display_value(kind: EntityKind, entry: &Value) -> &str {
    entry
        .get(kind.display_field())
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_DISPLAY)
}

/// One summary line of a list-tool result, e.g. `ID: r1, Title: Report One`.
pub fn summary_line(kind: EntityKind, id: &str, entry: &Value) -> String {
    format!(
        "ID: {id}, {}: {}",
        kind.summary_label(),
        display_value(kind, entry)
    )
}

/// Resource name shown by `resources/list`, e.g. `Threat Report: Report One`.
pub fn resource_name(kind: EntityKind, entry: &Value) -> String {
    format!("{}: {}", kind.display_label(), display_value(kind, entry))
}

/// One-line resource description shown by `resources/list`.
pub fn resource_description(kind: EntityKind, entry: &Value) -> String {
    let value = display_value(kind, entry);
    match kind {
        EntityKind::Report => format!("Threat report titled {value}"),
        EntityKind::Actor => format!("Threat actor known as {value}"),
        EntityKind::Source => format!("Source {value}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_strings_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::parse("widget"), None);
        assert_eq!(EntityKind::parse("Report"), None);
    }

    #[test]
    fn summary_lines_use_kind_specific_labels() {
        assert_eq!(
            summary_line(EntityKind::Report, "r1", &json!({"title": "Report One"})),
            "ID: r1, Title: Report One"
        );
        assert_eq!(
            summary_line(EntityKind::Actor, "a1", &json!({"main_name": "Sandworm"})),
            "ID: a1, Name: Sandworm"
        );
        assert_eq!(
            summary_line(EntityKind::Source, "s1", &json!({"name": "CERT-EU"})),
            "ID: s1, Name: CERT-EU"
        );
    }

    #[test]
    fn missing_display_field_renders_placeholder() {
        let entry = json!({"id": "r9"});
        assert_eq!(display_value(EntityKind::Report, &entry), UNKNOWN_DISPLAY);
        assert_eq!(
            summary_line(EntityKind::Report, "r9", &entry),
            "ID: r9, Title: (unknown)"
        );

        // A non-string display field is treated the same as an absent one.
        let entry = json!({"title": 7});
        assert_eq!(display_value(EntityKind::Report, &entry), UNKNOWN_DISPLAY);
    }

    #[test]
    fn resource_names_and_descriptions_follow_kind() {
        let entry = json!({"main_name": "Turla"});
        assert_eq!(resource_name(EntityKind::Actor, &entry), "Threat Actor: Turla");
        assert_eq!(
            resource_description(EntityKind::Actor, &entry),
            "Threat actor known as Turla"
        );

        let entry = json!({"name": "vx-underground"});
        assert_eq!(resource_name(EntityKind::Source, &entry), "Source: vx-underground");
        assert_eq!(
            resource_description(EntityKind::Source, &entry),
            "Source vx-underground"
        );
    }
}
