//! Audit log entries and the change summaries rendered from them.
//!
//! The storage backend appends one [`AuditLogEntry`] per mutation. The
//! viewer turns each entry into a [`ChangeSummary`]: inserts and deletes are
//! reported as a single line, updates as a per-field list of changes.
//!
//! Field values are compared by their display text, the way the dashboard
//! showed them, so a number and a string that print the same (`0` and
//! `"0"`) are reported as unchanged.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields maintained by the backend itself and never reported as changes.
pub const EXCLUDED_FIELDS: &[&str] = &["updated_at"];

/// Server-assigned audit row identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLogId(i64);

impl AuditLogId {
    /// Wrap a raw storage identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Access the raw storage identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

/// Kind of mutation recorded by an audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    /// A row was created.
    Insert,
    /// A row was modified.
    Update,
    /// A row was removed.
    Delete,
}

impl AuditAction {
    /// Label as stored by the backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Storage identity.
    pub id: AuditLogId,
    /// What happened.
    pub action: AuditAction,
    /// Table the mutation touched.
    pub table_name: String,
    /// Row before the mutation; absent for inserts.
    #[serde(default)]
    pub old_data: Option<Value>,
    /// Row after the mutation; absent for deletes.
    #[serde(default)]
    pub new_data: Option<Value>,
    /// When the mutation was recorded.
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Summarise what this entry changed.
    #[must_use]
    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary::of(self)
    }
}

/// A single field that differs between the old and new snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// Column name.
    pub field: String,
    /// Display text of the previous value.
    pub old: String,
    /// Display text of the new value.
    pub new: String,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} → {}", self.field, self.old, self.new)
    }
}

/// Human-readable summary of one audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSummary {
    /// The row was inserted.
    Created,
    /// The row was deleted.
    Deleted,
    /// The listed fields changed, in the new snapshot's key order.
    Changed(Vec<FieldChange>),
    /// Only housekeeping fields (or nothing visible) changed.
    MinorUpdate,
}

impl ChangeSummary {
    /// Build the summary for `entry`.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use divedesk::domain::audit::{AuditAction, AuditLogEntry, AuditLogId, ChangeSummary};
    /// use serde_json::json;
    ///
    /// let entry = AuditLogEntry {
    ///     id: AuditLogId::new(1),
    ///     action: AuditAction::Update,
    ///     table_name: "clients".to_owned(),
    ///     old_data: Some(json!({"cert_level": "Open Water"})),
    ///     new_data: Some(json!({"cert_level": "Rescue Diver"})),
    ///     created_at: Utc::now(),
    /// };
    /// assert_eq!(
    ///     ChangeSummary::of(&entry).to_string(),
    ///     "cert_level: Open Water → Rescue Diver",
    /// );
    /// ```
    #[must_use]
    pub fn of(entry: &AuditLogEntry) -> Self {
        match entry.action {
            AuditAction::Insert => Self::Created,
            AuditAction::Delete => Self::Deleted,
            AuditAction::Update => {
                let changes = diff_snapshots(entry.old_data.as_ref(), entry.new_data.as_ref());
                if changes.is_empty() {
                    Self::MinorUpdate
                } else {
                    Self::Changed(changes)
                }
            }
        }
    }

    /// Per-field changes; empty for every variant but [`Self::Changed`].
    #[must_use]
    pub fn changes(&self) -> &[FieldChange] {
        match self {
            Self::Changed(changes) => changes,
            Self::Created | Self::Deleted | Self::MinorUpdate => &[],
        }
    }
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("new record created"),
            Self::Deleted => f.write_str("record deleted"),
            Self::MinorUpdate => f.write_str("minor update"),
            Self::Changed(changes) => {
                for (index, change) in changes.iter().enumerate() {
                    if index > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{change}")?;
                }
                Ok(())
            }
        }
    }
}

fn as_object(snapshot: Option<&Value>) -> Option<&Map<String, Value>> {
    snapshot.and_then(Value::as_object)
}

/// Compare two snapshots key by key over the new snapshot's keys.
///
/// Missing or non-object snapshots behave as empty objects.
#[must_use]
pub fn diff_snapshots(old: Option<&Value>, new: Option<&Value>) -> Vec<FieldChange> {
    let Some(after) = as_object(new) else {
        return Vec::new();
    };
    let before = as_object(old);
    after
        .iter()
        .filter(|(key, _)| !EXCLUDED_FIELDS.contains(&key.as_str()))
        .filter_map(|(key, new_value)| {
            let old_text = display_text(before.and_then(|map| map.get(key)));
            let new_text = display_text(Some(new_value));
            (old_text != new_text).then(|| FieldChange {
                field: key.clone(),
                old: old_text,
                new: new_text,
            })
        })
        .collect()
}

/// Display text of a snapshot value; `None` is a missing key.
#[must_use]
pub fn display_text(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_owned(),
        Some(Value::Null) => "null".to_owned(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Number(number)) => number_text(number),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => display_text(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_owned(),
    }
}

/// Number text in the dashboard's notation: plain decimals for exponents in
/// `-7..21`, otherwise `d.ddde±x`.
fn number_text(number: &serde_json::Number) -> String {
    if number.is_i64() || number.is_u64() {
        return number.to_string();
    }
    let Some(value) = number.as_f64() else {
        return number.to_string();
    };
    if value == 0.0 {
        return "0".to_owned();
    }
    // `{:e}` yields the shortest round-trip digits, e.g. `-1.25e-7`.
    let scientific = format!("{value:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return value.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return value.to_string();
    };
    let (sign, mantissa) = mantissa
        .strip_prefix('-')
        .map_or(("", mantissa), |magnitude| ("-", magnitude));
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let Ok(count) = i32::try_from(digits.len()) else {
        return value.to_string();
    };
    format!("{sign}{}", decimal_layout(&digits, count, exponent + 1))
}

/// Place `digits` so the decimal point falls after `point` of them.
fn decimal_layout(digits: &str, count: i32, point: i32) -> String {
    let zeros = |n: i32| "0".repeat(usize::try_from(n).unwrap_or(0));
    let split = |at: i32| digits.split_at_checked(usize::try_from(at).unwrap_or(0));
    if count <= point && point <= 21 {
        return format!("{digits}{}", zeros(point - count));
    }
    if (1..=21).contains(&point) {
        if let Some((whole, fraction)) = split(point) {
            return format!("{whole}.{fraction}");
        }
    }
    if (-5..=0).contains(&point) {
        return format!("0.{}{digits}", zeros(-point));
    }
    let exponent = point - 1;
    let exponent_sign = if exponent < 0 { '-' } else { '+' };
    match split(1) {
        Some((lead, "")) => format!("{lead}e{exponent_sign}{}", exponent.abs()),
        Some((lead, rest)) => format!("{lead}.{rest}e{exponent_sign}{}", exponent.abs()),
        None => format!("{digits}e{exponent_sign}{}", exponent.abs()),
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn base() -> AuditLogEntry {
        AuditLogEntry {
            id: AuditLogId::new(1),
            action: AuditAction::Update,
            table_name: "clients".to_owned(),
            old_data: None,
            new_data: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn with(
        base: AuditLogEntry,
        action: AuditAction,
        old: Option<Value>,
        new: Option<Value>,
    ) -> AuditLogEntry {
        AuditLogEntry {
            action,
            old_data: old,
            new_data: new,
            ..base
        }
    }

    #[rstest]
    fn insert_is_created(base: AuditLogEntry) {
        let entry = with(base, AuditAction::Insert, None, Some(json!({"id": 9})));
        assert_eq!(entry.summary(), ChangeSummary::Created);
        assert_eq!(entry.summary().to_string(), "new record created");
    }

    #[rstest]
    fn delete_is_deleted(base: AuditLogEntry) {
        let entry = with(base, AuditAction::Delete, Some(json!({"id": 9})), None);
        assert_eq!(entry.summary().to_string(), "record deleted");
        assert!(entry.summary().changes().is_empty());
    }

    #[rstest]
    fn certification_change_is_single_line(base: AuditLogEntry) {
        let entry = with(
            base,
            AuditAction::Update,
            Some(json!({"first_name": "John", "cert_level": "Open Water", "updated_at": "t1"})),
            Some(json!({"first_name": "John", "cert_level": "Rescue Diver", "updated_at": "t2"})),
        );
        assert_eq!(
            entry.summary(),
            ChangeSummary::Changed(vec![FieldChange {
                field: "cert_level".to_owned(),
                old: "Open Water".to_owned(),
                new: "Rescue Diver".to_owned(),
            }])
        );
    }

    #[rstest]
    fn only_timestamp_change_is_minor(base: AuditLogEntry) {
        let entry = with(
            base,
            AuditAction::Update,
            Some(json!({"room": "12", "updated_at": "t1"})),
            Some(json!({"room": "12", "updated_at": "t2"})),
        );
        assert_eq!(entry.summary().to_string(), "minor update");
    }

    #[rstest]
    fn changes_follow_new_snapshot_key_order(base: AuditLogEntry) {
        let entry = with(
            base,
            AuditAction::Update,
            Some(json!({"a": 1, "b": 1, "z": 1})),
            Some(json!({"z": 2, "b": 1, "a": 2})),
        );
        let fields: Vec<_> = entry
            .summary()
            .changes()
            .iter()
            .map(|change| change.field.clone())
            .collect();
        assert_eq!(fields, vec!["z".to_owned(), "a".to_owned()]);
    }

    #[rstest]
    fn new_key_reports_undefined_old_value(base: AuditLogEntry) {
        let entry = with(
            base,
            AuditAction::Update,
            Some(json!({})),
            Some(json!({"phone": null})),
        );
        assert_eq!(entry.summary().to_string(), "phone: undefined → null");
    }

    #[rstest]
    fn removed_keys_are_not_reported(base: AuditLogEntry) {
        let entry = with(
            base,
            AuditAction::Update,
            Some(json!({"notes": "x", "room": "1"})),
            Some(json!({"room": "1"})),
        );
        assert_eq!(entry.summary(), ChangeSummary::MinorUpdate);
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some(json!("not an object")), Some(json!([1, 2])))]
    fn missing_snapshots_are_empty_objects(
        base: AuditLogEntry,
        #[case] old: Option<Value>,
        #[case] new: Option<Value>,
    ) {
        let entry = with(base, AuditAction::Update, old, new);
        assert_eq!(entry.summary(), ChangeSummary::MinorUpdate);
    }

    #[rstest]
    fn missing_old_snapshot_reports_every_field(base: AuditLogEntry) {
        let entry = with(base, AuditAction::Update, None, Some(json!({"room": "4B"})));
        assert_eq!(entry.summary().to_string(), "room: undefined → 4B");
    }

    #[rstest]
    fn number_and_string_with_same_text_are_unchanged(base: AuditLogEntry) {
        let entry = with(
            base,
            AuditAction::Update,
            Some(json!({"tank": 0})),
            Some(json!({"tank": "0"})),
        );
        assert_eq!(entry.summary(), ChangeSummary::MinorUpdate);
    }

    #[rstest]
    fn multiple_changes_render_one_per_line(base: AuditLogEntry) {
        let entry = with(
            base,
            AuditAction::Update,
            Some(json!({"waiver": false, "deposit": false})),
            Some(json!({"waiver": true, "deposit": true})),
        );
        assert_eq!(
            entry.summary().to_string(),
            "waiver: false → true\ndeposit: false → true"
        );
    }

    #[rstest]
    #[case(json!(null), "null")]
    #[case(json!(true), "true")]
    #[case(json!(42), "42")]
    #[case(json!(-3), "-3")]
    #[case(json!(2.0), "2")]
    #[case(json!(-0.0), "0")]
    #[case(json!(1.5), "1.5")]
    #[case(json!(123.456), "123.456")]
    #[case(json!(0.000_001), "0.000001")]
    #[case(json!(1e-7), "1e-7")]
    #[case(json!(-2.5e-8), "-2.5e-8")]
    #[case(json!(1e21), "1e+21")]
    #[case(json!(1.25e22), "1.25e+22")]
    #[case(json!(1e20), "100000000000000000000")]
    #[case(json!("text"), "text")]
    #[case(json!([1, null, "a"]), "1,,a")]
    #[case(json!([[1, 2], 3]), "1,2,3")]
    #[case(json!({"k": 1}), "[object Object]")]
    fn display_text_matches_dashboard(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(display_text(Some(&value)), expected);
    }

    #[rstest]
    fn deserialises_backend_rows() {
        let entry: AuditLogEntry = serde_json::from_value(json!({
            "id": 7,
            "action": "DELETE",
            "table_name": "visit_members",
            "old_data": {"visit_id": 1, "client_id": 2},
            "new_data": null,
            "created_at": "2025-01-10T09:00:00Z",
        }))
        .expect("decode audit row");
        assert_eq!(entry.action, AuditAction::Delete);
        assert!(entry.new_data.is_none());
    }
}
