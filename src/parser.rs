//! Line scanners for the semi-structured text emitted by inventory tools and
//! kernel tables.
//!
//! Two shapes are handled: `Label: Value` records separated by header lines
//! (SMBIOS dumps) and whitespace-delimited columns (PCI listings, the routing
//! table). Nothing here fails: a field that is absent keeps the sentinel value
//! of the record type.

/// Value part of a `Label: Value` line: everything after the first `:` and one
/// following space, without the line terminator.
pub fn field_value(line: &str) -> Option<&str> {
    let (_, rest) = line.split_once(':')?;
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    Some(rest.trim_end_matches(['\r', '\n']))
}

/// Value of a `Label: Value` field line whose field name is exactly `label`
/// (colon included, e.g. `"Max Speed:"`). Leading indentation is ignored, so
/// `"Type:"` matches neither `"Type Detail:"` nor `"Error Correction Type:"`.
pub fn labeled<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    if !line.trim_start().starts_with(label) {
        return None;
    }
    field_value(line)
}

/// Leading unsigned integer of a value, 0 when it does not start with digits
/// (`"Unknown"`, `"Not Specified"`).
pub fn leading_count(value: &str) -> u32 {
    let digits: &str = {
        let v = value.trim_start();
        let end = v.find(|c: char| !c.is_ascii_digit()).unwrap_or(v.len());
        &v[..end]
    };
    digits.parse().unwrap_or(0)
}

/// `value` as an owned field, or `None` when it is empty.
pub fn non_empty(value: &str) -> Option<String> {
    let v = value.trim();
    (!v.is_empty()).then(|| v.to_string())
}

/// A record assembled from `Label: Value` lines.
pub trait Record: Default {
    /// Consumes one line; returns whether a known field was captured.
    fn apply(&mut self, line: &str) -> bool;

    /// Whether the key field is populated, i.e. the record describes a real
    /// entity and may be flushed when the next header arrives.
    fn is_populated(&self) -> bool;

    /// Whether the record explicitly describes an empty slot. Vacant records
    /// are never flushed, not even as the final record.
    fn is_vacant(&self) -> bool {
        false
    }
}

/// Splits `text` into records opened by unindented lines containing `header`.
///
/// Fields are only read inside a header's section, which ends at a blank
/// line or at any other unindented line (e.g. the `Handle 0x…, DMI type N`
/// line of the next SMBIOS structure). A record is flushed at the next header
/// only if it is populated; the last record is flushed if it captured any
/// field at all, since nothing follows it.
pub fn scan_records<R: Record>(text: &str, header: &str) -> Vec<R> {
    let mut out = Vec::new();
    let mut current = R::default();
    let mut touched = false;
    let mut in_section = false;

    for line in text.lines() {
        if line.trim().is_empty() {
            in_section = false;
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            in_section = line.contains(header);
            if in_section {
                let finished = std::mem::take(&mut current);
                if finished.is_populated() && !finished.is_vacant() {
                    out.push(finished);
                }
                touched = false;
            }
            continue;
        }
        if in_section && current.apply(line) {
            touched = true;
        }
    }

    if touched && !current.is_vacant() {
        out.push(current);
    }
    out
}

/// Whitespace-delimited columns of one table row.
pub fn columns(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}
