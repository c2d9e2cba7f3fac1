//! Parser for the human-editable template format: JSON extended with `//`
//! line comments, where the comment after a field line doubles as the
//! field's user-facing description. Comment stripping is escape-aware so
//! `//` and commas inside quoted strings survive, and a trailing comma
//! before a closing bracket is tolerated.

use indexmap::IndexMap;
use serde_json::Value;

use crate::errors::TemplateParseError;
use crate::schema::DocumentTemplate;

pub fn parse_template(content: &str) -> Result<DocumentTemplate, TemplateParseError> {
    let mut template = DocumentTemplate::default();
    let mut cleaned_lines = Vec::new();

    for line in content.lines() {
        let (code, comment) = split_comment(line);
        let code = code.trim_end();
        if let Some(comment) = comment {
            let description = comment.trim();
            if !description.is_empty() {
                if let Some(field) = leading_field_name(code) {
                    template
                        .descriptions
                        .insert(field.to_owned(), description.to_owned());
                }
            }
        }
        if !code.trim().is_empty() {
            cleaned_lines.push(code.to_owned());
        }
    }

    let cleaned = strip_trailing_commas(&cleaned_lines.join("\n"));
    let parsed: IndexMap<String, Value> = serde_json::from_str(&cleaned)?;
    if parsed.is_empty() {
        return Err(TemplateParseError::EmptyTemplate);
    }

    for (field, value) in parsed {
        let default = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        template.fields.insert(field, default);
    }
    // Descriptions only make sense for fields that actually parsed.
    let fields = &template.fields;
    template
        .descriptions
        .retain(|field, _| fields.contains_key(field));
    Ok(template)
}

/// Splits a line at the first `//` that sits outside a quoted string.
/// Returns the code part and the comment body (without the slashes).
fn split_comment(line: &str) -> (&str, Option<&str>) {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if escaped {
            escaped = false;
        } else if b == b'\\' && in_string {
            escaped = true;
        } else if b == b'"' {
            in_string = !in_string;
        } else if !in_string && b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            return (&line[..i], Some(&line[i + 2..]));
        }
        i += 1;
    }
    (line, None)
}

/// First quoted token on a field line, e.g. `"delegator.name": "", ...`.
fn leading_field_name(code: &str) -> Option<&str> {
    let trimmed = code.trim_start();
    let rest = trimmed.strip_prefix('"')?;
    let end = rest.find('"')?;
    // Only key positions qualify; a bare string value line has no colon.
    rest[end + 1..].trim_start().strip_prefix(':')?;
    Some(&rest[..end])
}

/// Removes commas that directly precede a closing `}` or `]`, outside
/// strings.
fn strip_trailing_commas(content: &str) -> String {
    let bytes = content.as_bytes();
    let mut out = String::with_capacity(content.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        let c = b as char;
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' if in_string => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = !in_string;
                out.push(c);
            }
            ',' if !in_string => {
                let next_meaningful = bytes[i + 1..]
                    .iter()
                    .copied()
                    .find(|&b| !(b as char).is_whitespace());
                if !matches!(next_meaningful, Some(b'}') | Some(b']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{parse_template, split_comment, strip_trailing_commas};

    #[test]
    fn parses_fields_defaults_and_descriptions() {
        let template = parse_template(
            r#"{
                "recipient.name": "", //name of the benefit recipient
                "recipient.birthdate": "", //date of birth, YYYY-MM-DD
                "receive_period.total_months": ""
            }"#,
        )
        .expect("should parse");

        assert_eq!(template.fields.len(), 3);
        assert_eq!(template.fields["recipient.name"], "");
        assert_eq!(
            template.descriptions["recipient.birthdate"],
            "date of birth, YYYY-MM-DD"
        );
        assert!(!template
            .descriptions
            .contains_key("receive_period.total_months"));
    }

    #[test]
    fn preserves_template_field_order() {
        let template = parse_template(
            r#"{
                "z.last": "",
                "a.first": "",
                "m.middle": ""
            }"#,
        )
        .expect("should parse");
        let order: Vec<&str> = template.fields.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["z.last", "a.first", "m.middle"]);
    }

    #[test]
    fn slashes_and_commas_inside_strings_survive() {
        let template = parse_template(
            r#"{
                "site.url": "https://example.gov/form", //portal address
                "applicant.address": "12 Main St, Unit 3" //street, unit
            }"#,
        )
        .expect("should parse");
        assert_eq!(template.fields["site.url"], "https://example.gov/form");
        assert_eq!(template.fields["applicant.address"], "12 Main St, Unit 3");
        assert_eq!(template.descriptions["applicant.address"], "street, unit");
    }

    #[test]
    fn trailing_comma_before_closing_brace_is_tolerated() {
        let template = parse_template(
            r#"{
                "a.one": "x",
                "a.two": "y",
            }"#,
        )
        .expect("should parse despite trailing comma");
        assert_eq!(template.fields.len(), 2);
    }

    #[test]
    fn comment_only_and_blank_lines_are_dropped() {
        let template = parse_template(
            "{\n// header comment\n\n\"a.one\": \"\" //desc\n}\n",
        )
        .expect("should parse");
        assert_eq!(template.fields.len(), 1);
        assert_eq!(template.descriptions["a.one"], "desc");
    }

    #[test]
    fn non_string_defaults_are_stringified() {
        let template = parse_template(r#"{"household.size": 3}"#).expect("should parse");
        assert_eq!(template.fields["household.size"], "3");
    }

    #[test]
    fn empty_object_is_rejected() {
        assert!(parse_template("{}").is_err());
        assert!(parse_template("// only comments\n{}").is_err());
    }

    #[test]
    fn invalid_json_is_an_error_not_a_panic() {
        assert!(parse_template("{\"a\": }").is_err());
    }

    #[test]
    fn split_comment_respects_escaped_quotes() {
        let (code, comment) = split_comment(r#""note": "say \"hi\" // not a comment", //real"#);
        assert!(code.contains("not a comment"));
        assert_eq!(comment, Some("real"));
    }

    #[test]
    fn strip_trailing_commas_keeps_commas_in_strings() {
        let cleaned = strip_trailing_commas("{\"a\": \"x, y\", }");
        assert_eq!(cleaned, "{\"a\": \"x, y\" }");
    }
}
