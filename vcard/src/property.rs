// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The vCard property model.

use crate::error::VCardError;

/// A property parameter (`TYPE=HOME,WORK`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name, uppercased.
    pub name: String,
    /// Parameter values, with surrounding quotes removed.
    pub values: Vec<String>,
}

/// A single vCard property parsed from a logical content line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Property {
    /// Optional property group prefix.
    pub group: Option<String>,
    /// Property name, uppercased.
    pub name: String,
    /// Parameters in source order.
    pub params: Vec<Parameter>,
    /// The raw (still escaped) value text.
    pub value: String,
}

impl Property {
    /// Creates a parameterless property.
    #[must_use]
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            group: None,
            name: name.to_string(),
            params: Vec::new(),
            value: value.into(),
        }
    }

    /// Parses a logical content line into a property.
    ///
    /// # Errors
    ///
    /// Returns an error when the line has no colon separator or no
    /// property name.
    pub fn parse(line: &str) -> Result<Self, VCardError> {
        let (head, value) = split_at_value(line)?;

        let mut segments = split_head(head);
        let name_segment = segments
            .next()
            .ok_or_else(|| VCardError::MissingName(line.to_string()))?;
        if name_segment.is_empty() {
            return Err(VCardError::MissingName(line.to_string()));
        }

        let (group, name) = match name_segment.split_once('.') {
            Some((group, name)) => (Some(group.to_string()), name),
            None => (None, name_segment.as_str()),
        };

        let mut params = Vec::new();
        for segment in segments {
            match segment.split_once('=') {
                Some((pname, pvalue)) => params.push(Parameter {
                    name: pname.to_ascii_uppercase(),
                    values: split_param_values(pvalue),
                }),
                // vCard 2.1 style bare parameter, e.g. TEL;HOME;VOICE
                None => params.push(Parameter {
                    name: "TYPE".to_string(),
                    values: vec![segment],
                }),
            }
        }

        Ok(Self {
            group,
            name: name.to_ascii_uppercase(),
            params,
            value: value.to_string(),
        })
    }

    /// Formats the property back into a logical content line.
    #[must_use]
    pub fn format_line(&self) -> String {
        let mut line = String::new();
        if let Some(group) = &self.group {
            line.push_str(group);
            line.push('.');
        }
        line.push_str(&self.name);
        for param in &self.params {
            line.push(';');
            line.push_str(&param.name);
            if !param.values.is_empty() {
                line.push('=');
                let quoted: Vec<String> = param
                    .values
                    .iter()
                    .map(|v| {
                        if v.contains([';', ',', ':']) {
                            format!("\"{v}\"")
                        } else {
                            v.clone()
                        }
                    })
                    .collect();
                line.push_str(&quoted.join(","));
            }
        }
        line.push(':');
        line.push_str(&self.value);
        line
    }

    /// Collects the uppercased values of every `TYPE` parameter.
    #[must_use]
    pub fn types(&self) -> Vec<String> {
        self.params
            .iter()
            .filter(|p| p.name == "TYPE")
            .flat_map(|p| p.values.iter())
            .map(|v| v.to_ascii_uppercase())
            .collect()
    }

    /// The first value of the named parameter, if present.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .and_then(|p| p.values.first())
            .map(String::as_str)
    }
}

/// Splits a content line at the first colon outside quotes.
fn split_at_value(line: &str) -> Result<(&str, &str), VCardError> {
    let mut in_quotes = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => {
                let (head, rest) = line.split_at(idx);
                return Ok((head, rest.get(1..).unwrap_or("")));
            }
            _ => {}
        }
    }
    Err(VCardError::MissingColon(line.to_string()))
}

/// Splits the pre-colon part on semicolons outside quotes.
fn split_head(head: &str) -> impl Iterator<Item = String> + '_ {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in head.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ';' if !in_quotes => segments.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    segments.push(current);
    segments.into_iter()
}

/// Splits a parameter value list on commas outside quotes, stripping
/// surrounding quotes from each value.
fn split_param_values(value: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in value.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => values.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    values.push(current);
    values
}
