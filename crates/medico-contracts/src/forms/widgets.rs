use anyhow::bail;

use crate::schema::{display_label, FeatureSchema};

use super::answers::RawValue;

/// One interactive input for one feature: free numeric entry, or a
/// single-select over a fixed option list.
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    NumberInput {
        name: String,
        label: String,
        help: String,
        default: f64,
    },
    SelectBox {
        name: String,
        label: String,
        help: String,
        options: Vec<String>,
    },
}

impl Widget {
    pub fn name(&self) -> &str {
        match self {
            Widget::NumberInput { name, .. } | Widget::SelectBox { name, .. } => name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Widget::NumberInput { label, .. } | Widget::SelectBox { label, .. } => label,
        }
    }

    pub fn help(&self) -> &str {
        match self {
            Widget::NumberInput { help, .. } | Widget::SelectBox { help, .. } => help,
        }
    }

    /// Value the widget holds before the user touches it: 0.0 for numeric
    /// entry, the first option for a select.
    pub fn default_value(&self) -> RawValue {
        match self {
            Widget::NumberInput { default, .. } => RawValue::Number(*default),
            Widget::SelectBox { .. } => RawValue::Choice(0),
        }
    }

    /// Parse one line of user input into the widget's raw value.
    ///
    /// Numeric entry accepts anything `f64` parses; empty input keeps the
    /// default. A select accepts the 1-based option number as printed, or
    /// the option text (case-insensitive), and collects the zero-based
    /// index of the match.
    pub fn parse_response(&self, response: &str) -> anyhow::Result<RawValue> {
        let trimmed = response.trim();
        match self {
            Widget::NumberInput { label, default, .. } => {
                if trimmed.is_empty() {
                    return Ok(RawValue::Number(*default));
                }
                match trimmed.parse::<f64>() {
                    Ok(value) => Ok(RawValue::Number(value)),
                    Err(_) => bail!("{label}: expected a number, got '{trimmed}'"),
                }
            }
            Widget::SelectBox { label, options, .. } => {
                if let Ok(position) = trimmed.parse::<usize>() {
                    if (1..=options.len()).contains(&position) {
                        return Ok(RawValue::Choice(position - 1));
                    }
                    bail!(
                        "{label}: option number must be between 1 and {}",
                        options.len()
                    );
                }
                if let Some(index) = options
                    .iter()
                    .position(|option| option.eq_ignore_ascii_case(trimmed))
                {
                    return Ok(RawValue::Choice(index));
                }
                bail!("{label}: '{trimmed}' is not one of: {}", options.join(", "))
            }
        }
    }
}

/// Produce exactly one widget per feature descriptor, in schema order.
///
/// Pure: emits widget descriptions only; collecting responses and calling
/// the model happen elsewhere.
pub fn render_widgets(schema: &FeatureSchema) -> Vec<Widget> {
    schema
        .iter()
        .map(|(name, spec)| {
            let label = display_label(name);
            match &spec.choices {
                Some(options) if !options.is_empty() => Widget::SelectBox {
                    name: name.clone(),
                    label,
                    help: spec.description.clone(),
                    options: options.clone(),
                },
                _ => Widget::NumberInput {
                    name: name.clone(),
                    label,
                    help: spec.description.clone(),
                    default: 0.0,
                },
            }
        })
        .collect()
}
