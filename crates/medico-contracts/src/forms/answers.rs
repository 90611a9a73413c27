use anyhow::bail;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::widgets::Widget;

/// Raw value collected from one widget before coercion into the input
/// vector: a number as entered, or the zero-based index of a selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    Number(f64),
    Choice(usize),
}

impl RawValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            RawValue::Number(value) => *value,
            RawValue::Choice(index) => *index as f64,
        }
    }
}

/// Ordered feature-name → raw-value mapping for one submission.
pub type AnswerMap = IndexMap<String, RawValue>;

/// Build an answer map from a JSON object of submitted values, keyed by
/// feature name.
///
/// Numeric widgets take a JSON number or a numeric string; selects take the
/// option text (case-insensitive) or the zero-based index as a JSON number.
/// Widgets without a submitted value keep their defaults, matching a form
/// the user left untouched. Keys naming no widget are rejected.
pub fn answers_from_json(widgets: &[Widget], values: &Map<String, Value>) -> anyhow::Result<AnswerMap> {
    for key in values.keys() {
        if !widgets.iter().any(|widget| widget.name() == key) {
            bail!("unknown feature '{key}' in submitted values");
        }
    }

    let mut answers = AnswerMap::new();
    for widget in widgets {
        let answer = match values.get(widget.name()) {
            None => widget.default_value(),
            Some(value) => json_answer(widget, value)?,
        };
        answers.insert(widget.name().to_string(), answer);
    }
    Ok(answers)
}

fn json_answer(widget: &Widget, value: &Value) -> anyhow::Result<RawValue> {
    match widget {
        Widget::NumberInput { label, .. } => match value {
            Value::Number(number) => match number.as_f64() {
                Some(parsed) => Ok(RawValue::Number(parsed)),
                None => bail!("{label}: number {number} is out of range"),
            },
            Value::String(text) => widget.parse_response(text),
            other => bail!("{label}: expected a number, got {other}"),
        },
        Widget::SelectBox { label, options, .. } => match value {
            Value::Number(number) => {
                let index = number
                    .as_u64()
                    .map(|index| index as usize)
                    .filter(|index| *index < options.len());
                match index {
                    Some(index) => Ok(RawValue::Choice(index)),
                    None => bail!(
                        "{label}: option index {number} must be an integer below {}",
                        options.len()
                    ),
                }
            }
            Value::String(text) => match options
                .iter()
                .position(|option| option.eq_ignore_ascii_case(text.trim()))
            {
                Some(index) => Ok(RawValue::Choice(index)),
                None => bail!("{label}: '{text}' is not one of: {}", options.join(", ")),
            },
            other => bail!("{label}: expected an option, got {other}"),
        },
    }
}
