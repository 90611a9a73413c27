mod answers;
mod widgets;

pub use answers::{answers_from_json, AnswerMap, RawValue};
pub use widgets::{render_widgets, Widget};
