/// Static definition of one diagnosis panel: where its schema and model
/// artifact live and which sentence to show for each class label.
#[derive(Clone, Copy, Debug)]
pub struct PanelSpec {
    pub id: &'static str,
    pub title: &'static str,
    pub schema_file: &'static str,
    pub model_file: &'static str,
    pub positive_verdict: &'static str,
    pub negative_verdict: &'static str,
}

impl PanelSpec {
    pub fn verdict(&self, positive: bool) -> &'static str {
        if positive {
            self.positive_verdict
        } else {
            self.negative_verdict
        }
    }
}

pub const PANELS: &[PanelSpec] = &[
    PanelSpec {
        id: "heart",
        title: "Heart Disease Prediction",
        schema_file: "heart.json",
        model_file: "heart_model.json",
        positive_verdict: "The person has heart disease",
        negative_verdict: "The person does not have heart disease",
    },
    PanelSpec {
        id: "diabetes",
        title: "Diabetes Prediction",
        schema_file: "diabetes.json",
        model_file: "diabetes_model.json",
        positive_verdict: "The person is diabetic",
        negative_verdict: "The person is not diabetic",
    },
    PanelSpec {
        id: "parkinsons",
        title: "Parkinsons Prediction",
        schema_file: "parkinsons.json",
        model_file: "parkinsons_model.json",
        positive_verdict: "The person has Parkinson's disease",
        negative_verdict: "The person does not have Parkinson's disease",
    },
];

pub fn find_panel(id: &str) -> Option<&'static PanelSpec> {
    PANELS.iter().find(|panel| panel.id == id)
}

pub fn panel_ids() -> Vec<&'static str> {
    PANELS.iter().map(|panel| panel.id).collect()
}

#[cfg(test)]
mod tests {
    use super::{find_panel, panel_ids, PANELS};

    #[test]
    fn all_panels_resolve_by_id() {
        assert_eq!(panel_ids(), vec!["heart", "diabetes", "parkinsons"]);
        for panel in PANELS {
            let found = find_panel(panel.id).expect("panel id resolves");
            assert_eq!(found.title, panel.title);
        }
        assert!(find_panel("liver").is_none());
    }

    #[test]
    fn verdict_picks_fixed_sentence_per_label() {
        let heart = find_panel("heart").unwrap();
        assert_eq!(heart.verdict(true), "The person has heart disease");
        assert_eq!(heart.verdict(false), "The person does not have heart disease");
        let diabetes = find_panel("diabetes").unwrap();
        assert_eq!(diabetes.verdict(true), "The person is diabetic");
        assert_eq!(diabetes.verdict(false), "The person is not diabetic");
    }
}
