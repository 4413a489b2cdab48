//! Parsing of the first-stage (position detection) response.

use crate::types::Step1Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step1Field {
    Viewpoint,
    ChildLocation,
    ChildGaze,
    Age,
    Legs,
    Position,
}

/// Line prefixes recognized in a step-1 response, checked in order.
///
/// `ПЕРЕНОСКА:` and `РЕБЁНОК:` are labels from older prompt versions.
const STEP1_LABELS: &[(&str, Step1Field)] = &[
    ("РАКУРС:", Step1Field::Viewpoint),
    ("РЕБЁНОК_ГДЕ:", Step1Field::ChildLocation),
    ("РЕБЁНОК_КУДА_СМОТРИТ:", Step1Field::ChildGaze),
    ("ВОЗРАСТ:", Step1Field::Age),
    ("НОГИ:", Step1Field::Legs),
    ("ПОЗИЦИЯ:", Step1Field::Position),
    ("ПЕРЕНОСКА:", Step1Field::ChildLocation),
    ("РЕБЁНОК:", Step1Field::ChildGaze),
];

impl Step1Result {
    fn slot(&mut self, field: Step1Field) -> &mut String {
        match field {
            Step1Field::Viewpoint => &mut self.viewpoint,
            Step1Field::ChildLocation => &mut self.child_location,
            Step1Field::ChildGaze => &mut self.child_gaze,
            Step1Field::Age => &mut self.age,
            Step1Field::Legs => &mut self.legs,
            Step1Field::Position => &mut self.position,
        }
    }
}

/// Parse labelled lines out of a step-1 response.
///
/// Unrecognized and blank lines are skipped; a repeated label keeps the
/// last value.
pub fn parse_step1(text: &str) -> Step1Result {
    let mut result = Step1Result::default();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let matched = STEP1_LABELS
            .iter()
            .find_map(|(label, field)| line.strip_prefix(label).map(|rest| (*field, rest)));

        if let Some((field, rest)) = matched {
            *result.slot(field) = rest.trim().to_string();
        }
    }

    result
}
