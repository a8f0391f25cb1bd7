//! Display names for backend expression and gender labels.

/// Expression labels in the order the expression model emits them.
pub const EXPRESSION_LABELS: [&str; 7] = [
    "neutral",
    "happy",
    "sad",
    "angry",
    "fearful",
    "disgusted",
    "surprised",
];

/// Gender labels in the order the age/gender model emits them.
pub const GENDER_LABELS: [&str; 2] = ["male", "female"];

/// Unrecognized labels are returned unchanged.
pub fn localize_expression(label: &str) -> &str {
    match label {
        "neutral" => "Neutral",
        "happy" => "Happy",
        "sad" => "Sad",
        "angry" => "Angry",
        "fearful" => "Fearful",
        "disgusted" => "Disgusted",
        "surprised" => "Surprised",
        other => other,
    }
}

/// Unrecognized labels are returned unchanged.
pub fn localize_gender(label: &str) -> &str {
    match label {
        "male" => "Male",
        "female" => "Female",
        other => other,
    }
}
