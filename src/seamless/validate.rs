pub const REQUIRED_SECTIONS: [&str; 5] = [
    "Session Summary",
    "Technical Context",
    "Knowledge Extractions",
    "Next Steps",
    "Active Context",
];
pub const MIN_SECTIONS_FOUND: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    TooShort { chars: usize, min: usize },
    MissingSections { found: usize },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Empty => write!(f, "output was empty"),
            Rejection::TooShort { chars, min } => {
                write!(f, "output too short ({chars} chars, need {min})")
            }
            Rejection::MissingSections { found } => write!(
                f,
                "only {found} of {} expected sections present",
                REQUIRED_SECTIONS.len()
            ),
        }
    }
}

pub fn sections_found(output: &str) -> usize {
    let lowered = output.to_lowercase();
    REQUIRED_SECTIONS
        .iter()
        .filter(|section| lowered.contains(&section.to_lowercase()))
        .count()
}

/// Accept a summarizer response or say why not.
pub fn check_summary(output: &str, min_chars: usize) -> Result<(), Rejection> {
    if output.trim().is_empty() {
        return Err(Rejection::Empty);
    }
    let chars = output.chars().count();
    if chars < min_chars {
        return Err(Rejection::TooShort {
            chars,
            min: min_chars,
        });
    }
    let found = sections_found(output);
    if found < MIN_SECTIONS_FOUND {
        return Err(Rejection::MissingSections { found });
    }
    Ok(())
}
