//! Content heuristics shared by status, priority and completeness derivation.

use crate::types::{
    CompletenessAssessment, CompletenessCriterion, CompletionStatus, Priority,
};

pub const SUBSTANTIAL_DESCRIPTION_CHARS: usize = 50;
pub const DETAILED_DESCRIPTION_CHARS: usize = 100;

pub fn has_valid_live_demo(url: Option<&str>) -> bool {
    match url.map(str::trim) {
        Some(u) if !u.is_empty() => u.starts_with("http://") || u.starts_with("https://"),
        _ => false,
    }
}

fn trimmed_len(description: Option<&str>) -> usize {
    description.map(|d| d.trim().chars().count()).unwrap_or(0)
}

pub fn has_substantial_description(description: Option<&str>) -> bool {
    trimmed_len(description) >= SUBSTANTIAL_DESCRIPTION_CHARS
}

/// First match wins: live demo, then substantial description, else backlog.
pub fn determine_status(description: Option<&str>, live_demo_url: Option<&str>) -> CompletionStatus {
    if has_valid_live_demo(live_demo_url) {
        CompletionStatus::Live
    } else if has_substantial_description(description) {
        CompletionStatus::InProgress
    } else {
        CompletionStatus::Backlog
    }
}

/// First match wins: live demo, then a detailed description, else low.
pub fn determine_priority(description: Option<&str>, live_demo_url: Option<&str>) -> Priority {
    if has_valid_live_demo(live_demo_url) {
        Priority::High
    } else if trimmed_len(description) > DETAILED_DESCRIPTION_CHARS {
        Priority::Medium
    } else {
        Priority::Low
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompletenessInputs<'a> {
    pub description: Option<&'a str>,
    pub live_demo_url: Option<&'a str>,
    pub has_skills: bool,
    pub has_experiences: bool,
}

pub fn assess_completeness(inputs: CompletenessInputs<'_>) -> CompletenessAssessment {
    let satisfied = |c: CompletenessCriterion| match c {
        CompletenessCriterion::HasDescription => has_substantial_description(inputs.description),
        CompletenessCriterion::HasLiveDemo => has_valid_live_demo(inputs.live_demo_url),
        CompletenessCriterion::HasSkills => inputs.has_skills,
        CompletenessCriterion::HasExperiences => inputs.has_experiences,
    };
    let missing: Vec<_> = CompletenessCriterion::ALL
        .into_iter()
        .filter(|c| !satisfied(*c))
        .collect();
    CompletenessAssessment {
        score: (CompletenessCriterion::ALL.len() - missing.len()) as u8,
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_demo_requires_http_scheme() {
        assert!(!has_valid_live_demo(Some("ftp://x.com")));
        assert!(has_valid_live_demo(Some("https://x.com")));
        assert!(has_valid_live_demo(Some("  http://x.com  ")));
        assert!(!has_valid_live_demo(Some("  ")));
        assert!(!has_valid_live_demo(Some("x.com")));
        assert!(!has_valid_live_demo(None));
    }

    #[test]
    fn substantial_description_boundary() {
        let forty_nine = "d".repeat(49);
        let fifty = "d".repeat(50);
        assert!(!has_substantial_description(Some(&forty_nine)));
        assert!(has_substantial_description(Some(&fifty)));
        let padded = format!("   {forty_nine}   ");
        assert!(!has_substantial_description(Some(&padded)));
        assert!(!has_substantial_description(None));
    }

    #[test]
    fn live_demo_beats_description_for_status() {
        let long = "x".repeat(200);
        assert_eq!(
            determine_status(Some(&long), Some("https://demo.example")),
            CompletionStatus::Live
        );
        assert_eq!(determine_status(Some(&long), None), CompletionStatus::InProgress);
        assert_eq!(determine_status(Some("short"), None), CompletionStatus::Backlog);
    }

    #[test]
    fn priority_precedence() {
        let hundred = "p".repeat(100);
        let hundred_one = "p".repeat(101);
        assert_eq!(determine_priority(None, Some("https://a.b")), Priority::High);
        assert_eq!(determine_priority(Some(&hundred_one), None), Priority::Medium);
        assert_eq!(determine_priority(Some(&hundred), None), Priority::Low);
        assert_eq!(determine_priority(None, Some("ftp://a.b")), Priority::Low);
    }

    #[test]
    fn completeness_lists_missing_in_declaration_order() {
        let a = assess_completeness(CompletenessInputs {
            description: None,
            live_demo_url: Some("https://x.com"),
            has_skills: false,
            has_experiences: false,
        });
        assert_eq!(a.score, 1);
        assert_eq!(
            a.missing,
            vec![
                CompletenessCriterion::HasDescription,
                CompletenessCriterion::HasSkills,
                CompletenessCriterion::HasExperiences,
            ]
        );
    }

    #[test]
    fn full_completeness() {
        let desc = "z".repeat(60);
        let a = assess_completeness(CompletenessInputs {
            description: Some(&desc),
            live_demo_url: Some("http://x.com"),
            has_skills: true,
            has_experiences: true,
        });
        assert_eq!(a.score, 4);
        assert!(a.missing.is_empty());
        assert_eq!(a.percentage(), 100);
    }
}
