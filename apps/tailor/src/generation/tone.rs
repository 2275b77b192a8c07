//! Tone calibration: maps inferred seniority to verb sets and emphasis.
//!
//! A new-grad role never gets leadership verbs, whatever the template category.

use crate::generation::job_context::Seniority;

/// Verb sets and framing calibrated to a seniority level.
#[derive(Debug, Clone)]
pub struct ToneFraming {
    pub strong_verbs: Vec<&'static str>,
    pub avoid_verbs: Vec<&'static str>,
    pub emphasis: &'static str,
}

/// Returns tone framing for the inferred seniority.
pub fn get_tone_framing(seniority: Seniority) -> ToneFraming {
    match seniority {
        Seniority::Senior => ToneFraming {
            strong_verbs: vec![
                "Architected",
                "Led",
                "Owned",
                "Drove",
                "Scaled",
                "Mentored",
            ],
            avoid_verbs: vec!["assisted", "helped", "participated in", "learned"],
            emphasis: "ownership of systems at scale, technical leadership, and measurable business impact",
        },
        Seniority::Mid => ToneFraming {
            strong_verbs: vec![
                "Built",
                "Delivered",
                "Implemented",
                "Improved",
                "Designed",
                "Shipped",
            ],
            avoid_verbs: vec!["helped", "assisted", "was responsible for"],
            emphasis: "independent delivery of features, production ownership, and quantified results",
        },
        Seniority::NewGrad => ToneFraming {
            strong_verbs: vec![
                "Developed",
                "Implemented",
                "Built",
                "Contributed to",
                "Collaborated on",
                "Applied",
            ],
            avoid_verbs: vec!["architected", "spearheaded", "led the organization", "owned end-to-end"],
            emphasis: "strong fundamentals, relevant coursework and projects, and fast learning",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_senior_includes_leadership_verbs() {
        let t = get_tone_framing(Seniority::Senior);
        assert!(t.strong_verbs.contains(&"Architected"));
        assert!(t.strong_verbs.contains(&"Mentored"));
    }

    #[test]
    fn test_new_grad_avoids_inflated_ownership() {
        let t = get_tone_framing(Seniority::NewGrad);
        assert!(t.avoid_verbs.contains(&"architected"));
        assert!(!t.strong_verbs.contains(&"Led"));
    }

    #[test]
    fn test_verb_sets_never_overlap() {
        for s in [Seniority::Senior, Seniority::Mid, Seniority::NewGrad] {
            let t = get_tone_framing(s);
            for v in &t.strong_verbs {
                assert!(
                    !t.avoid_verbs.iter().any(|a| a.eq_ignore_ascii_case(v)),
                    "{v} is both strong and avoided for {s:?}"
                );
            }
        }
    }
}
