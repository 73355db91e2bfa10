use lesson_core::model::FeedbackRates;

/// Deterministic feedback used when no text backend produced anything.
#[must_use]
pub fn rule_based_feedback(rates: &FeedbackRates) -> String {
    let mut feedback = String::from("Lesson Summary\n\n");

    feedback.push_str("Strengths\n");
    feedback.push_str(if rates.accuracy_rate >= 80.0 {
        "Excellent accuracy! You're mastering the signs quickly. "
    } else if rates.accuracy_rate >= 60.0 {
        "Good progress! You're getting most signs correct. "
    } else {
        "You completed the lesson! Every attempt helps you learn. "
    });
    feedback.push_str(if rates.avg_time_per_challenge < 15.0 {
        "Your quick response time shows great confidence.\n\n"
    } else {
        "Taking time to think through each sign shows careful learning.\n\n"
    });

    feedback.push_str("Areas for Improvement\n");
    feedback.push_str(if rates.retry_rate > 1.5 {
        "Try watching the reference videos more carefully before attempting. \
         Practice challenging signs multiple times before moving on.\n\n"
    } else if rates.avg_time_per_challenge > 30.0 {
        "Build confidence by practicing signs daily. \
         Try repeating lessons to improve muscle memory.\n\n"
    } else {
        "Keep practicing to maintain this great momentum. \
         Challenge yourself with harder lessons.\n\n"
    });

    feedback.push_str("Keep Going\n");
    feedback.push_str("Sign language mastery comes with consistent practice. You're doing great!");
    feedback
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates(accuracy_rate: f64, retry_rate: f64, avg_time_per_challenge: f64) -> FeedbackRates {
        FeedbackRates {
            accuracy_rate,
            retry_rate,
            avg_time_per_challenge,
        }
    }

    #[test]
    fn strong_fast_lesson() {
        let text = rule_based_feedback(&rates(90.0, 0.2, 10.0));
        assert!(text.starts_with("Lesson Summary\n\nStrengths\n"));
        assert!(text.contains("Excellent accuracy!"));
        assert!(text.contains("quick response time"));
        assert!(text.contains("Challenge yourself with harder lessons."));
        assert!(text.ends_with("You're doing great!"));
    }

    #[test]
    fn struggling_slow_lesson() {
        let text = rule_based_feedback(&rates(50.0, 2.0, 40.0));
        assert!(text.contains("Every attempt helps you learn."));
        assert!(text.contains("careful learning"));
        assert!(text.contains("reference videos"));
        assert!(!text.contains("practicing signs daily"));
    }

    #[test]
    fn middle_bands() {
        let text = rule_based_feedback(&rates(60.0, 1.5, 31.0));
        assert!(text.contains("Good progress!"));
        assert!(text.contains("practicing signs daily"));

        let text = rule_based_feedback(&rates(79.9, 0.0, 15.0));
        assert!(text.contains("Good progress!"));
        assert!(text.contains("careful learning"));
    }

    #[test]
    fn sections_are_separated_by_blank_lines() {
        let text = rule_based_feedback(&rates(70.0, 1.0, 20.0));
        let sections: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(sections.len(), 4);
        assert_eq!(sections[0], "Lesson Summary");
        assert!(sections[1].starts_with("Strengths\n"));
        assert!(sections[2].starts_with("Areas for Improvement\n"));
        assert!(sections[3].starts_with("Keep Going\n"));
    }
}
