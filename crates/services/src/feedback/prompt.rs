use std::fmt::Write as _;

use lesson_core::model::{FeedbackRates, LessonPerformanceSummary};

pub const SYSTEM_INSTRUCTION: &str =
    "You are a supportive sign language learning coach. Never use emojis in your responses.";

/// Coaching prompt sent to text backends.
#[must_use]
pub fn build_prompt(summary: &LessonPerformanceSummary, rates: &FeedbackRates) -> String {
    let minutes = summary.total_time_seconds / 60;
    let seconds = summary.total_time_seconds % 60;

    let mut breakdown = String::new();
    for (idx, detail) in summary.challenge_details.iter().enumerate() {
        if idx > 0 {
            breakdown.push('\n');
        }
        let _ = write!(
            breakdown,
            "Challenge {} ({}): {} retries, {}s",
            idx + 1,
            detail.kind,
            detail.retries,
            detail.time_spent
        );
    }

    format!(
        "You are an encouraging and insightful language learning coach. Analyze this user's lesson performance and provide personalized, motivating feedback.

Performance Data:
- Total Challenges: {total}
- First-Try Success: {first} ({accuracy:.1}%)
- Total Retries: {retries} (avg {retry_rate:.1} per challenge)
- Total Time: {minutes} minutes {seconds} seconds
- Average Time per Challenge: {avg:.0} seconds
- Points Earned: {points}

Challenge Breakdown:
{breakdown}

Provide feedback in 3 sections:
1. Strengths (1-2 sentences highlighting what they did well)
2. Areas for Improvement (1-2 specific, actionable suggestions)
3. Motivation (1 encouraging sentence)

Keep it concise, personal, and motivating. Focus on sign language learning specifically. Do NOT use emojis.",
        total = summary.total_challenges,
        first = summary.correct_first_try,
        accuracy = rates.accuracy_rate,
        retries = summary.total_retries,
        retry_rate = rates.retry_rate,
        avg = rates.avg_time_per_challenge,
        points = summary.points_earned,
    )
}
