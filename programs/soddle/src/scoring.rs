use crate::{INITIAL_SCORE, TIME_PENALTY, TIME_PENALTY_INTERVAL, WRONG_GUESS_PENALTY};

/// Outcome of scoring one guess against a sub-game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub time_deduction:  u32,
    pub guess_deduction: u32,
    pub score:           u32,
}

/// Score of a sub-game right after its `guess_count`-th guess (this one included).
///
/// Only persisted counters go in, so any observer replaying
/// `(elapsed, guess_count, is_correct)` gets the same number. Wrong guesses
/// escalate: the k-th wrong guess costs `k * WRONG_GUESS_PENALTY`. The correct
/// guess itself is free, which keeps the locked score at or below the running
/// score left by the previous wrong guess.
pub fn score_guess(elapsed: i64, guess_count: u32, is_correct: bool) -> ScoreBreakdown {
    let wrong_guesses = if is_correct {
        guess_count.saturating_sub(1)
    } else {
        guess_count
    };
    let time_deduction  = time_deduction(elapsed);
    let guess_deduction = guess_deduction(wrong_guesses);
    let score = INITIAL_SCORE
        .saturating_sub(time_deduction)
        .saturating_sub(guess_deduction);

    ScoreBreakdown { time_deduction, guess_deduction, score }
}

/// Step-wise decay: `TIME_PENALTY` points per full `TIME_PENALTY_INTERVAL` seconds.
pub fn time_deduction(elapsed: i64) -> u32 {
    if elapsed <= 0 {
        return 0;
    }
    let periods = (elapsed / TIME_PENALTY_INTERVAL) as u64;
    let deduction = periods.saturating_mul(TIME_PENALTY as u64);
    u32::try_from(deduction).unwrap_or(u32::MAX)
}

/// Sum of escalating wrong-guess penalties: `P * w(w+1)/2`.
pub fn guess_deduction(wrong_guesses: u32) -> u32 {
    let w = wrong_guesses as u64;
    let steps = w.saturating_mul(w + 1) / 2;
    let deduction = steps.saturating_mul(WRONG_GUESS_PENALTY as u64);
    u32::try_from(deduction).unwrap_or(u32::MAX)
}
