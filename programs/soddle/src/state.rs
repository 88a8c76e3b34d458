use anchor_lang::prelude::*;

use crate::scoring::{guess_deduction, score_guess, time_deduction, ScoreBreakdown};
use crate::*;

// Every persisted account is fixed-width: no Vec/String fields, `version`
// first so a future layout can be told apart from this one.

// ── Competition (embedded in GameState) ──────────────────────────────────

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Competition {
    pub id:         [u8; COMPETITION_ID_LEN], // 16
    pub start_time: i64,                      // 8
    pub end_time:   i64,                      // 8
}

impl Competition {
    pub const LEN: usize = COMPETITION_ID_LEN + 8 + 8;

    pub fn open(sequence: u64, now: i64) -> Result<Self> {
        let end_time = now
            .checked_add(COMPETITION_DURATION)
            .ok_or(SoddleError::NumericOverflow)?;
        Ok(Self { id: competition_id(sequence), start_time: now, end_time })
    }

    pub fn has_ended(&self, now: i64) -> bool {
        now >= self.end_time
    }
}

/// `COMP` followed by the rotation sequence, zero-padded to 12 digits, so ids
/// sort lexically in the order they were opened.
pub fn competition_id(sequence: u64) -> [u8; COMPETITION_ID_LEN] {
    let mut id = [b'0'; COMPETITION_ID_LEN];
    id[..COMPETITION_TAG.len()].copy_from_slice(COMPETITION_TAG);
    let mut n = sequence;
    for digit in id[COMPETITION_TAG.len()..].iter_mut().rev() {
        *digit = b'0' + (n % 10) as u8;
        n /= 10;
    }
    id
}

// ── GameState PDA ── seeds: ["game_state"] ──────────────────────────────

#[account]
#[derive(Debug, Default, PartialEq)]
pub struct GameState {
    pub version:             u8,          // 1
    pub authority:           Pubkey,      // 32
    pub platform_wallet:     Pubkey,      // 32
    pub reward_destination:  Pubkey,      // 32
    pub current_competition: Competition, // 32
    pub competition_count:   u64,         // 8
    pub last_update_time:    i64,         // 8
    pub bump:                u8,          // 1
}

impl GameState {
    pub const LEN: usize = 1 + 32 + 32 + 32 + Competition::LEN + 8 + 8 + 1;

    pub fn initialize(
        &mut self,
        signer: Pubkey,
        platform_wallet: Pubkey,
        reward_destination: Pubkey,
        now: i64,
        bump: u8,
    ) -> Result<()> {
        require_keys_eq!(signer, GAME_AUTHORITY, SoddleError::UnauthorizedAuthority);
        require_keys_neq!(platform_wallet, Pubkey::default(), SoddleError::InvalidDestination);
        require_keys_neq!(reward_destination, Pubkey::default(), SoddleError::InvalidDestination);

        self.version             = ACCOUNT_VERSION;
        self.authority           = signer;
        self.platform_wallet     = platform_wallet;
        self.reward_destination  = reward_destination;
        self.current_competition = Competition::open(1, now)?;
        self.competition_count   = 1;
        self.last_update_time    = now;
        self.bump                = bump;
        Ok(())
    }

    pub fn ensure_authority(&self, signer: Pubkey) -> Result<()> {
        require_keys_eq!(signer, self.authority, SoddleError::UnauthorizedAuthority);
        Ok(())
    }

    /// Close the running competition and open the next one at `now`.
    pub fn rotate_competition(&mut self, signer: Pubkey, now: i64) -> Result<Competition> {
        self.ensure_authority(signer)?;
        require!(
            self.current_competition.has_ended(now),
            SoddleError::CompetitionNotYetEnded
        );

        let next = self
            .competition_count
            .checked_add(1)
            .ok_or(SoddleError::NumericOverflow)?;
        let competition = Competition::open(next, now)?;

        self.competition_count   = next;
        self.current_competition = competition;
        self.last_update_time    = now;
        Ok(competition)
    }
}


// ── Identity records (instruction arguments, validated at the boundary) ──

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct IdentityRecord {
    pub id:               String,
    pub name:             String,
    pub age:              u8,
    pub country:          String,
    pub pfp:              String,
    pub pfp_type:         Option<String>,
    pub account_creation: u16,
    pub followers:        u32,
    pub ecosystem:        String,
    pub samples:          Option<Vec<String>>,
}

impl IdentityRecord {
    pub fn validate(&self) -> Result<()> {
        require!(bounded(&self.id, MAX_ID_LEN),     SoddleError::InvalidIdentityRecord);
        require!(bounded(&self.name, MAX_NAME_LEN), SoddleError::InvalidIdentityRecord);
        require!(self.country.len() <= MAX_COUNTRY_LEN,     SoddleError::InvalidIdentityRecord);
        require!(self.pfp.len() <= MAX_PFP_LEN,             SoddleError::InvalidIdentityRecord);
        require!(self.ecosystem.len() <= MAX_ECOSYSTEM_LEN, SoddleError::InvalidIdentityRecord);
        if let Some(pfp_type) = &self.pfp_type {
            require!(bounded(pfp_type, MAX_PFP_TYPE_LEN), SoddleError::InvalidIdentityRecord);
        }
        if let Some(samples) = &self.samples {
            require!(samples.len() <= MAX_SAMPLES, SoddleError::TooManySamples);
            for sample in samples {
                require!(bounded(sample, MAX_SAMPLE_LEN), SoddleError::InvalidIdentityRecord);
            }
        }
        Ok(())
    }

    pub fn identity_key(&self) -> [u8; 32] {
        identity_key(&self.id)
    }
}

fn bounded(value: &str, max: usize) -> bool {
    !value.is_empty() && value.len() <= max
}

/// Guesses are matched on this digest only; two records with the same `id`
/// are the same identity regardless of their other fields.
pub fn identity_key(id: &str) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(IDENTITY_KEY_DOMAIN);
    hasher.update(id.as_bytes());
    *hasher.finalize().as_bytes()
}

// ── GameSession PDA ── seeds: ["game_session", player, competition_id] ──

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionReason {
    Open,
    CorrectGuess,
    MaxGuesses,
    TimeExpired,
}

impl Default for CompletionReason {
    fn default() -> Self {
        Self::Open
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubGame {
    pub target_key: [u8; 32],          // 32, zero until a target is committed
    pub completed:  bool,              // 1
    pub reason:     CompletionReason,  // 1
    pub score:      u32,               // 4
    pub guesses:    u32,               // 4
}

impl SubGame {
    pub const LEN: usize = 32 + 1 + 1 + 4 + 4;

    fn committed(target_key: [u8; 32]) -> Self {
        Self { target_key, score: INITIAL_SCORE, ..Self::default() }
    }

    pub fn is_committed(&self) -> bool {
        self.target_key != [0u8; 32]
    }

    /// Only a correct guess keeps points; any other close scores zero.
    fn close(&mut self, reason: CompletionReason) {
        self.completed = true;
        self.reason = reason;
        if reason != CompletionReason::CorrectGuess {
            self.score = 0;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuessOutcome {
    pub sub_game:       u8,
    pub guess_number:   u32,
    pub is_correct:     bool,
    pub breakdown:      ScoreBreakdown,
    pub closed:         Option<CompletionReason>,
    pub sub_game_score: u32,
    pub session_score:  u32,
}

impl GuessOutcome {
    pub fn was_scored(&self) -> bool {
        self.closed != Some(CompletionReason::TimeExpired)
    }
}

#[account]
#[derive(Debug, Default, PartialEq)]
pub struct GameSession {
    pub version:        u8,                          // 1
    pub player:         Pubkey,                      // 32
    pub competition_id: [u8; COMPETITION_ID_LEN],    // 16
    pub game_type:      u8,                          // 1
    pub deposit:        u64,                         // 8
    pub start_time:     i64,                         // 8
    pub sub_games:      [SubGame; GAME_TYPE_COUNT],  // 2 * 42
    pub score:          u32,                         // 4
    pub completed:      bool,                        // 1
    pub completed_at:   i64,                         // 8
    pub bump:           u8,                          // 1
}

impl GameSession {
    pub const LEN: usize = 1 + 32 + COMPETITION_ID_LEN + 1 + 8 + 8
        + SubGame::LEN * GAME_TYPE_COUNT + 4 + 1 + 8 + 1;

    /// `init_if_needed` hands back a zeroed account on first use.
    pub fn is_initialized(&self) -> bool {
        self.player != Pubkey::default()
    }

    /// Read a session passed in unchecked. Anything this program did not
    /// write as a `GameSession` reads as missing.
    pub fn load(info: &AccountInfo) -> Result<Self> {
        if info.owner != &crate::ID || info.data_is_empty() {
            return err!(SoddleError::SessionNotFound);
        }
        let data = info.try_borrow_data()?;
        Self::try_deserialize(&mut &data[..]).map_err(|_| error!(SoddleError::SessionNotFound))
    }

    pub fn store(&self, info: &AccountInfo) -> Result<()> {
        let mut data = info.try_borrow_mut_data()?;
        let mut writer: &mut [u8] = &mut data[..];
        self.try_serialize(&mut writer)
    }

    /// Commits `target_key` to the sub-game selected by `game_type`; the
    /// other sub-game stays without a target and scores zero.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &mut self,
        player: Pubkey,
        competition_id: [u8; COMPETITION_ID_LEN],
        game_type: u8,
        deposit: u64,
        target_key: [u8; 32],
        now: i64,
        bump: u8,
    ) -> Result<()> {
        require!(!self.is_initialized(), SoddleError::GameAlreadyPlayed);
        let index = game_type_index(game_type)?;

        let mut sub_games = [SubGame::default(); GAME_TYPE_COUNT];
        sub_games[index] = SubGame::committed(target_key);

        self.version        = ACCOUNT_VERSION;
        self.player         = player;
        self.competition_id = competition_id;
        self.game_type      = game_type;
        self.deposit        = deposit;
        self.start_time     = now;
        self.sub_games      = sub_games;
        self.completed      = false;
        self.completed_at   = 0;
        self.bump           = bump;
        self.recompute_score();
        Ok(())
    }

    /// Guards shared by every player transition on an existing session.
    pub fn ensure_active(&self, player: Pubkey, competition_id: &[u8; COMPETITION_ID_LEN]) -> Result<()> {
        require!(
            self.is_initialized() && self.player == player,
            SoddleError::SessionNotFound
        );
        require!(self.competition_id == *competition_id, SoddleError::SessionExpired);
        require!(!self.completed, SoddleError::SessionAlreadyFinalized);
        Ok(())
    }

    pub fn game1(&self) -> &SubGame {
        &self.sub_games[0]
    }

    pub fn game2(&self) -> &SubGame {
        &self.sub_games[1]
    }

    /// Apply one guess to the sub-game selected by `game_type`. Every check
    /// runs before the first write, so a rejected guess leaves the session
    /// untouched.
    ///
    /// A guess arriving after `ATTEMPT_TIME_LIMIT` is not scored: it closes
    /// the sub-game as timed out instead.
    pub fn record_guess(&mut self, game_type: u8, guess_key: &[u8; 32], now: i64) -> Result<GuessOutcome> {
        require!(!self.completed, SoddleError::SessionAlreadyFinalized);
        let index = game_type_index(game_type)?;
        let elapsed = now.saturating_sub(self.start_time);

        let game = &mut self.sub_games[index];
        require!(game.is_committed(), SoddleError::SubGameUnavailable);
        match game.reason {
            CompletionReason::Open => {}
            CompletionReason::CorrectGuess => return err!(SoddleError::SubGameAlreadyCompleted),
            CompletionReason::MaxGuesses => return err!(SoddleError::MaxGuessesReached),
            CompletionReason::TimeExpired => return err!(SoddleError::AttemptTimedOut),
        }

        let (guess_number, is_correct, breakdown, closed) = if elapsed >= ATTEMPT_TIME_LIMIT {
            let breakdown = ScoreBreakdown {
                time_deduction:  time_deduction(elapsed),
                guess_deduction: guess_deduction(game.guesses),
                score:           0,
            };
            game.close(CompletionReason::TimeExpired);
            (game.guesses, false, breakdown, Some(CompletionReason::TimeExpired))
        } else {
            let guess_number = game
                .guesses
                .checked_add(1)
                .ok_or(SoddleError::NumericOverflow)?;
            let is_correct = *guess_key == game.target_key;
            let breakdown = score_guess(elapsed, guess_number, is_correct);

            game.guesses = guess_number;
            // Running score only moves down; a correct guess freezes it.
            game.score = game.score.min(breakdown.score);

            let closed = if is_correct {
                Some(CompletionReason::CorrectGuess)
            } else if guess_number >= MAX_GUESSES_PER_SUB_GAME {
                Some(CompletionReason::MaxGuesses)
            } else {
                None
            };
            if let Some(reason) = closed {
                game.close(reason);
            }
            (guess_number, is_correct, breakdown, closed)
        };
        let sub_game_score = game.score;

        self.recompute_score();
        Ok(GuessOutcome {
            sub_game: game_type,
            guess_number,
            is_correct,
            breakdown,
            closed,
            sub_game_score,
            session_score: self.score,
        })
    }

    /// Terminal transition. Sub-games that were never solved count for zero.
    pub fn finalize(&mut self, now: i64) -> Result<u32> {
        require!(!self.completed, SoddleError::SessionAlreadyFinalized);
        for game in self.sub_games.iter_mut().filter(|g| !g.completed) {
            game.score = 0;
        }
        self.recompute_score();
        self.completed    = true;
        self.completed_at = now;
        Ok(self.score)
    }

    pub fn sub_games_completed(&self) -> u8 {
        self.sub_games.iter().filter(|g| g.completed).count() as u8
    }

    fn recompute_score(&mut self) {
        self.score = self
            .sub_games
            .iter()
            .fold(0u32, |acc, g| acc.saturating_add(g.score));
    }
}

// ── PlayerState PDA ── seeds: ["player_state", player] ───────────────────
// One play per game type per competition.

#[account]
#[derive(Debug, Default, PartialEq)]
pub struct PlayerState {
    pub version:          u8,                                          // 1
    pub player:           Pubkey,                                      // 32
    pub last_played:      [i64; GAME_TYPE_COUNT],                      // 2 * 8
    pub last_competition: [[u8; COMPETITION_ID_LEN]; GAME_TYPE_COUNT], // 2 * 16
    pub sessions_started: u64,                                         // 8
    pub bump:             u8,                                          // 1
}

impl PlayerState {
    pub const LEN: usize = 1 + 32 + 8 * GAME_TYPE_COUNT + COMPETITION_ID_LEN * GAME_TYPE_COUNT + 8 + 1;

    pub fn ensure_can_play(&self, game_type: u8, competition_id: &[u8; COMPETITION_ID_LEN]) -> Result<()> {
        let index = game_type_index(game_type)?;
        require!(
            self.last_competition[index] != *competition_id,
            SoddleError::GameAlreadyPlayed
        );
        Ok(())
    }

    pub fn record_play(
        &mut self,
        player: Pubkey,
        game_type: u8,
        competition_id: [u8; COMPETITION_ID_LEN],
        now: i64,
        bump: u8,
    ) -> Result<()> {
        let index = game_type_index(game_type)?;
        if self.player == Pubkey::default() {
            self.version = ACCOUNT_VERSION;
            self.player  = player;
            self.bump    = bump;
        }
        self.last_played[index]      = now;
        self.last_competition[index] = competition_id;
        self.sessions_started = self
            .sessions_started
            .checked_add(1)
            .ok_or(SoddleError::NumericOverflow)?;
        Ok(())
    }
}

// ── Vault PDA ── seeds: ["vault"] ────────────────────────────────────────
// Holds every undistributed deposit.

#[account]
#[derive(Debug, Default, PartialEq)]
pub struct Vault {
    pub version:            u8,     // 1
    pub authority:          Pubkey, // 32
    pub balance:            u64,    // 8
    pub total_collected:    u64,    // 8
    pub total_distributed:  u64,    // 8
    pub distribution_count: u64,    // 8
    pub bump:               u8,     // 1
}

impl Vault {
    pub const LEN: usize = 1 + 32 + 8 + 8 + 8 + 8 + 1;

    pub fn initialize(&mut self, authority: Pubkey, bump: u8) {
        self.version   = ACCOUNT_VERSION;
        self.authority = authority;
        self.bump      = bump;
    }

    pub fn credit(&mut self, amount: u64) -> Result<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(SoddleError::NumericOverflow)?;
        self.total_collected = self
            .total_collected
            .checked_add(amount)
            .ok_or(SoddleError::NumericOverflow)?;
        Ok(())
    }

    pub fn distributable(&self) -> Result<u64> {
        require!(self.balance > 0, SoddleError::EmptyVault);
        Ok(self.balance)
    }

    /// Book a full drain of `amount` once both transfers have gone out.
    pub fn record_distribution(&mut self, amount: u64) -> Result<()> {
        require!(amount == self.balance, SoddleError::AccountingBroken);
        self.balance = 0;
        self.total_distributed = self
            .total_distributed
            .checked_add(amount)
            .ok_or(SoddleError::NumericOverflow)?;
        self.distribution_count = self
            .distribution_count
            .checked_add(1)
            .ok_or(SoddleError::NumericOverflow)?;
        Ok(())
    }
}

// ── GameMetrics PDA ── seeds: ["game_metrics"] ───────────────────────────

#[account]
#[derive(Debug, Default, PartialEq)]
pub struct GameMetrics {
    pub version:                   u8,                       // 1
    pub total_games_started:       u64,                      // 8
    pub total_games_completed:     u64,                      // 8
    pub highest_score:             u32,                      // 4
    pub highest_scorer:            Pubkey,                   // 32
    pub highest_score_competition: [u8; COMPETITION_ID_LEN], // 16
    pub bump:                      u8,                       // 1
}

impl GameMetrics {
    pub const LEN: usize = 1 + 8 + 8 + 4 + 32 + COMPETITION_ID_LEN + 1;

    pub fn initialize(&mut self, bump: u8) {
        self.version = ACCOUNT_VERSION;
        self.bump    = bump;
    }

    pub fn record_start(&mut self) -> Result<()> {
        self.total_games_started = self
            .total_games_started
            .checked_add(1)
            .ok_or(SoddleError::NumericOverflow)?;
        Ok(())
    }

    /// Returns true when `score` beats the standing high score; ties keep
    /// the earlier holder.
    pub fn record_completion(
        &mut self,
        player: Pubkey,
        competition_id: [u8; COMPETITION_ID_LEN],
        score: u32,
    ) -> Result<bool> {
        self.total_games_completed = self
            .total_games_completed
            .checked_add(1)
            .ok_or(SoddleError::NumericOverflow)?;
        if score <= self.highest_score {
            return Ok(false);
        }
        self.highest_score             = score;
        self.highest_scorer            = player;
        self.highest_score_competition = competition_id;
        Ok(true)
    }
}

// ── Session start (everything but the lamport transfer) ──────────────────

pub struct SessionStart {
    pub player:            Pubkey,
    pub player_lamports:   u64,
    pub competition_id:    [u8; COMPETITION_ID_LEN],
    pub game_type:         u8,
    pub target_key:        [u8; 32],
    pub now:               i64,
    pub session_bump:      u8,
    pub player_state_bump: u8,
}

/// Check, then credit the vault, open the session and stamp the player.
/// Returns the deposit the caller must move into the vault.
pub fn begin_session(
    start: &SessionStart,
    session: &mut GameSession,
    player_state: &mut PlayerState,
    vault: &mut Vault,
    metrics: &mut GameMetrics,
) -> Result<u64> {
    require!(!session.is_initialized(), SoddleError::GameAlreadyPlayed);
    player_state.ensure_can_play(start.game_type, &start.competition_id)?;
    let deposit = BASE_DEPOSIT;
    require!(start.player_lamports >= deposit, SoddleError::InsufficientFunds);

    vault.credit(deposit)?;
    session.open(
        start.player,
        start.competition_id,
        start.game_type,
        deposit,
        start.target_key,
        start.now,
        start.session_bump,
    )?;
    player_state.record_play(
        start.player,
        start.game_type,
        start.competition_id,
        start.now,
        start.player_state_bump,
    )?;
    metrics.record_start()?;
    Ok(deposit)
}

/// Game types double as 1-based sub-game numbers.
pub fn game_type_index(game_type: u8) -> Result<usize> {
    require!(
        game_type >= 1 && game_type as usize <= GAME_TYPE_COUNT,
        SoddleError::InvalidGameType
    );
    Ok(game_type as usize - 1)
}
