use anchor_lang::prelude::*;
use anchor_lang::solana_program::program::invoke;
use anchor_lang::solana_program::system_instruction;

pub mod scoring;
pub mod settlement;
pub mod state;

use settlement::{split_pool, transfer_from_vault};
use state::*;

declare_id!("DjRaxbc6UXtJoairnNyXftNT8u3KBsGBhjJRFuq6k46m");

#[cfg(not(feature = "no-entrypoint"))]
use solana_security_txt::security_txt;

#[cfg(not(feature = "no-entrypoint"))]
security_txt! {
    name: "Soddle",
    project_url: "https://soddle.io",
    contacts: "email:security@soddle.io",
    policy: "https://soddle.io/terms",
    preferred_languages: "en",
    source_code: "https://github.com/soddle/soddle-program",
    auditors: "Unaudited"
}

// ── Constants ─────────────────────────────────────────────────────────────
// FTadTGbeGf9v515MYcvWDY9ZVTKzdNXsPuUaQycUJmsp
pub const GAME_AUTHORITY: Pubkey = Pubkey::new_from_array([
    214, 210, 189, 235,  38,  77, 165, 186, 124, 200,  46, 112,  67,  69, 107,  94,
    190, 124, 214, 172,  87,  73,  40, 109, 226,  46,  94, 160,  53, 201, 174, 107,
]);

pub const ACCOUNT_VERSION:      u8  = 1;
pub const BASE_DEPOSIT:         u64 = 20_000_000; // 0.02 SOL stake per session
pub const COMPETITION_DURATION: i64 = 86_400;     // 24h per competition
pub const ATTEMPT_TIME_LIMIT:   i64 = 5 * 60;     // per sub-game, from session start

pub const COMPETITION_TAG:    &[u8] = b"COMP";
pub const COMPETITION_ID_LEN: usize = 16;         // tag + 12 digits
pub const GAME_TYPE_COUNT:    usize = 2;          // 1 = attribute clues, 2 = text-sample clues

// ── Scoring ───────────────────────────────────────────────────────────────
pub const INITIAL_SCORE:            u32 = 1000;
pub const TIME_PENALTY_INTERVAL:    i64 = 5;  // seconds
pub const TIME_PENALTY:             u32 = 5;  // points per interval
pub const WRONG_GUESS_PENALTY:      u32 = 50; // x k for the k-th miss
pub const MAX_GUESSES_PER_SUB_GAME: u32 = 20;

// ── Settlement (BPS = basis points, /10000) ───────────────────────────────
//   2.5% platform wallet, 97.5% reward distribution. Vault always drains to zero.
pub const PLATFORM_FEE_BPS: u64 = 250;
pub const BPS_DENOMINATOR:  u64 = 10_000;

// ── Identity record bounds ────────────────────────────────────────────────
pub const IDENTITY_KEY_DOMAIN: &[u8] = b"soddle:identity:";
pub const MAX_ID_LEN:          usize = 32;
pub const MAX_NAME_LEN:        usize = 30;
pub const MAX_COUNTRY_LEN:     usize = 30;
pub const MAX_PFP_TYPE_LEN:    usize = 30;
pub const MAX_PFP_LEN:         usize = 100;
pub const MAX_ECOSYSTEM_LEN:   usize = 20;
pub const MAX_SAMPLES:         usize = 3;
pub const MAX_SAMPLE_LEN:      usize = 140;

#[program]
pub mod soddle {
    use super::*;

    // ── Initialize ────────────────────────────────────────────────
    pub fn initialize_game(
        ctx: Context<InitializeGame>,
        platform_wallet:    Pubkey,
        reward_destination: Pubkey,
    ) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let authority = ctx.accounts.authority.key();

        let game_state = &mut ctx.accounts.game_state;
        game_state.initialize(authority, platform_wallet, reward_destination, now, ctx.bumps.game_state)?;
        ctx.accounts.vault.initialize(authority, ctx.bumps.vault);
        ctx.accounts.game_metrics.initialize(ctx.bumps.game_metrics);

        let competition = game_state.current_competition;
        emit!(GameInitialized {
            authority, platform_wallet, reward_destination,
            competition_id: competition.id, end_time: competition.end_time,
        });
        Ok(())
    }

    // ── Competition rotation (authority, after end_time) ──────────
    pub fn end_competition(ctx: Context<EndCompetition>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let game_state = &mut ctx.accounts.game_state;
        let previous = game_state.current_competition;

        let next = game_state.rotate_competition(ctx.accounts.authority.key(), now)?;

        msg!(
            "Competition rotated: {} -> {}",
            String::from_utf8_lossy(&previous.id),
            String::from_utf8_lossy(&next.id)
        );
        emit!(CompetitionRotated {
            previous_id: previous.id, competition_id: next.id,
            start_time: next.start_time, end_time: next.end_time,
        });
        Ok(())
    }

    // ── Start Session (stake player → vault) ──────────────────────
    pub fn start_game_session(
        ctx: Context<StartGameSession>,
        game_type: u8,
        target:    IdentityRecord,
    ) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        target.validate()?;

        // Cache keys before mutable borrows
        let player_key = ctx.accounts.player.key();
        let player_ai = ctx.accounts.player.to_account_info();
        let vault_ai = ctx.accounts.vault.to_account_info();
        let competition_id = ctx.accounts.game_state.current_competition.id;

        // ── Replay checks, vault credit, session + player bookkeeping
        let start = SessionStart {
            player: player_key,
            player_lamports: player_ai.lamports(),
            competition_id,
            game_type,
            target_key: target.identity_key(),
            now,
            session_bump: ctx.bumps.game_session,
            player_state_bump: ctx.bumps.player_state,
        };
        let deposit = begin_session(
            &start,
            &mut ctx.accounts.game_session,
            &mut ctx.accounts.player_state,
            &mut ctx.accounts.vault,
            &mut ctx.accounts.game_metrics,
        )?;

        // ── Collect stake ────────────────────────────────────────
        collect_stake(&player_ai, &vault_ai, deposit)?;

        emit!(GameSessionStarted {
            player: player_key, competition_id, game_type, deposit,
            vault_balance: ctx.accounts.vault.balance, timestamp: now,
        });
        Ok(())
    }

    // ── Guess ─────────────────────────────────────────────────────
    pub fn make_guess(ctx: Context<MakeGuess>, game_type: u8, guess: IdentityRecord) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        guess.validate()?;

        let player = ctx.accounts.player.key();
        let competition_id = ctx.accounts.game_state.current_competition.id;
        let session_ai = ctx.accounts.game_session.to_account_info();
        let mut session = GameSession::load(&session_ai)?;
        session.ensure_active(player, &competition_id)?;

        let outcome = session.record_guess(game_type, &guess.identity_key(), now)?;
        session.store(&session_ai)?;

        if outcome.was_scored() {
            emit!(GuessSubmitted {
                player, sub_game: outcome.sub_game, guess_number: outcome.guess_number,
                was_correct: outcome.is_correct,
                time_deduction: outcome.breakdown.time_deduction,
                guess_deduction: outcome.breakdown.guess_deduction,
                session_score: outcome.session_score, timestamp: now,
            });
        }
        if let Some(reason) = outcome.closed {
            emit!(SubGameCompleted {
                player, sub_game: outcome.sub_game, final_score: outcome.sub_game_score,
                total_guesses: outcome.guess_number, was_correct: outcome.is_correct,
                reason, timestamp: now,
            });
        }
        Ok(())
    }

    // ── End Session (bookkeeping only, no funds move) ─────────────
    pub fn end_game_session(ctx: Context<EndGameSession>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let player = ctx.accounts.player.key();
        let competition_id = ctx.accounts.game_state.current_competition.id;
        let session_ai = ctx.accounts.game_session.to_account_info();
        let mut session = GameSession::load(&session_ai)?;
        session.ensure_active(player, &competition_id)?;

        let final_score = session.finalize(now)?;
        session.store(&session_ai)?;

        let new_high = ctx
            .accounts
            .game_metrics
            .record_completion(player, competition_id, final_score)?;

        emit!(GameSessionEnded {
            player, competition_id, final_score,
            game1_score: session.game1().score, game2_score: session.game2().score,
            sub_games_completed: session.sub_games_completed(), timestamp: now,
        });
        if new_high {
            msg!("New high score {} by {}", final_score, player);
            emit!(NewHighScore { player, score: final_score, competition_id, timestamp: now });
        }
        Ok(())
    }

    // ── Admin: Distribute vault (platform fee + rewards) ──────────
    pub fn distribute_funds(ctx: Context<DistributeFunds>) -> Result<()> {
        ctx.accounts.game_state.ensure_authority(ctx.accounts.authority.key())?;

        // ── STEP 1: Pure math ─────────────────────────────────────
        let amount = ctx.accounts.vault.distributable()?;
        let split = split_pool(amount)?;

        // ── STEP 2: Solvency: vault must physically hold what it books
        let vault_ai = ctx.accounts.vault.to_account_info();
        let rent = Rent::get()?.minimum_balance(vault_ai.data_len());
        require!(
            vault_ai.lamports().saturating_sub(rent) >= split.total(),
            SoddleError::AccountingBroken
        );

        // ── STEP 3: Physical lamport transfers ────────────────────
        transfer_from_vault(&vault_ai, &ctx.accounts.platform_wallet, split.platform_amount)?;
        transfer_from_vault(&vault_ai, &ctx.accounts.reward_destination, split.reward_amount)?;

        // ── STEP 4: Internal accounting ───────────────────────────
        let vault = &mut ctx.accounts.vault;
        vault.record_distribution(amount)?;

        msg!(
            "Distributed {} lamports: platform {}, rewards {}",
            amount, split.platform_amount, split.reward_amount
        );
        emit!(FundsDistributed {
            amount, platform_amount: split.platform_amount, reward_amount: split.reward_amount,
            total_distributed: vault.total_distributed,
        });
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════════════════
//  HELPERS
// ══════════════════════════════════════════════════════════════════════════

/// System transfer of the stake from the player's wallet into the vault PDA.
fn collect_stake<'info>(player: &AccountInfo<'info>, vault: &AccountInfo<'info>, amount: u64) -> Result<()> {
    let ix = system_instruction::transfer(player.key, vault.key, amount);
    invoke(&ix, &[player.clone(), vault.clone()])?;
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════
//  ACCOUNTS
// ══════════════════════════════════════════════════════════════════════════

#[derive(Accounts)]
pub struct InitializeGame<'info> {
    #[account(init, payer = authority, space = 8 + GameState::LEN,
              seeds = [b"game_state"], bump)]
    pub game_state: Account<'info, GameState>,
    #[account(init, payer = authority, space = 8 + Vault::LEN,
              seeds = [b"vault"], bump)]
    pub vault: Account<'info, Vault>,
    #[account(init, payer = authority, space = 8 + GameMetrics::LEN,
              seeds = [b"game_metrics"], bump)]
    pub game_metrics: Account<'info, GameMetrics>,
    #[account(mut)] pub authority: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct EndCompetition<'info> {
    #[account(mut, seeds = [b"game_state"], bump = game_state.bump)]
    pub game_state: Account<'info, GameState>,
    pub authority: Signer<'info>,
}

#[derive(Accounts)]
pub struct StartGameSession<'info> {
    #[account(mut)] pub player: Signer<'info>,
    #[account(seeds = [b"game_state"], bump = game_state.bump)]
    pub game_state: Account<'info, GameState>,
    /// Zeroed on first use; an already-opened session is a replay.
    #[account(init_if_needed, payer = player, space = 8 + GameSession::LEN,
              seeds = [b"game_session", player.key().as_ref(), game_state.current_competition.id.as_ref()],
              bump)]
    pub game_session: Account<'info, GameSession>,
    #[account(init_if_needed, payer = player, space = 8 + PlayerState::LEN,
              seeds = [b"player_state", player.key().as_ref()], bump)]
    pub player_state: Account<'info, PlayerState>,
    #[account(mut, seeds = [b"vault"], bump = vault.bump)]
    pub vault: Account<'info, Vault>,
    #[account(mut, seeds = [b"game_metrics"], bump = game_metrics.bump)]
    pub game_metrics: Account<'info, GameMetrics>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct MakeGuess<'info> {
    pub player: Signer<'info>,
    #[account(seeds = [b"game_state"], bump = game_state.bump)]
    pub game_state: Account<'info, GameState>,
    /// CHECK: read with `GameSession::load`; owner, player and competition
    /// are checked in the handler.
    #[account(mut)]
    pub game_session: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct EndGameSession<'info> {
    pub player: Signer<'info>,
    #[account(seeds = [b"game_state"], bump = game_state.bump)]
    pub game_state: Account<'info, GameState>,
    /// CHECK: read with `GameSession::load`; owner, player and competition
    /// are checked in the handler.
    #[account(mut)]
    pub game_session: UncheckedAccount<'info>,
    #[account(mut, seeds = [b"game_metrics"], bump = game_metrics.bump)]
    pub game_metrics: Account<'info, GameMetrics>,
}

#[derive(Accounts)]
pub struct DistributeFunds<'info> {
    #[account(mut)] pub authority: Signer<'info>,
    #[account(seeds = [b"game_state"], bump = game_state.bump)]
    pub game_state: Account<'info, GameState>,
    #[account(mut, seeds = [b"vault"], bump = vault.bump)]
    pub vault: Account<'info, Vault>,
    /// CHECK: pinned to the platform wallet recorded at initialization.
    #[account(mut, address = game_state.platform_wallet @ SoddleError::InvalidDestination)]
    pub platform_wallet: AccountInfo<'info>,
    /// CHECK: pinned to the reward destination recorded at initialization.
    #[account(mut, address = game_state.reward_destination @ SoddleError::InvalidDestination)]
    pub reward_destination: AccountInfo<'info>,
}

// ══════════════════════════════════════════════════════════════════════════
//  ERRORS & EVENTS
// ══════════════════════════════════════════════════════════════════════════

#[error_code]
pub enum SoddleError {
    #[msg("Unauthorized authority")]
    UnauthorizedAuthority,
    #[msg("Destination does not match the configured wallet")]
    InvalidDestination,
    #[msg("Competition has not ended yet")]
    CompetitionNotYetEnded,
    #[msg("Game has already been played today")]
    GameAlreadyPlayed,
    #[msg("Insufficient funds for the session deposit")]
    InsufficientFunds,
    #[msg("Game session not found for this player")]
    SessionNotFound,
    #[msg("Game session belongs to a rotated competition")]
    SessionExpired,
    #[msg("Game session is already finalized")]
    SessionAlreadyFinalized,
    #[msg("Sub-game is already completed")]
    SubGameAlreadyCompleted,
    #[msg("No target committed for this sub-game")]
    SubGameUnavailable,
    #[msg("Maximum number of guesses reached")]
    MaxGuessesReached,
    #[msg("Sub-game time limit has passed")]
    AttemptTimedOut,
    #[msg("Invalid game type. Must be 1 or 2.")]
    InvalidGameType,
    #[msg("Identity record field missing or too long")]
    InvalidIdentityRecord,
    #[msg("Too many text samples")]
    TooManySamples,
    #[msg("Cannot distribute funds from an empty vault")]
    EmptyVault,
    #[msg("Accounting invariant violated")]
    AccountingBroken,
    #[msg("Numeric overflow occurred")]
    NumericOverflow,
}

#[event] pub struct GameInitialized    { pub authority: Pubkey, pub platform_wallet: Pubkey, pub reward_destination: Pubkey, pub competition_id: [u8; 16], pub end_time: i64 }
#[event] pub struct CompetitionRotated { pub previous_id: [u8; 16], pub competition_id: [u8; 16], pub start_time: i64, pub end_time: i64 }
#[event] pub struct GameSessionStarted { pub player: Pubkey, pub competition_id: [u8; 16], pub game_type: u8, pub deposit: u64, pub vault_balance: u64, pub timestamp: i64 }
#[event] pub struct GuessSubmitted     { pub player: Pubkey, pub sub_game: u8, pub guess_number: u32, pub was_correct: bool, pub time_deduction: u32, pub guess_deduction: u32, pub session_score: u32, pub timestamp: i64 }
#[event] pub struct SubGameCompleted   { pub player: Pubkey, pub sub_game: u8, pub final_score: u32, pub total_guesses: u32, pub was_correct: bool, pub reason: CompletionReason, pub timestamp: i64 }
#[event] pub struct GameSessionEnded   { pub player: Pubkey, pub competition_id: [u8; 16], pub final_score: u32, pub game1_score: u32, pub game2_score: u32, pub sub_games_completed: u8, pub timestamp: i64 }
#[event] pub struct NewHighScore       { pub player: Pubkey, pub score: u32, pub competition_id: [u8; 16], pub timestamp: i64 }
#[event] pub struct FundsDistributed   { pub amount: u64, pub platform_amount: u64, pub reward_amount: u64, pub total_distributed: u64 }
