//! One-way latches
//!
//! Player and referral records carry flags that may flip exactly once and never
//! back. They are modeled as two-state machines whose only transition moves to
//! the terminal state; stores report whether a call performed the transition.

use serde::{Deserialize, Serialize};

/// Result of attempting a latch transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// This call moved the latch to its terminal state
    Applied,
    /// The latch was already terminal; nothing changed
    AlreadySet,
}

impl Transition {
    pub fn applied(self) -> bool {
        matches!(self, Transition::Applied)
    }
}

/// Whether a player has completed a rewarded game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FirstGame {
    #[default]
    NeverPlayed,
    PlayedFirstGame,
}

impl FirstGame {
    pub fn is_played(self) -> bool {
        matches!(self, FirstGame::PlayedFirstGame)
    }

    pub fn mark_played(&mut self) -> Transition {
        match self {
            FirstGame::NeverPlayed => {
                *self = FirstGame::PlayedFirstGame;
                Transition::Applied
            }
            FirstGame::PlayedFirstGame => Transition::AlreadySet,
        }
    }
}

impl From<bool> for FirstGame {
    fn from(played: bool) -> Self {
        if played {
            FirstGame::PlayedFirstGame
        } else {
            FirstGame::NeverPlayed
        }
    }
}

/// Whether a one-time referral bonus has been paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BonusLatch {
    #[default]
    NoBonus,
    BonusGiven,
}

impl BonusLatch {
    pub fn is_given(self) -> bool {
        matches!(self, BonusLatch::BonusGiven)
    }

    pub fn give(&mut self) -> Transition {
        match self {
            BonusLatch::NoBonus => {
                *self = BonusLatch::BonusGiven;
                Transition::Applied
            }
            BonusLatch::BonusGiven => Transition::AlreadySet,
        }
    }
}

impl From<bool> for BonusLatch {
    fn from(given: bool) -> Self {
        if given {
            BonusLatch::BonusGiven
        } else {
            BonusLatch::NoBonus
        }
    }
}
