use serde::{Deserialize, Serialize};
use std::fmt;

/// Envido calls, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EnvidoRaise {
    Envido,
    RealEnvido,
    FaltaEnvido,
}

/// Truco calls. Each one only follows the previous rung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrucoRaise {
    Truco,
    ReTruco,
    ValeCuatro,
}

impl TrucoRaise {
    /// Ladder level reached by this call.
    pub fn level(self) -> u8 {
        match self {
            TrucoRaise::Truco => 2,
            TrucoRaise::ReTruco => 3,
            TrucoRaise::ValeCuatro => 4,
        }
    }

    /// The call that climbs from `level`, if any.
    pub fn above(level: u8) -> Option<TrucoRaise> {
        match level {
            1 => Some(TrucoRaise::Truco),
            2 => Some(TrucoRaise::ReTruco),
            3 => Some(TrucoRaise::ValeCuatro),
            _ => None,
        }
    }
}

/// Every non-card decision a player can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Command {
    Envido(EnvidoRaise),
    Truco(TrucoRaise),
    Quiero,
    NoQuiero,
    Points(u8), // envido declaration
    Mazo,
}

/// Discrete state of a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandState {
    WaitingPlay,
    WaitingForTrucoAnswer,
    WaitingEnvidoAnswer,
    WaitingEnvidoPointsAnswer,
    Finished,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Command::Envido(EnvidoRaise::Envido) => write!(f, "ENVIDO"),
            Command::Envido(EnvidoRaise::RealEnvido) => write!(f, "REAL_ENVIDO"),
            Command::Envido(EnvidoRaise::FaltaEnvido) => write!(f, "FALTA_ENVIDO"),
            Command::Truco(TrucoRaise::Truco) => write!(f, "TRUCO"),
            Command::Truco(TrucoRaise::ReTruco) => write!(f, "RE_TRUCO"),
            Command::Truco(TrucoRaise::ValeCuatro) => write!(f, "VALE_CUATRO"),
            Command::Quiero => write!(f, "QUIERO"),
            Command::NoQuiero => write!(f, "NO_QUIERO"),
            Command::Points(p) => write!(f, "{}", p),
            Command::Mazo => write!(f, "MAZO"),
        }
    }
}
