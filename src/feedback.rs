//! Trainee feedback generation
//!
//! Each triggered condition contributes one sentence, emitted in a fixed
//! priority order so truncation always drops the least important notes first.

use crate::config::EvaluatorConfig;
use crate::error::ScoreError;
use crate::tally::AttemptTally;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language of the feedback sentences
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Es => "es",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "es" => Ok(Locale::Es),
            other => Err(ScoreError::InvalidConfig(format!(
                "unsupported locale '{other}', expected 'en' or 'es'"
            ))),
        }
    }
}

/// Conditions that produce a feedback sentence, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCondition {
    ForbiddenHit,
    StepsOmitted,
    WrongAction,
    TimeOver,
    NoTargetContact,
    WrongInstrument,
    ForbiddenContact,
    ForcefulAction,
    ErraticMovement,
}

impl FeedbackCondition {
    /// Highest priority first
    pub const PRIORITY: [FeedbackCondition; 9] = [
        FeedbackCondition::ForbiddenHit,
        FeedbackCondition::StepsOmitted,
        FeedbackCondition::WrongAction,
        FeedbackCondition::TimeOver,
        FeedbackCondition::NoTargetContact,
        FeedbackCondition::WrongInstrument,
        FeedbackCondition::ForbiddenContact,
        FeedbackCondition::ForcefulAction,
        FeedbackCondition::ErraticMovement,
    ];

    fn is_triggered(&self, tally: &AttemptTally, time_over_seconds: f64, event_count: usize) -> bool {
        match self {
            FeedbackCondition::ForbiddenHit => tally.forbidden_hits > 0,
            FeedbackCondition::StepsOmitted => tally.steps_omitted > 0,
            FeedbackCondition::WrongAction => tally.wrong_actions > 0,
            FeedbackCondition::TimeOver => time_over_seconds > 0.0,
            // A log with no recognized events has nothing to miss the target with
            FeedbackCondition::NoTargetContact => event_count > 0 && tally.target_hits == 0,
            FeedbackCondition::WrongInstrument => tally.wrong_instrument > 0,
            FeedbackCondition::ForbiddenContact => tally.forbidden_contact_ms > 0.0,
            FeedbackCondition::ForcefulAction => tally.forceful_actions > 0,
            FeedbackCondition::ErraticMovement => tally.erratic_moves > 0,
        }
    }

    /// Sentence for this condition in the given locale
    pub fn sentence(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => match self {
                FeedbackCondition::ForbiddenHit => {
                    "Avoid entering the forbidden zone to protect the patient."
                }
                FeedbackCondition::StepsOmitted => {
                    "Complete every protocol step before finishing the attempt."
                }
                FeedbackCondition::WrongAction => {
                    "Review the instruments and the correct action before performing it."
                }
                FeedbackCondition::TimeOver => {
                    "Streamline your movements to reduce the total procedure time."
                }
                FeedbackCondition::NoTargetContact => {
                    "Make contact with the target zone to improve precision."
                }
                FeedbackCondition::WrongInstrument => {
                    "Pick up the instrument the current step requires before acting."
                }
                FeedbackCondition::ForbiddenContact => {
                    "Reduce the time spent in contact with the forbidden zone."
                }
                FeedbackCondition::ForcefulAction => {
                    "Apply less force; some actions exceeded the safe intensity."
                }
                FeedbackCondition::ErraticMovement => {
                    "Steady your hands; the instrument motion was erratic."
                }
            },
            Locale::Es => match self {
                FeedbackCondition::ForbiddenHit => {
                    "Evita ingresar en la zona prohibida para proteger al paciente."
                }
                FeedbackCondition::StepsOmitted => {
                    "Completa todos los pasos del protocolo antes de finalizar el intento."
                }
                FeedbackCondition::WrongAction => {
                    "Revisa los instrumentos y la acción correcta antes de ejecutarla."
                }
                FeedbackCondition::TimeOver => {
                    "Optimiza tus movimientos para reducir el tiempo total del procedimiento."
                }
                FeedbackCondition::NoTargetContact => {
                    "Asegura contacto con la zona objetivo para mejorar la precisión."
                }
                FeedbackCondition::WrongInstrument => {
                    "Toma el instrumento que requiere el paso actual antes de actuar."
                }
                FeedbackCondition::ForbiddenContact => {
                    "Reduce el tiempo de contacto con la zona prohibida."
                }
                FeedbackCondition::ForcefulAction => {
                    "Aplica menos fuerza; algunas acciones superaron la intensidad segura."
                }
                FeedbackCondition::ErraticMovement => {
                    "Estabiliza tus manos; el movimiento del instrumento fue errático."
                }
            },
        }
    }
}

/// Sentence emitted when no condition triggers
pub fn positive_sentence(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Excellent work: consistent performance in precision and safety.",
        Locale::Es => "Excelente trabajo: desempeño consistente en precisión y seguridad.",
    }
}

/// Conditions triggered by a tally, highest priority first
pub fn triggered_conditions(
    tally: &AttemptTally,
    time_over_seconds: f64,
    event_count: usize,
) -> Vec<FeedbackCondition> {
    FeedbackCondition::PRIORITY
        .into_iter()
        .filter(|condition| condition.is_triggered(tally, time_over_seconds, event_count))
        .collect()
}

/// Build the ordered feedback list, capped at `config.feedback_limit`.
///
/// `event_count` is the number of recognized (non-unknown) events in the log.
pub fn generate_feedback(
    tally: &AttemptTally,
    time_over_seconds: f64,
    event_count: usize,
    config: &EvaluatorConfig,
) -> Vec<String> {
    let conditions = triggered_conditions(tally, time_over_seconds, event_count);
    if conditions.is_empty() {
        return vec![positive_sentence(config.locale).to_string()];
    }

    conditions
        .iter()
        .take(config.feedback_limit)
        .map(|condition| condition.sentence(config.locale).to_string())
        .collect()
}
