//! Elo rating updater backed by the skillratings crate
//!
//! Each player is rated against the opposing team's average, so one match
//! produces one pairwise Elo update per player.

use crate::config::RatingSettings;
use crate::error::Result;
use crate::player::PlayerRepository;
use crate::rating::{RatingChange, RatingUpdater};
use crate::types::{MatchResult, Team};
use async_trait::async_trait;
use skillratings::elo::{elo, EloConfig, EloRating};
use skillratings::Outcomes;
use std::sync::Arc;
use tracing::info;

/// Default rating collaborator: team-average Elo
pub struct EloRatingUpdater {
    config: EloConfig,
    players: Arc<dyn PlayerRepository>,
}

impl EloRatingUpdater {
    pub fn new(settings: &RatingSettings, players: Arc<dyn PlayerRepository>) -> Self {
        Self {
            config: EloConfig { k: settings.k_factor },
            players,
        }
    }

    fn team_average(result: &MatchResult, team: Team) -> f64 {
        let ratings: Vec<i32> = result
            .players
            .iter()
            .filter(|member| member.team == team)
            .map(|member| member.mmr)
            .collect();
        if ratings.is_empty() {
            return 0.0;
        }
        ratings.iter().sum::<i32>() as f64 / ratings.len() as f64
    }
}

#[async_trait]
impl RatingUpdater for EloRatingUpdater {
    async fn apply(&self, result: &MatchResult) -> Result<Vec<RatingChange>> {
        let average_a = Self::team_average(result, Team::A);
        let average_b = Self::team_average(result, Team::B);

        let mut changes = Vec::with_capacity(result.players.len());
        for member in &result.players {
            let old_rating = self.players.get_rating(&member.player_id).await?;

            let opponent_average = match member.team {
                Team::A => average_b,
                Team::B => average_a,
            };
            let outcome = if member.team == result.winner_team {
                Outcomes::WIN
            } else {
                Outcomes::LOSS
            };

            let (updated, _) = elo(
                &EloRating {
                    rating: f64::from(old_rating),
                },
                &EloRating {
                    rating: opponent_average,
                },
                &outcome,
                &self.config,
            );
            let new_rating = updated.rating.round() as i32;

            self.players.set_rating(&member.player_id, new_rating).await?;
            changes.push(RatingChange {
                player_id: member.player_id.clone(),
                old_rating,
                new_rating,
            });
        }

        info!(
            "Applied ratings for match {} - {} players updated",
            result.match_id,
            changes.len()
        );
        Ok(changes)
    }
}
