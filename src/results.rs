//! Query result envelope.

use crate::schema::Entity;

/// One search hit: the reconstructed entity plus the similarity score and
/// distance. Score and distance are only populated when the query asked for
/// a similarity ranking.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub entity: Entity,
    pub score: Option<f32>,
    pub distance: Option<f32>,
}

impl QueryResult {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            score: None,
            distance: None,
        }
    }

    pub fn with_similarity(entity: Entity, score: f32, distance: f32) -> Self {
        Self {
            entity,
            score: Some(score),
            distance: Some(distance),
        }
    }
}
