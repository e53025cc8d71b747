//! Floating captions attached to projectiles

use serde::{Deserialize, Serialize};

use crate::overlay::projectile::EntityId;
use crate::overlay::settings::Font;
use crate::util::vec2::Vec2;

/// Passive text record drawn where its projectile was when it attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub id: EntityId,
    pub text: String,
    pub position: Vec2,
    pub destroyed: bool,
    pub font: Font,
}

impl Caption {
    pub fn new(id: EntityId, text: String, position: Vec2, font: Font) -> Self {
        Self {
            id,
            text,
            position,
            destroyed: false,
            font,
        }
    }
}
